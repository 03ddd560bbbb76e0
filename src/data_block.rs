//! Classification of raw data blocks
//!
//! Reconciliation only needs to know whether a data block is empty, holds a
//! record for the expected channel and day, or holds something else. Sample
//! payloads are never decoded here; [`MiniSeedHeaderDecoder`] inspects the
//! fixed record header only, and other decoders can be plugged in through
//! [`DataBlockDecoder`].

use crate::constants::BLOCK_SIZE;
use crate::seed_name::SeedName;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A calendar day as year and day-of-year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JulianDay {
    pub year: u16,
    pub day: u16,
}

impl JulianDay {
    pub fn new(year: u16, day: u16) -> Self {
        Self { year, day }
    }

    pub fn is_valid(&self) -> bool {
        (1900..=2500).contains(&self.year) && (1..=366).contains(&self.day)
    }

    /// Parse the `YYYY_DDD` prefix of a file stub such as `2024_123_7`
    pub fn from_stub(stub: &str) -> Option<Self> {
        let mut parts = stub.split('_');
        let year = parts.next()?;
        let day = parts.next()?;
        if year.len() != 4 || day.len() != 3 {
            return None;
        }
        let julian = Self {
            year: year.parse().ok()?,
            day: day.parse().ok()?,
        };
        julian.is_valid().then_some(julian)
    }
}

impl Display for JulianDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}_{:03}", self.year, self.day)
    }
}

/// What a raw data block turned out to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataBlockState {
    /// Never written: every byte is zero
    Zero,
    /// A record for the expected channel (and day, when known)
    Matching,
    /// A record for something else, or bytes that do not decode
    Foreign,
}

/// Decides what a raw data block holds
pub trait DataBlockDecoder: Send + Sync {
    fn classify(&self, block: &[u8], expected: &SeedName, day: Option<JulianDay>) -> DataBlockState;
}

/// Fixed header of a MiniSEED data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniSeedHeader {
    pub sequence: u32,
    pub quality: u8,
    pub seed_name: SeedName,
    pub day: JulianDay,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub sample_count: u16,
}

impl MiniSeedHeader {
    /// Header of a record starting at midnight of `day`
    pub fn new(seed_name: SeedName, day: JulianDay, sequence: u32) -> Self {
        Self {
            sequence,
            quality: b'D',
            seed_name,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            sample_count: 0,
        }
    }

    /// Decode the fixed header, or `None` when the bytes are not a record
    pub fn decode(block: &[u8]) -> Option<Self> {
        if block.len() < 48 {
            return None;
        }
        let sequence_field = &block[0..6];
        if !sequence_field.iter().all(|&b| b.is_ascii_digit() || b == b' ') {
            return None;
        }
        let sequence = std::str::from_utf8(sequence_field).ok()?.trim().parse().unwrap_or(0);
        let quality = block[6];
        if !matches!(quality, b'D' | b'R' | b'Q' | b'M') {
            return None;
        }

        // Record order is station, location, channel, network.
        let mut name = [b' '; 12];
        name[0..2].copy_from_slice(&block[18..20]);
        name[2..7].copy_from_slice(&block[8..13]);
        name[7..10].copy_from_slice(&block[15..18]);
        name[10..12].copy_from_slice(&block[13..15]);
        let seed_name = SeedName::from_bytes(name);
        if !seed_name.is_valid() {
            return None;
        }

        let mut time = &block[20..32];
        let day = JulianDay {
            year: time.get_u16(),
            day: time.get_u16(),
        };
        let hour = time.get_u8();
        let minute = time.get_u8();
        let second = time.get_u8();
        time.advance(3);
        let sample_count = time.get_u16();
        if !day.is_valid() || hour > 23 || minute > 59 || second > 60 {
            return None;
        }

        Some(Self {
            sequence,
            quality,
            seed_name,
            day,
            hour,
            minute,
            second,
            sample_count,
        })
    }

    /// Write the fixed header into an otherwise zeroed block
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let sequence = format!("{:06}", self.sequence % 1_000_000);
        block[0..6].copy_from_slice(sequence.as_bytes());
        block[6] = self.quality;
        block[7] = b' ';
        let name = self.seed_name.as_bytes();
        block[8..13].copy_from_slice(&name[2..7]);
        block[13..15].copy_from_slice(&name[10..12]);
        block[15..18].copy_from_slice(&name[7..10]);
        block[18..20].copy_from_slice(&name[0..2]);

        let mut out = &mut block[20..48];
        out.put_u16(self.day.year);
        out.put_u16(self.day.day);
        out.put_u8(self.hour);
        out.put_u8(self.minute);
        out.put_u8(self.second);
        out.put_u8(0);
        out.put_u16(0);
        out.put_u16(self.sample_count);
        out.put_i16(40);
        out.put_i16(1);
        block
    }
}

/// Classifies blocks by their MiniSEED fixed header
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniSeedHeaderDecoder;

impl DataBlockDecoder for MiniSeedHeaderDecoder {
    fn classify(&self, block: &[u8], expected: &SeedName, day: Option<JulianDay>) -> DataBlockState {
        if block.iter().all(|&b| b == 0) {
            return DataBlockState::Zero;
        }
        match MiniSeedHeader::decode(block) {
            Some(header) if header.seed_name == *expected && day.map_or(true, |d| d == header.day) => {
                DataBlockState::Matching
            }
            _ => DataBlockState::Foreign,
        }
    }
}
