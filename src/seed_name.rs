//! Fixed-format channel names
//!
//! A seedname is 12 ASCII bytes laid out as `NNSSSSSCCCLL`: a 2-byte network
//! code, a 5-byte station, a 3-byte channel and a 2-byte location, each field
//! space padded on the right.

use crate::constants::{REQUESTED_BLOCK_NAME, SEED_NAME_LEN};
use crate::error::IndexError;
use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Formatter};

/// A 12-byte channel name as stored on disk
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SeedName([u8; SEED_NAME_LEN]);

impl SeedName {
    /// Name carried by a chk block that was requested but never written
    pub const REQUESTED: SeedName = SeedName(*REQUESTED_BLOCK_NAME);

    /// Wrap raw bytes without validating them
    pub const fn from_bytes(bytes: [u8; SEED_NAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a seedname from a string, space padding it to 12 bytes
    pub fn parse(name: &str) -> Result<Self, IndexError> {
        if name.len() > SEED_NAME_LEN || !name.is_ascii() {
            return Err(IndexError::malformed(
                -1,
                format!("seedname {:?} is not at most {} ASCII bytes", name, SEED_NAME_LEN),
            ));
        }
        let mut bytes = [b' '; SEED_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        let seed = Self(bytes);
        if !seed.is_valid() {
            return Err(IndexError::malformed(-1, format!("seedname {:?} is not canonical", name)));
        }
        Ok(seed)
    }

    /// Build a seedname from its four fields
    pub fn from_parts(network: &str, station: &str, channel: &str, location: &str) -> Result<Self, IndexError> {
        let name = format!("{:<2}{:<5}{:<3}{:<2}", network, station, channel, location);
        Self::parse(&name)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_NAME_LEN] {
        &self.0
    }

    pub fn network(&self) -> &[u8] {
        &self.0[0..2]
    }

    pub fn station(&self) -> &[u8] {
        &self.0[2..7]
    }

    pub fn channel(&self) -> &[u8] {
        &self.0[7..10]
    }

    pub fn location(&self) -> &[u8] {
        &self.0[10..12]
    }

    /// True for the never-finished-write sentinel
    pub fn is_requested(&self) -> bool {
        *self == Self::REQUESTED
    }

    /// True for a slot that was never assigned (all zero or all spaces)
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0) || self.0.iter().all(|&b| b == b' ')
    }

    /// Check the canonical fixed-format rules
    pub fn is_valid(&self) -> bool {
        let alnum = |b: u8| b.is_ascii_uppercase() || b.is_ascii_digit() || b.is_ascii_lowercase();

        let network = self.network();
        if !alnum(network[0]) || !(alnum(network[1]) || network[1] == b' ') {
            return false;
        }

        let station = self.station();
        if !alnum(station[0]) {
            return false;
        }
        let mut padded = false;
        for &b in &station[1..] {
            match b {
                b' ' => padded = true,
                b if alnum(b) && !padded => {}
                _ => return false,
            }
        }

        if !self.channel().iter().all(|&b| alnum(b)) {
            return false;
        }

        self.location().iter().all(|&b| alnum(b) || b == b' ' || b == b'-')
    }

    /// Validate, reporting the block number the name was read from
    pub fn validate(&self, block: i32) -> Result<(), IndexError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(IndexError::malformed(block, format!("seedname {:?} fails validation", self.to_string())))
        }
    }
}

impl Display for SeedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SeedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SeedName({:?})", self.to_string())
    }
}

impl Serialize for SeedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
