//! Audit findings and report rendering
//!
//! Every disagreement found while comparing idx against chk, or while
//! reconciling them against raw data, is recorded as a [`Mismatch`]. Reports
//! render as line-oriented text and serialize with serde for tooling.

use crate::seed_name::SeedName;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Kinds of findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MismatchKind {
    /// Master block listed only in the audited file
    MasterOnlyInSelf,
    /// Master block listed only in the other file
    MasterOnlyInOther,
    /// Slot seednames differ between the two copies of a master block
    MasterSlotName,
    /// Master slot name differs from the name in the chain's first block
    MasterNameMismatch,
    /// The two files follow different chains
    ChainDivergence,
    /// A block reachable in the audited file is absent or malformed in the other
    MissingBlock,
    /// Index blocks at the same number compare unequal
    BlockMismatch,
    /// A chain revisited a block
    ChainCycle,
    /// A chain pointed outside the index area
    ChainOutOfRange,
    /// A chain pointed at a master block
    ChainIntoMaster,
    /// An idx block failed validation; the channel walk stopped there
    MalformedIndex,
    /// A malformed chk block was rebuilt from idx
    CheckResynthesized,
    /// chk seedname replaced with idx's
    SeedNameFixed,
    /// chk seedname differs and too few extents agree to repair it
    NameUnresolved,
    /// chk starting block replaced with idx's
    ExtentFixed,
    /// idx claims a block that raw data does not back up
    BitmapContradiction,
    /// idx bit set because raw data holds a matching record
    IndexBitSet,
    /// chk bit set to match idx and raw data
    CheckBitSet,
    /// chk bit cleared because the raw block is empty
    CheckBitCleared,
}

impl MismatchKind {
    /// Short tag used in rendered reports
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MasterOnlyInSelf => "MASTER-ONLY-SELF",
            Self::MasterOnlyInOther => "MASTER-ONLY-OTHER",
            Self::MasterSlotName => "MASTER-SLOT",
            Self::MasterNameMismatch => "MASTER-NAME",
            Self::ChainDivergence => "CHAIN-DIVERGE",
            Self::MissingBlock => "MISSING",
            Self::BlockMismatch => "MISMATCH",
            Self::ChainCycle => "CYCLE",
            Self::ChainOutOfRange => "OUT-OF-RANGE",
            Self::ChainIntoMaster => "CHAIN-MASTER",
            Self::MalformedIndex => "BAD-IDX",
            Self::CheckResynthesized => "CHK-RESYNTH",
            Self::SeedNameFixed => "NAME-FIX",
            Self::NameUnresolved => "NAME-UNRESOLVED",
            Self::ExtentFixed => "EXTENT-FIX",
            Self::BitmapContradiction => "CONTRADICTION",
            Self::IndexBitSet => "IDX-SET",
            Self::CheckBitSet => "CHK-SET",
            Self::CheckBitCleared => "CHK-UNSET",
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub channel: Option<SeedName>,
    pub block: Option<i32>,
    pub description: String,
}

impl Mismatch {
    pub fn new(kind: MismatchKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            channel: None,
            block: None,
            description: description.into(),
        }
    }

    pub fn channel(mut self, channel: SeedName) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn block(mut self, block: i32) -> Self {
        self.block = Some(block);
        self
    }
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:<16}", self.kind.tag())?;
        if let Some(block) = self.block {
            write!(f, " blk={:<6}", block)?;
        }
        if let Some(channel) = &self.channel {
            write!(f, " {}", channel)?;
        }
        write!(f, " {}", self.description)
    }
}

/// Result of comparing the master block tables of two index files
#[derive(Debug, Clone, Default, Serialize)]
pub struct MasterBlockAudit {
    pub only_in_self: Vec<i32>,
    pub only_in_other: Vec<i32>,
    pub slots_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl MasterBlockAudit {
    pub fn is_consistent(&self) -> bool {
        self.only_in_self.is_empty() && self.only_in_other.is_empty() && self.mismatches.is_empty()
    }

    pub fn count(&self, kind: MismatchKind) -> usize {
        self.mismatches.iter().filter(|m| m.kind == kind).count()
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "master blocks: {} slots checked, {} only here, {} only there, {} name mismatches\n",
            self.slots_checked,
            self.only_in_self.len(),
            self.only_in_other.len(),
            self.count(MismatchKind::MasterSlotName)
        );
        if !self.only_in_self.is_empty() {
            out.push_str(&format!("only here: {:?}\n", self.only_in_self));
        }
        if !self.only_in_other.is_empty() {
            out.push_str(&format!("only there: {:?}\n", self.only_in_other));
        }
        for mismatch in &self.mismatches {
            out.push_str(&mismatch.to_string());
            out.push('\n');
        }
        out
    }
}

/// Result of walking two index files' chains in lock-step
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexBlockAudit {
    pub channels: usize,
    pub checked: usize,
    pub ok: usize,
    pub mismatches: Vec<Mismatch>,
}

impl IndexBlockAudit {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn count(&self, kind: MismatchKind) -> usize {
        self.mismatches.iter().filter(|m| m.kind == kind).count()
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "index blocks: {} channels, {} checked, {} ok, {} mismatches\n",
            self.channels,
            self.checked,
            self.ok,
            self.mismatches.len()
        );
        for mismatch in &self.mismatches {
            out.push_str(&mismatch.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_display() {
        let mismatch = Mismatch::new(MismatchKind::BitmapContradiction, "idx bit 5 set but data block 105 is empty")
            .channel(SeedName::parse("NTBOU  BHZ").unwrap())
            .block(10);
        let line = mismatch.to_string();
        assert!(line.starts_with("CONTRADICTION"));
        assert!(line.contains("blk=10"));
        assert!(line.contains("NTBOU  BHZ  "));
        assert!(line.ends_with("data block 105 is empty"));
    }

    #[test]
    fn test_index_audit_render_and_counts() {
        let mut audit = IndexBlockAudit {
            channels: 1,
            checked: 3,
            ok: 2,
            ..Default::default()
        };
        audit.mismatches.push(Mismatch::new(MismatchKind::BlockMismatch, "extent 0 differs").block(4));
        assert!(!audit.is_consistent());
        assert_eq!(audit.count(MismatchKind::BlockMismatch), 1);
        let text = audit.render();
        assert!(text.starts_with("index blocks: 1 channels, 3 checked, 2 ok, 1 mismatches"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_master_audit_consistency() {
        let mut audit = MasterBlockAudit::default();
        assert!(audit.is_consistent());
        audit.only_in_other.push(7);
        assert!(!audit.is_consistent());
    }

    #[test]
    fn test_mismatch_serializes() {
        let mismatch = Mismatch::new(MismatchKind::SeedNameFixed, "adopted idx name").block(3);
        let json = serde_json::to_string(&mismatch).unwrap();
        assert!(json.contains("\"SeedNameFixed\""));
        assert!(json.contains("\"block\":3"));
    }
}
