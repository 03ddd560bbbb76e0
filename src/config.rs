//! Configuration for reconciliation runs
//!
//! [`RebuildConfig`] follows the builder pattern: start from
//! [`RebuildConfig::new`], chain setters, then call
//! [`RebuildConfig::build`] to validate.

use crate::block_pool::PoolConfig;
use crate::constants::NAME_MATCH_THRESHOLD;
use crate::data_block::JulianDay;
use crate::error::IndexError;
use serde::{Deserialize, Serialize};

/// Settings for one [`crate::RebuildCheck`] run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildConfig {
    /// Write modified blocks back; otherwise only report
    pub fix: bool,
    /// Verbose per-node logging
    pub debug: bool,
    /// Fraction of agreeing extent starts needed to repair a chk seedname
    pub name_match_threshold: f64,
    /// Day data records must carry; taken from the stub when unset
    pub expected_day: Option<JulianDay>,
    /// Include per-block differences in audit reports
    pub detailed: bool,
    /// Index block pool sizing
    pub pool: PoolConfig,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            fix: false,
            debug: false,
            name_match_threshold: NAME_MATCH_THRESHOLD,
            expected_day: None,
            detailed: false,
            pool: PoolConfig::default(),
        }
    }
}

impl RebuildConfig {
    /// Create a dry-run configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable write-back
    pub fn fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    /// Enable or disable verbose logging
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn name_match_threshold(mut self, threshold: f64) -> Self {
        self.name_match_threshold = threshold;
        self
    }

    pub fn expected_day(mut self, day: JulianDay) -> Self {
        self.expected_day = Some(day);
        self
    }

    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), IndexError> {
        if !(self.name_match_threshold > 0.0 && self.name_match_threshold <= 1.0) {
            return Err(IndexError::config_error(
                "name_match_threshold",
                format!("value {} is outside (0, 1]", self.name_match_threshold),
                "Use a fraction of agreeing extents such as 0.8",
            ));
        }

        if let Some(day) = self.expected_day {
            if !day.is_valid() {
                return Err(IndexError::config_error(
                    "expected_day",
                    format!("{} is not a valid year and day-of-year", day),
                    "Use a year in 1900..=2500 and a day in 1..=366",
                ));
            }
        }

        if self.pool.max_free == 0 {
            return Err(IndexError::config_error(
                "pool.max_free",
                "must be greater than 0",
                "Keep at least one free record so acquire can reuse it",
            ));
        }

        Ok(())
    }

    /// Build the configuration after validation
    pub fn build(self) -> Result<Self, IndexError> {
        self.validate()?;
        Ok(self)
    }
}
