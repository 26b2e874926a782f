//! Reconciliation settings and their defaults.

use thiserror::Error;

/// Default acceptance threshold on the 0.0-1.0 confidence scale
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Search results requested per line
pub const PAGE_SIZE: usize = 10;

/// Consecutive provider failures before a batch is treated as broken
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 5;

/// Lines resolved per worker per parallel window
pub const LINES_PER_WORKER: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("page size must be at least 1")]
    ZeroPageSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub threshold: f64,
    pub page_size: usize,
    /// 0 disables the consecutive-failure abort
    pub max_consecutive_failures: usize,
    /// 0 resolves lines sequentially on the calling thread
    pub workers: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            page_size: PAGE_SIZE,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            workers: 0,
        }
    }
}

impl ReconcileConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(self)
    }
}
