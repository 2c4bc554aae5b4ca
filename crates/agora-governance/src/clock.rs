//! Lazy time source for the governance engine.
//!
//! There is no scheduler: every block- or time-gated transition is computed
//! from a [`Clock`] snapshot passed into the operation by the host
//! environment.

/// Target block interval in seconds.
pub const SECONDS_PER_BLOCK: u64 = 6;

/// Snapshot of the host chain's block height and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    /// Current block height
    pub block: u64,
    /// Current timestamp in seconds
    pub timestamp: u64,
}

impl Clock {
    pub fn new(block: u64, timestamp: u64) -> Self {
        Self { block, timestamp }
    }

    /// Advance by `n` blocks, moving the timestamp at the target interval.
    pub fn advance_blocks(&mut self, n: u64) {
        self.block += n;
        self.timestamp += n * SECONDS_PER_BLOCK;
    }

    /// Advance by `secs` seconds, moving the block height at the target
    /// interval.
    pub fn advance_seconds(&mut self, secs: u64) {
        self.timestamp += secs;
        self.block += secs / SECONDS_PER_BLOCK;
    }
}
