//! Governor configuration.
//!
//! Quorum, proposer threshold and proposal timing are deployment-time
//! configuration: fixed at construction, never mutated by the core.

use crate::error::GovernanceError;

/// One whole governance token (10^18 base units).
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Shortest allowed voting period, ~1 hour at 6s blocks.
pub const MIN_VOTING_PERIOD: u64 = 720;

/// Longest allowed voting period, ~4 weeks.
pub const MAX_VOTING_PERIOD: u64 = 403_200;

/// Longest allowed voting delay, ~1 week.
pub const MAX_VOTING_DELAY: u64 = 100_800;

/// Hard cap on actions per proposal.
pub const MAX_PROPOSAL_ACTIONS: usize = 10;

/// Fixed parameters of a governor deployment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GovernorConfig {
    /// Blocks between proposal creation and voting start
    pub voting_delay: u64,
    /// Blocks the voting window stays open
    pub voting_period: u64,
    /// Minimum prior votes required to propose
    pub proposal_threshold: u128,
    /// Minimum "for" votes required for a proposal to succeed
    pub quorum_votes: u128,
    /// Maximum actions per proposal
    pub max_actions: usize,
}

impl GovernorConfig {
    /// Check the configuration against protocol bounds.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_delay == 0 || self.voting_delay > MAX_VOTING_DELAY {
            return Err(GovernanceError::InvalidParameter(format!(
                "voting_delay {} not in [1, {}]",
                self.voting_delay, MAX_VOTING_DELAY
            )));
        }
        if self.voting_period < MIN_VOTING_PERIOD || self.voting_period > MAX_VOTING_PERIOD {
            return Err(GovernanceError::InvalidParameter(format!(
                "voting_period {} not in [{}, {}]",
                self.voting_period, MIN_VOTING_PERIOD, MAX_VOTING_PERIOD
            )));
        }
        if self.quorum_votes == 0 {
            return Err(GovernanceError::InvalidParameter(
                "quorum_votes must be non-zero".to_string(),
            ));
        }
        if self.max_actions == 0 || self.max_actions > MAX_PROPOSAL_ACTIONS {
            return Err(GovernanceError::InvalidParameter(format!(
                "max_actions {} not in [1, {}]",
                self.max_actions, MAX_PROPOSAL_ACTIONS
            )));
        }
        Ok(())
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            voting_delay: 100,
            voting_period: 5_760,
            proposal_threshold: 1_000 * ONE_TOKEN,
            quorum_votes: 400_000 * ONE_TOKEN,
            max_actions: MAX_PROPOSAL_ACTIONS,
        }
    }
}
