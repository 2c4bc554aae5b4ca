use agora_types::Hash;
use thiserror::Error;

/// Errors that can occur in governance operations.
///
/// Every failure is local and permanent for the triggering operation: callers
/// resubmit with corrected parameters or wait for the relevant block/time
/// condition. Nothing here is retried automatically.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Transaction already queued: {0}")]
    AlreadyQueued(Hash),

    #[error("Proposal already executed")]
    AlreadyExecuted,

    #[error("Node already validated: {0}")]
    AlreadyValidated(Hash),

    #[error("Votes not yet determined for block {0}")]
    NotYetDetermined(u64),

    #[error("Not yet eligible: eta {eta}, now {now}")]
    NotYetEligible { eta: u64, now: u64 },

    #[error("Expired: deadline {deadline}, now {now}")]
    Expired { deadline: u64, now: u64 },

    #[error("Invalid identity proof")]
    InvalidProof,

    #[error("Nullifier already consumed: {0}")]
    NullifierReused(Hash),

    #[error("No queued transaction matches payload hash {0}")]
    PayloadMismatch(Hash),

    #[error("Invalid delegatee: {0}")]
    InvalidDelegatee(String),

    #[error("Signature expired: expiry {expiry}, now {now}")]
    SignatureExpired { expiry: u64, now: u64 },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },

    #[error("Proposal must have at least one action")]
    NoActions,

    #[error("Too many actions: max {max}, got {actual}")]
    TooManyActions { max: usize, actual: usize },

    #[error("Proposer already has a live proposal: {0}")]
    LiveProposalExists(u64),

    #[error("Insufficient balance: have {balance}, need {amount}")]
    InsufficientBalance { balance: u128, amount: u128 },

    #[error("Vote arithmetic overflow")]
    VoteOverflow,

    #[error("Timelock delay out of bounds: {delay} not in [{min}, {max}]")]
    DelayOutOfBounds { delay: u64, min: u64, max: u64 },

    #[error("Eta too early: {eta} before minimum {minimum}")]
    EtaTooEarly { eta: u64, minimum: u64 },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::Unauthorized("below threshold".to_string());
        assert!(err.to_string().contains("below threshold"));
    }

    #[test]
    fn test_eta_error_fields() {
        let err = GovernanceError::NotYetEligible { eta: 200, now: 100 };
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("100"));
    }
}
