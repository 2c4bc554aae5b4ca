//! On-chain governance engine.
//!
//! The engine is a set of plain state machines driven by the host
//! environment: a checkpointed voting-power ledger, a governor that runs
//! proposals through their lifecycle, a delayed-execution timelock, and a
//! personhood registry that lets naming-system nodes route Sybil-resistant
//! voting power. There is no scheduler and no I/O; every operation takes a
//! [`Clock`] snapshot, and external systems (name resolution, proof
//! verification, call execution) enter through traits.
//!
//! A typical lifecycle:
//!
//! 1. token holders [`delegate`](VotingPowerLedger::delegate) to an account
//!    or a name node,
//! 2. a holder above the threshold [`propose`](Governor::propose)s,
//! 3. ballots are [cast](Governor::cast_vote) during the voting window,
//! 4. a succeeded proposal is [`queue`](Governor::queue)d into the
//!    [`TimelockQueue`] and, after the delay, [`execute`](Governor::execute)d.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod proposal;
pub mod registry;
pub mod resolver;
pub mod timelock;

pub use clock::{Clock, SECONDS_PER_BLOCK};
pub use config::{GovernorConfig, MAX_PROPOSAL_ACTIONS, ONE_TOKEN};
pub use error::GovernanceError;
pub use events::GovernanceEvent;
pub use ledger::{Checkpoint, Delegatee, VotingPowerLedger};
pub use proposal::{
    Governor, Proposal, ProposalAction, ProposalState, VoteReceipt, VoteSupport,
};
pub use registry::{IdentityRegistry, IdentityVerifier, NodeRecord, ProofBytes};
pub use resolver::{prior_votes_with_ens, verified_node, NameResolver};
pub use timelock::{
    CallExecutor, TimelockQueue, GRACE_PERIOD, MAXIMUM_DELAY, MINIMUM_DELAY,
};
