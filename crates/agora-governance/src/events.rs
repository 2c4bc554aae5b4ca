//! State-change notifications for off-chain indexers.
//!
//! Each component appends to an internal log that the host environment drains
//! after every operation. Every event carries enough fields to reconstruct
//! the corresponding state transition without re-reading component state.

use agora_types::{Address, Hash};
use serde::{Deserialize, Serialize};

use crate::ledger::Delegatee;
use crate::proposal::{ProposalAction, VoteSupport};

/// A governance state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    ProposalCreated {
        id: u64,
        proposer: Address,
        actions: Vec<ProposalAction>,
        start_block: u64,
        end_block: u64,
        description: String,
    },
    VoteCast {
        voter: Address,
        proposal_id: u64,
        support: VoteSupport,
        votes: u128,
        reason: Option<String>,
    },
    ProposalQueued {
        id: u64,
        eta: u64,
    },
    ProposalExecuted {
        id: u64,
    },
    ProposalCanceled {
        id: u64,
    },
    DelegateChanged {
        delegator: Address,
        previous: Option<Delegatee>,
        current: Delegatee,
    },
    DelegateVotesChanged {
        delegatee: Delegatee,
        previous: u128,
        current: u128,
    },
    TransactionQueued {
        tx_hash: Hash,
        target: Address,
        value: u128,
        signature: String,
        data: Vec<u8>,
        eta: u64,
    },
    TransactionCanceled {
        tx_hash: Hash,
    },
    TransactionExecuted {
        tx_hash: Hash,
        target: Address,
        value: u128,
        signature: String,
        data: Vec<u8>,
        eta: u64,
    },
    NewPendingAdmin {
        pending_admin: Address,
    },
    NewAdmin {
        admin: Address,
    },
    NewDelay {
        delay: u64,
    },
    EnsNodeValidated {
        node: Hash,
        owner: Address,
        nullifier_hash: Hash,
    },
}
