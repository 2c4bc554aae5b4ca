//! Proposal lifecycle.
//!
//! Proposals move through a fixed state machine driven entirely by the clock
//! snapshot handed to each operation: Pending until voting opens, Active
//! through the voting window, then Defeated or Succeeded by tally, Queued
//! once staged in the timelock, and finally Executed or Expired. Canceled is
//! terminal from any non-Executed state. Vote weight is always read at the
//! proposal's start block, so tokens acquired mid-vote carry no weight.

use std::collections::{HashMap, HashSet};

use agora_crypto::{ballot_digest, ballot_with_reason_digest, verify_digest, SigningDomain};
use agora_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::GovernorConfig;
use crate::error::GovernanceError;
use crate::events::GovernanceEvent;
use crate::ledger::{Delegatee, VotingPowerLedger};
use crate::registry::IdentityRegistry;
use crate::resolver::{verified_node, NameResolver};
use crate::timelock::{CallExecutor, TimelockQueue, GRACE_PERIOD};

/// Lifecycle state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

/// Ballot direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteSupport {
    Against,
    For,
    Abstain,
}

impl VoteSupport {
    pub fn from_u8(value: u8) -> Result<Self, GovernanceError> {
        match value {
            0 => Ok(VoteSupport::Against),
            1 => Ok(VoteSupport::For),
            2 => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidParameter(format!(
                "unknown vote support {other}"
            ))),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            VoteSupport::Against => 0,
            VoteSupport::For => 1,
            VoteSupport::Abstain => 2,
        }
    }
}

/// One call a proposal wants the timelock to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub target: Address,
    pub value: u128,
    pub signature: String,
    pub calldata: Vec<u8>,
}

/// Record of one cast ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub support: VoteSupport,
    pub votes: u128,
}

/// A governance proposal and its running tally.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    pub actions: Vec<ProposalAction>,
    pub description: String,
    /// Voting opens at the block after this one; weight snapshots here
    pub start_block: u64,
    /// Last block of the voting window
    pub end_block: u64,
    /// Timelock eta once queued, zero while unqueued
    pub eta: u64,
    pub for_votes: u128,
    pub against_votes: u128,
    pub abstain_votes: u128,
    pub receipts: HashMap<Address, VoteReceipt>,
    pub canceled: bool,
    pub executed: bool,
}

/// The governor: accepts proposals, tallies ballots, and drives accepted
/// proposals through the timelock.
#[derive(Debug)]
pub struct Governor {
    /// This component's own address; it is the timelock admin once handoff
    /// completes.
    address: Address,
    guardian: Address,
    config: GovernorConfig,
    domain: SigningDomain,
    proposals: HashMap<u64, Proposal>,
    proposal_count: u64,
    /// Most recent proposal per proposer, for the one-live-proposal rule
    latest_proposal: HashMap<Address, u64>,
    events: Vec<GovernanceEvent>,
}

impl Governor {
    pub fn new(
        address: Address,
        guardian: Address,
        config: GovernorConfig,
        domain: SigningDomain,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self {
            address,
            guardian,
            config,
            domain,
            proposals: HashMap::new(),
            proposal_count: 0,
            latest_proposal: HashMap::new(),
            events: Vec::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn guardian(&self) -> Address {
        self.guardian
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn proposal_count(&self) -> u64 {
        self.proposal_count
    }

    pub fn proposal(&self, id: u64) -> Result<&Proposal, GovernanceError> {
        self.proposals
            .get(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// The ballot receipt `voter` holds on a proposal, if any.
    pub fn receipt(&self, id: u64, voter: Address) -> Result<Option<&VoteReceipt>, GovernanceError> {
        Ok(self.proposal(id)?.receipts.get(&voter))
    }

    /// Drain pending events.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current lifecycle state of a proposal.
    pub fn state(&self, id: u64, clock: Clock) -> Result<ProposalState, GovernanceError> {
        let proposal = self.proposal(id)?;
        let state = if proposal.canceled {
            ProposalState::Canceled
        } else if clock.block <= proposal.start_block {
            ProposalState::Pending
        } else if clock.block <= proposal.end_block {
            ProposalState::Active
        } else if proposal.for_votes <= proposal.against_votes
            || proposal.for_votes < self.config.quorum_votes
        {
            ProposalState::Defeated
        } else if proposal.eta == 0 {
            ProposalState::Succeeded
        } else if proposal.executed {
            ProposalState::Executed
        } else if clock.timestamp > proposal.eta.saturating_add(GRACE_PERIOD) {
            ProposalState::Expired
        } else {
            ProposalState::Queued
        };
        Ok(state)
    }

    /// Submit a proposal.
    ///
    /// The proposer must have held at least the proposal threshold of votes
    /// at the previous block and must not have another proposal still in its
    /// Pending or Active phase.
    pub fn propose(
        &mut self,
        proposer: Address,
        actions: Vec<ProposalAction>,
        description: String,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u64, GovernanceError> {
        if actions.is_empty() {
            return Err(GovernanceError::NoActions);
        }
        if actions.len() > self.config.max_actions {
            return Err(GovernanceError::TooManyActions {
                max: self.config.max_actions,
                actual: actions.len(),
            });
        }

        let votes = ledger.get_prior_votes(proposer, clock.block.saturating_sub(1), clock)?;
        if votes < self.config.proposal_threshold {
            return Err(GovernanceError::Unauthorized(format!(
                "proposer votes {} below threshold {}",
                votes, self.config.proposal_threshold
            )));
        }

        if let Some(&latest) = self.latest_proposal.get(&proposer) {
            match self.state(latest, clock)? {
                ProposalState::Pending | ProposalState::Active => {
                    return Err(GovernanceError::LiveProposalExists(latest));
                }
                _ => {}
            }
        }

        self.proposal_count += 1;
        let id = self.proposal_count;
        let start_block = clock.block + self.config.voting_delay;
        let end_block = start_block + self.config.voting_period;

        let proposal = Proposal {
            id,
            proposer,
            actions: actions.clone(),
            description: description.clone(),
            start_block,
            end_block,
            eta: 0,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            receipts: HashMap::new(),
            canceled: false,
            executed: false,
        };
        self.proposals.insert(id, proposal);
        self.latest_proposal.insert(proposer, id);

        tracing::info!("proposal {} created by {}", id, proposer);
        self.events.push(GovernanceEvent::ProposalCreated {
            id,
            proposer,
            actions,
            start_block,
            end_block,
            description,
        });
        Ok(id)
    }

    /// Cast a ballot with direct voting power only.
    pub fn cast_vote(
        &mut self,
        voter: Address,
        id: u64,
        support: VoteSupport,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        self.cast_ballot(voter, id, support, None, None, ledger, clock)
    }

    /// Cast a ballot carrying a reason string.
    pub fn cast_vote_with_reason(
        &mut self,
        voter: Address,
        id: u64,
        support: VoteSupport,
        reason: String,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        self.cast_ballot(voter, id, support, None, Some(reason), ledger, clock)
    }

    /// Cast a ballot that also counts power delegated to the voter's
    /// verified name node, provided the node is personhood-validated.
    pub fn cast_vote_with_ens(
        &mut self,
        voter: Address,
        id: u64,
        support: VoteSupport,
        resolver: &dyn NameResolver,
        registry: &IdentityRegistry,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        self.cast_ballot(
            voter,
            id,
            support,
            Some((resolver, registry)),
            None,
            ledger,
            clock,
        )
    }

    /// Submit an off-chain-signed ballot on behalf of its signer.
    #[allow(clippy::too_many_arguments)]
    pub fn cast_vote_by_sig(
        &mut self,
        public_key: Ed25519PublicKey,
        signature: Ed25519Signature,
        id: u64,
        support: u8,
        use_ens: bool,
        resolver: &dyn NameResolver,
        registry: &IdentityRegistry,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        let digest = ballot_digest(&self.domain, id, support, use_ens);
        verify_digest(&public_key, &digest, &signature)
            .map_err(|_| GovernanceError::InvalidSignature)?;

        let voter = public_key.to_address();
        let support = VoteSupport::from_u8(support)?;
        let ens = use_ens.then_some((resolver, registry));
        self.cast_ballot(voter, id, support, ens, None, ledger, clock)
    }

    /// Submit an off-chain-signed ballot with a reason string.
    #[allow(clippy::too_many_arguments)]
    pub fn cast_vote_with_reason_by_sig(
        &mut self,
        public_key: Ed25519PublicKey,
        signature: Ed25519Signature,
        id: u64,
        support: u8,
        use_ens: bool,
        reason: String,
        resolver: &dyn NameResolver,
        registry: &IdentityRegistry,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        let digest = ballot_with_reason_digest(&self.domain, id, support, use_ens, &reason);
        verify_digest(&public_key, &digest, &signature)
            .map_err(|_| GovernanceError::InvalidSignature)?;

        let voter = public_key.to_address();
        let support = VoteSupport::from_u8(support)?;
        let ens = use_ens.then_some((resolver, registry));
        self.cast_ballot(voter, id, support, ens, Some(reason), ledger, clock)
    }

    /// Stage every action of a succeeded proposal in the timelock.
    ///
    /// Permissionless: anyone may queue a proposal the voters accepted. All
    /// action hashes are checked before any is queued, so a collision with an
    /// already pending transaction leaves the timelock untouched.
    pub fn queue(
        &mut self,
        id: u64,
        timelock: &mut TimelockQueue,
        clock: Clock,
    ) -> Result<u64, GovernanceError> {
        match self.state(id, clock)? {
            ProposalState::Succeeded => {}
            other => {
                return Err(GovernanceError::InvalidState(format!(
                    "cannot queue proposal in state {other:?}"
                )));
            }
        }

        let eta = clock.timestamp.saturating_add(timelock.delay());
        let actions = self.proposal(id)?.actions.clone();
        // All hashes are vetted before any is queued, including collisions
        // within the action list itself, so a failure here leaves the
        // timelock untouched.
        let mut hashes = HashSet::with_capacity(actions.len());
        for action in &actions {
            let tx_hash = TimelockQueue::transaction_hash(
                action.target,
                action.value,
                &action.signature,
                &action.calldata,
                eta,
            );
            if timelock.is_queued(tx_hash) || !hashes.insert(tx_hash) {
                return Err(GovernanceError::AlreadyQueued(tx_hash));
            }
        }
        for action in &actions {
            timelock.queue_transaction(
                self.address,
                action.target,
                action.value,
                &action.signature,
                &action.calldata,
                eta,
                clock,
            )?;
        }

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        proposal.eta = eta;
        tracing::info!("proposal {} queued for eta {}", id, eta);
        self.events.push(GovernanceEvent::ProposalQueued { id, eta });
        Ok(eta)
    }

    /// Execute every action of a queued proposal through the timelock.
    ///
    /// If a later action fails, the hashes of the actions already performed
    /// are re-marked pending so the whole proposal stays Queued and
    /// retryable within its grace window.
    pub fn execute(
        &mut self,
        id: u64,
        timelock: &mut TimelockQueue,
        executor: &mut dyn CallExecutor,
        clock: Clock,
    ) -> Result<(), GovernanceError> {
        match self.state(id, clock)? {
            ProposalState::Queued => {}
            ProposalState::Executed => return Err(GovernanceError::AlreadyExecuted),
            other => {
                return Err(GovernanceError::InvalidState(format!(
                    "cannot execute proposal in state {other:?}"
                )));
            }
        }

        let (actions, eta) = {
            let proposal = self.proposal(id)?;
            (proposal.actions.clone(), proposal.eta)
        };
        let mut done: Vec<Hash> = Vec::with_capacity(actions.len());
        for action in &actions {
            let result = timelock.execute_transaction(
                self.address,
                executor,
                action.target,
                action.value,
                &action.signature,
                &action.calldata,
                eta,
                clock,
            );
            match result {
                Ok(tx_hash) => done.push(tx_hash),
                Err(e) => {
                    for tx_hash in done {
                        timelock.restore_pending(tx_hash);
                    }
                    return Err(e);
                }
            }
        }

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        proposal.executed = true;
        tracing::info!("proposal {} executed", id);
        self.events.push(GovernanceEvent::ProposalExecuted { id });
        Ok(())
    }

    /// Cancel a proposal and unqueue any of its staged transactions.
    ///
    /// The guardian may always cancel. Anyone may cancel once the proposer's
    /// voting power has fallen below the proposal threshold.
    pub fn cancel(
        &mut self,
        caller: Address,
        id: u64,
        timelock: &mut TimelockQueue,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<(), GovernanceError> {
        if self.state(id, clock)? == ProposalState::Executed {
            return Err(GovernanceError::AlreadyExecuted);
        }
        let (proposer, actions, eta) = {
            let proposal = self.proposal(id)?;
            (
                proposal.proposer,
                proposal.actions.clone(),
                proposal.eta,
            )
        };

        if caller != self.guardian {
            let proposer_votes =
                ledger.get_prior_votes(proposer, clock.block.saturating_sub(1), clock)?;
            if proposer_votes >= self.config.proposal_threshold {
                return Err(GovernanceError::Unauthorized(
                    "only the guardian may cancel while the proposer holds threshold power"
                        .to_string(),
                ));
            }
        }

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        proposal.canceled = true;
        if eta != 0 {
            for action in &actions {
                timelock.cancel_transaction(
                    self.address,
                    action.target,
                    action.value,
                    &action.signature,
                    &action.calldata,
                    eta,
                )?;
            }
        }

        tracing::info!("proposal {} canceled by {}", id, caller);
        self.events.push(GovernanceEvent::ProposalCanceled { id });
        Ok(())
    }

    /// All ballot paths funnel through here.
    fn cast_ballot(
        &mut self,
        voter: Address,
        id: u64,
        support: VoteSupport,
        ens: Option<(&dyn NameResolver, &IdentityRegistry)>,
        reason: Option<String>,
        ledger: &VotingPowerLedger,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        if self.state(id, clock)? != ProposalState::Active {
            return Err(GovernanceError::InvalidState(
                "voting is closed".to_string(),
            ));
        }
        let start_block = {
            let proposal = self.proposal(id)?;
            if proposal.receipts.contains_key(&voter) {
                return Err(GovernanceError::AlreadyVoted);
            }
            proposal.start_block
        };

        let mut votes = ledger.get_prior_votes(voter, start_block, clock)?;
        if let Some((resolver, registry)) = ens {
            // The name component counts only for a round-trip-verified node
            // that has passed personhood validation; anything else degrades
            // to the direct component alone.
            if let Some(node) =
                verified_node(resolver, voter).filter(|node| registry.is_validated(*node))
            {
                let name_votes =
                    ledger.get_prior_votes_for(Delegatee::Name(node), start_block, clock)?;
                votes = votes.saturating_add(name_votes);
            }
        }

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        match support {
            VoteSupport::Against => {
                proposal.against_votes = proposal.against_votes.saturating_add(votes)
            }
            VoteSupport::For => proposal.for_votes = proposal.for_votes.saturating_add(votes),
            VoteSupport::Abstain => {
                proposal.abstain_votes = proposal.abstain_votes.saturating_add(votes)
            }
        }
        proposal.receipts.insert(voter, VoteReceipt { support, votes });

        tracing::debug!(
            "vote cast on proposal {} by {}: {:?} with {} votes",
            id,
            voter,
            support,
            votes
        );
        self.events.push(GovernanceEvent::VoteCast {
            voter,
            proposal_id: id,
            support,
            votes,
            reason,
        });
        Ok(votes)
    }
}
