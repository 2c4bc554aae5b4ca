//! Checkpointed voting-power ledger.
//!
//! The single source of truth for "how many votes did X control at block B".
//! Balance and delegation changes append checkpoints; historical lookups
//! binary-search the per-delegatee checkpoint sequence in logarithmic time.

use std::collections::HashMap;

use agora_crypto::{delegation_digest, verify_digest, SigningDomain};
use agora_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::GovernanceError;
use crate::events::GovernanceEvent;

/// Target of a delegation: a plain account, or a naming-system node that is
/// resolved lazily at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delegatee {
    Account(Address),
    Name(Hash),
}

impl Delegatee {
    /// 32-byte word form used in typed signing digests: a left-padded address
    /// or the node hash itself.
    pub fn to_word(&self) -> [u8; 32] {
        match self {
            Delegatee::Account(addr) => addr.to_word(),
            Delegatee::Name(node) => *node.as_bytes(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Delegatee::Account(addr) => addr.is_zero(),
            Delegatee::Name(node) => node.is_zero(),
        }
    }
}

/// Recorded (block, votes) snapshot for a delegatee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block: u64,
    pub votes: u128,
}

/// Per-account balances, delegation targets, and the append-only checkpoint
/// history of delegated voting power.
#[derive(Debug)]
pub struct VotingPowerLedger {
    /// Raw token balance per account
    balances: HashMap<Address, u128>,
    /// Total minted supply
    total_supply: u128,
    /// Current delegation target per account
    delegates: HashMap<Address, Delegatee>,
    /// Checkpoint sequences, strictly increasing in block per delegatee
    checkpoints: HashMap<Delegatee, Vec<Checkpoint>>,
    /// Signing nonces for delegate-by-signature
    nonces: HashMap<Address, u64>,
    /// Typed-digest domain for off-chain delegations
    domain: SigningDomain,
    /// Pending events for the host to drain
    events: Vec<GovernanceEvent>,
}

impl VotingPowerLedger {
    /// Create an empty ledger signing under `domain`.
    pub fn new(domain: SigningDomain) -> Self {
        Self {
            balances: HashMap::new(),
            total_supply: 0,
            delegates: HashMap::new(),
            checkpoints: HashMap::new(),
            nonces: HashMap::new(),
            domain,
            events: Vec::new(),
        }
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Current delegation target for an account, if any.
    pub fn delegate_of(&self, account: Address) -> Option<Delegatee> {
        self.delegates.get(&account).copied()
    }

    /// Next expected delegate-by-signature nonce for a signer.
    pub fn nonce_of(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or(0)
    }

    /// Drain pending events.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Mint tokens to an account, crediting its delegatee's checkpoint.
    pub fn mint(
        &mut self,
        to: Address,
        amount: u128,
        clock: Clock,
    ) -> Result<(), GovernanceError> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(GovernanceError::VoteOverflow)?;
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(GovernanceError::VoteOverflow)?;

        let to_delegatee = self.delegates.get(&to).copied();
        self.move_voting_power(None, to_delegatee, amount, clock.block);
        Ok(())
    }

    /// Transfer tokens between accounts, moving delegated power with them.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: u128,
        clock: Clock,
    ) -> Result<(), GovernanceError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(GovernanceError::InsufficientBalance {
                balance: from_balance,
                amount,
            });
        }
        self.balances.insert(from, from_balance - amount);
        let to_balance = self.balances.entry(to).or_insert(0);
        *to_balance = to_balance
            .checked_add(amount)
            .ok_or(GovernanceError::VoteOverflow)?;

        let from_delegatee = self.delegates.get(&from).copied();
        let to_delegatee = self.delegates.get(&to).copied();
        self.move_voting_power(from_delegatee, to_delegatee, amount, clock.block);
        Ok(())
    }

    /// Delegate an account's full balance to `delegatee`.
    ///
    /// No-op if the target equals the current delegatee. Power moves at the
    /// current block: one checkpoint on the old target, one on the new.
    pub fn delegate(
        &mut self,
        account: Address,
        delegatee: Delegatee,
        clock: Clock,
    ) -> Result<(), GovernanceError> {
        if delegatee.is_zero() {
            return Err(GovernanceError::InvalidDelegatee(
                "cannot delegate to the zero target".to_string(),
            ));
        }
        let previous = self.delegates.get(&account).copied();
        if previous == Some(delegatee) {
            return Ok(());
        }

        let balance = self.balance_of(account);
        self.delegates.insert(account, delegatee);
        self.move_voting_power(previous, Some(delegatee), balance, clock.block);

        tracing::debug!(
            "delegate changed for {}: {:?} -> {:?}",
            account,
            previous,
            delegatee
        );
        self.events.push(GovernanceEvent::DelegateChanged {
            delegator: account,
            previous,
            current: delegatee,
        });
        Ok(())
    }

    /// Apply an off-chain-signed delegation.
    ///
    /// Verifies the typed digest against the signer's key, checks expiry and
    /// the signer's nonce, then runs the identical logic as [`Self::delegate`].
    /// Returns the recovered signer address.
    pub fn delegate_by_sig(
        &mut self,
        public_key: Ed25519PublicKey,
        signature: Ed25519Signature,
        delegatee: Delegatee,
        nonce: u64,
        expiry: u64,
        clock: Clock,
    ) -> Result<Address, GovernanceError> {
        if clock.timestamp > expiry {
            return Err(GovernanceError::SignatureExpired {
                expiry,
                now: clock.timestamp,
            });
        }
        let digest = delegation_digest(&self.domain, &delegatee.to_word(), nonce, expiry);
        verify_digest(&public_key, &digest, &signature)
            .map_err(|_| GovernanceError::InvalidSignature)?;

        let signer = public_key.to_address();
        let expected = self.nonce_of(signer);
        if expected != nonce {
            return Err(GovernanceError::InvalidNonce {
                expected,
                actual: nonce,
            });
        }

        self.delegate(signer, delegatee, clock)?;
        self.nonces.insert(signer, expected + 1);
        Ok(signer)
    }

    /// Most recent checkpointed voting power for an account, zero if none.
    pub fn get_current_votes(&self, account: Address) -> u128 {
        self.get_current_votes_for(Delegatee::Account(account))
    }

    /// Most recent checkpointed voting power for any delegatee unit.
    pub fn get_current_votes_for(&self, delegatee: Delegatee) -> u128 {
        self.checkpoints
            .get(&delegatee)
            .and_then(|cps| cps.last())
            .map(|cp| cp.votes)
            .unwrap_or(0)
    }

    /// Voting power of `account` as of `block`.
    ///
    /// Historical lookups only: fails with `NotYetDetermined` unless
    /// `block < clock.block`. Runs in O(log n) over the checkpoint sequence.
    pub fn get_prior_votes(
        &self,
        account: Address,
        block: u64,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        self.get_prior_votes_for(Delegatee::Account(account), block, clock)
    }

    /// Historical voting power for any delegatee unit (accounts and name
    /// nodes share the same checkpoint store).
    pub fn get_prior_votes_for(
        &self,
        delegatee: Delegatee,
        block: u64,
        clock: Clock,
    ) -> Result<u128, GovernanceError> {
        if block >= clock.block {
            return Err(GovernanceError::NotYetDetermined(block));
        }
        let cps = match self.checkpoints.get(&delegatee) {
            Some(cps) => cps,
            None => return Ok(0),
        };
        let votes = match cps.binary_search_by(|cp| cp.block.cmp(&block)) {
            Ok(i) => cps[i].votes,
            Err(0) => 0,
            Err(i) => cps[i - 1].votes,
        };
        Ok(votes)
    }

    /// Full checkpoint sequence for a delegatee (read-only).
    pub fn checkpoints_of(&self, delegatee: Delegatee) -> &[Checkpoint] {
        self.checkpoints
            .get(&delegatee)
            .map(|cps| cps.as_slice())
            .unwrap_or(&[])
    }

    /// Move `amount` of voting power between delegatee checkpoints.
    ///
    /// All mutation of checkpoints funnels through here; either side being
    /// absent (undelegated) is a no-op for that side.
    fn move_voting_power(
        &mut self,
        from: Option<Delegatee>,
        to: Option<Delegatee>,
        amount: u128,
        block: u64,
    ) {
        if amount == 0 || from == to {
            return;
        }
        if let Some(from) = from {
            let previous = self.get_current_votes_for(from);
            let current = previous.saturating_sub(amount);
            self.write_checkpoint(from, block, current);
            self.events.push(GovernanceEvent::DelegateVotesChanged {
                delegatee: from,
                previous,
                current,
            });
        }
        if let Some(to) = to {
            let previous = self.get_current_votes_for(to);
            let current = previous.saturating_add(amount);
            self.write_checkpoint(to, block, current);
            self.events.push(GovernanceEvent::DelegateVotesChanged {
                delegatee: to,
                previous,
                current,
            });
        }
    }

    /// Append a checkpoint, overwriting the last entry when it shares the
    /// same block so heights stay strictly increasing.
    fn write_checkpoint(&mut self, delegatee: Delegatee, block: u64, votes: u128) {
        let cps = self.checkpoints.entry(delegatee).or_default();
        match cps.last_mut() {
            Some(last) if last.block == block => last.votes = votes,
            _ => cps.push(Checkpoint { block, votes }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_address(n: u8) -> Address {
        let mut addr = [0u8; 20];
        addr[19] = n;
        Address::from_bytes(addr)
    }

    fn test_domain() -> SigningDomain {
        SigningDomain::new("Governance Token", 1, test_address(0xff))
    }

    fn ledger_with_balance(account: Address, amount: u128, clock: Clock) -> VotingPowerLedger {
        let mut ledger = VotingPowerLedger::new(test_domain());
        ledger.mint(account, amount, clock).unwrap();
        ledger
    }

    #[test]
    fn test_delegate_moves_current_votes() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let bob = test_address(2);
        let mut ledger = ledger_with_balance(alice, 1_000, clock);

        // Undelegated balance counts for nobody
        assert_eq!(ledger.get_current_votes(alice), 0);
        assert_eq!(ledger.get_current_votes(bob), 0);

        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        assert_eq!(ledger.get_current_votes(bob), 1_000);
        assert_eq!(ledger.get_current_votes(alice), 0);
    }

    #[test]
    fn test_redelegate_conserves_power() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let bob = test_address(2);
        let carol = test_address(3);
        let mut ledger = ledger_with_balance(alice, 700, clock);

        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        let mut later = clock;
        later.advance_blocks(5);
        ledger.delegate(alice, Delegatee::Account(carol), later).unwrap();

        assert_eq!(ledger.get_current_votes(bob), 0);
        assert_eq!(ledger.get_current_votes(carol), 700);
    }

    #[test]
    fn test_delegate_same_target_is_noop() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let bob = test_address(2);
        let mut ledger = ledger_with_balance(alice, 10, clock);

        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        ledger.drain_events();
        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        assert!(ledger.drain_events().is_empty());
    }

    #[test]
    fn test_delegate_zero_target_fails() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let mut ledger = ledger_with_balance(alice, 10, clock);

        let result = ledger.delegate(alice, Delegatee::Account(Address::ZERO), clock);
        assert!(matches!(result, Err(GovernanceError::InvalidDelegatee(_))));

        let result = ledger.delegate(alice, Delegatee::Name(Hash::ZERO), clock);
        assert!(matches!(result, Err(GovernanceError::InvalidDelegatee(_))));
    }

    #[test]
    fn test_delegate_to_name_node() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let node = Hash::node("cool.eth");
        let mut ledger = ledger_with_balance(alice, 250, clock);

        ledger.delegate(alice, Delegatee::Name(node), clock).unwrap();
        assert_eq!(ledger.get_current_votes_for(Delegatee::Name(node)), 250);
        // Nothing lands on the raw account key
        assert_eq!(ledger.get_current_votes(alice), 0);
    }

    #[test]
    fn test_transfer_moves_delegated_power() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let bob = test_address(2);
        let rep_a = test_address(10);
        let rep_b = test_address(11);

        let mut ledger = ledger_with_balance(alice, 1_000, clock);
        ledger.mint(bob, 500, clock).unwrap();
        ledger.delegate(alice, Delegatee::Account(rep_a), clock).unwrap();
        ledger.delegate(bob, Delegatee::Account(rep_b), clock).unwrap();

        ledger.transfer(alice, bob, 400, clock).unwrap();

        assert_eq!(ledger.balance_of(alice), 600);
        assert_eq!(ledger.balance_of(bob), 900);
        assert_eq!(ledger.get_current_votes(rep_a), 600);
        assert_eq!(ledger.get_current_votes(rep_b), 900);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let bob = test_address(2);
        let mut ledger = ledger_with_balance(alice, 100, clock);

        let result = ledger.transfer(alice, bob, 101, clock);
        assert!(matches!(
            result,
            Err(GovernanceError::InsufficientBalance { balance: 100, amount: 101 })
        ));
    }

    #[test]
    fn test_prior_votes_requires_historical_block() {
        let clock = Clock::new(100, 600);
        let alice = test_address(1);
        let ledger = ledger_with_balance(alice, 10, clock);

        assert!(matches!(
            ledger.get_prior_votes(alice, 100, clock),
            Err(GovernanceError::NotYetDetermined(100))
        ));
        assert!(matches!(
            ledger.get_prior_votes(alice, 101, clock),
            Err(GovernanceError::NotYetDetermined(101))
        ));
        assert_eq!(ledger.get_prior_votes(alice, 99, clock).unwrap(), 0);
    }

    #[test]
    fn test_prior_votes_binary_search() {
        let alice = test_address(1);
        let bob = test_address(2);
        let mut clock = Clock::new(10, 60);
        let mut ledger = ledger_with_balance(alice, 100, clock);

        // Checkpoints at blocks 10 (100), 20 (300), 30 (600)
        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        clock.advance_blocks(10);
        ledger.mint(alice, 200, clock).unwrap();
        clock.advance_blocks(10);
        ledger.mint(alice, 300, clock).unwrap();
        clock.advance_blocks(10);

        assert_eq!(ledger.get_prior_votes(bob, 9, clock).unwrap(), 0);
        assert_eq!(ledger.get_prior_votes(bob, 10, clock).unwrap(), 100);
        assert_eq!(ledger.get_prior_votes(bob, 15, clock).unwrap(), 100);
        assert_eq!(ledger.get_prior_votes(bob, 20, clock).unwrap(), 300);
        assert_eq!(ledger.get_prior_votes(bob, 29, clock).unwrap(), 300);
        assert_eq!(ledger.get_prior_votes(bob, 30, clock).unwrap(), 600);
        assert_eq!(ledger.get_prior_votes(bob, 39, clock).unwrap(), 600);
    }

    #[test]
    fn test_same_block_checkpoint_overwrites() {
        let clock = Clock::new(50, 300);
        let alice = test_address(1);
        let bob = test_address(2);
        let mut ledger = ledger_with_balance(alice, 100, clock);

        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();
        ledger.mint(alice, 50, clock).unwrap();

        let cps = ledger.checkpoints_of(Delegatee::Account(bob));
        assert_eq!(cps.len(), 1);
        assert_eq!(cps[0].block, 50);
        assert_eq!(cps[0].votes, 150);
    }

    #[test]
    fn test_checkpoint_blocks_strictly_increasing() {
        let alice = test_address(1);
        let bob = test_address(2);
        let mut clock = Clock::new(1, 6);
        let mut ledger = ledger_with_balance(alice, 10, clock);
        ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();

        for _ in 0..20 {
            clock.advance_blocks(3);
            ledger.mint(alice, 1, clock).unwrap();
        }

        let cps = ledger.checkpoints_of(Delegatee::Account(bob));
        for pair in cps.windows(2) {
            assert!(pair[0].block < pair[1].block);
        }
    }

    #[test]
    fn test_delegate_by_sig() {
        let keypair = agora_crypto::Keypair::from_seed(&[5u8; 32]);
        let signer = keypair.address();
        let bob = test_address(2);
        let clock = Clock::new(100, 600);

        let mut ledger = VotingPowerLedger::new(test_domain());
        ledger.mint(signer, 42, clock).unwrap();

        let delegatee = Delegatee::Account(bob);
        let digest = delegation_digest(&test_domain(), &delegatee.to_word(), 0, 1_000);
        let signature = keypair.sign_digest(&digest);

        let recovered = ledger
            .delegate_by_sig(keypair.public_key(), signature, delegatee, 0, 1_000, clock)
            .unwrap();
        assert_eq!(recovered, signer);
        assert_eq!(ledger.get_current_votes(bob), 42);
        assert_eq!(ledger.nonce_of(signer), 1);
    }

    #[test]
    fn test_delegate_by_sig_expired() {
        let keypair = agora_crypto::Keypair::from_seed(&[5u8; 32]);
        let clock = Clock::new(100, 2_000);
        let mut ledger = VotingPowerLedger::new(test_domain());

        let delegatee = Delegatee::Account(test_address(2));
        let digest = delegation_digest(&test_domain(), &delegatee.to_word(), 0, 1_000);
        let signature = keypair.sign_digest(&digest);

        let result =
            ledger.delegate_by_sig(keypair.public_key(), signature, delegatee, 0, 1_000, clock);
        assert!(matches!(result, Err(GovernanceError::SignatureExpired { .. })));
    }

    #[test]
    fn test_delegate_by_sig_replay_rejected() {
        let keypair = agora_crypto::Keypair::from_seed(&[5u8; 32]);
        let clock = Clock::new(100, 600);
        let mut ledger = VotingPowerLedger::new(test_domain());

        let delegatee = Delegatee::Account(test_address(2));
        let digest = delegation_digest(&test_domain(), &delegatee.to_word(), 0, 1_000);
        let signature = keypair.sign_digest(&digest);

        ledger
            .delegate_by_sig(keypair.public_key(), signature, delegatee, 0, 1_000, clock)
            .unwrap();

        // Same nonce again: rejected
        let result =
            ledger.delegate_by_sig(keypair.public_key(), signature, delegatee, 0, 1_000, clock);
        assert!(matches!(
            result,
            Err(GovernanceError::InvalidNonce { expected: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_delegate_by_sig_bad_signature() {
        let keypair = agora_crypto::Keypair::from_seed(&[5u8; 32]);
        let other = agora_crypto::Keypair::from_seed(&[6u8; 32]);
        let clock = Clock::new(100, 600);
        let mut ledger = VotingPowerLedger::new(test_domain());

        let delegatee = Delegatee::Account(test_address(2));
        let digest = delegation_digest(&test_domain(), &delegatee.to_word(), 0, 1_000);
        let signature = other.sign_digest(&digest);

        let result =
            ledger.delegate_by_sig(keypair.public_key(), signature, delegatee, 0, 1_000, clock);
        assert!(matches!(result, Err(GovernanceError::InvalidSignature)));
    }

    proptest! {
        /// Once a block is in the past, its reading never changes no matter
        /// what happens at later blocks.
        #[test]
        fn prop_historical_votes_immutable(
            mints in proptest::collection::vec((1u128..1_000, 1u64..5), 1..40)
        ) {
            let alice = test_address(1);
            let bob = test_address(2);
            let mut clock = Clock::new(1, 6);
            let mut ledger = VotingPowerLedger::new(test_domain());
            ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();

            let mut snapshots: Vec<(u64, u128)> = Vec::new();
            for (amount, gap) in mints {
                ledger.mint(alice, amount, clock).unwrap();
                snapshots.push((clock.block, ledger.get_current_votes(bob)));
                clock.advance_blocks(gap);
            }

            clock.advance_blocks(1);
            for (block, expected) in snapshots {
                prop_assert_eq!(
                    ledger.get_prior_votes(bob, block, clock).unwrap(),
                    expected
                );
            }
        }

        /// Binary search agrees with a linear scan for arbitrary queries.
        #[test]
        fn prop_binary_search_matches_linear(
            mints in proptest::collection::vec((1u128..100, 1u64..7), 1..30),
            query_seed in proptest::num::u64::ANY
        ) {
            let alice = test_address(1);
            let bob = test_address(2);
            let mut clock = Clock::new(1, 6);
            let mut ledger = VotingPowerLedger::new(test_domain());
            ledger.delegate(alice, Delegatee::Account(bob), clock).unwrap();

            for (amount, gap) in mints {
                ledger.mint(alice, amount, clock).unwrap();
                clock.advance_blocks(gap);
            }

            let cps: Vec<Checkpoint> = ledger.checkpoints_of(Delegatee::Account(bob)).to_vec();
            // Always historical: the loop above advances past block 1
            let query = query_seed % clock.block;

            let linear = cps
                .iter()
                .rev()
                .find(|cp| cp.block <= query)
                .map(|cp| cp.votes)
                .unwrap_or(0);
            prop_assert_eq!(ledger.get_prior_votes(bob, query, clock).unwrap(), linear);
        }
    }
}
