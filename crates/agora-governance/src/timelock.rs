//! Delayed-execution queue.
//!
//! The sole component permitted to perform arbitrary external calls on behalf
//! of governance. A transaction is identified by the deterministic hash of
//! (target, value, signature, data, eta); it must be queued before it can be
//! executed or canceled, becomes eligible at `eta`, and goes stale after
//! `eta + GRACE_PERIOD`.

use std::collections::HashSet;

use agora_types::{Address, Hash};

use crate::clock::Clock;
use crate::error::GovernanceError;
use crate::events::GovernanceEvent;

/// Shortest allowed queue-to-eta delay (2 days).
pub const MINIMUM_DELAY: u64 = 2 * 24 * 60 * 60;

/// Longest allowed queue-to-eta delay (30 days).
pub const MAXIMUM_DELAY: u64 = 30 * 24 * 60 * 60;

/// Window after eta during which a queued transaction stays executable
/// (14 days).
pub const GRACE_PERIOD: u64 = 14 * 24 * 60 * 60;

/// Capability for performing the actual external call of a queued
/// transaction. The host environment supplies the implementation; the
/// timelock never dispatches calls any other way.
pub trait CallExecutor {
    fn execute_call(
        &mut self,
        target: Address,
        value: u128,
        signature: &str,
        data: &[u8],
    ) -> Result<(), String>;
}

/// Pending-transaction queue with mandatory delay and admin handoff.
#[derive(Debug)]
pub struct TimelockQueue {
    /// This component's own address; self-targeted transactions administer
    /// the timelock instead of going through the executor.
    address: Address,
    admin: Address,
    pending_admin: Option<Address>,
    delay: u64,
    /// One-time direct pending-admin handoff by the deploying admin.
    bootstrap_used: bool,
    queued: HashSet<Hash>,
    events: Vec<GovernanceEvent>,
}

impl TimelockQueue {
    /// Create a timelock administered by `admin` with the given delay.
    pub fn new(address: Address, admin: Address, delay: u64) -> Result<Self, GovernanceError> {
        if delay < MINIMUM_DELAY || delay > MAXIMUM_DELAY {
            return Err(GovernanceError::DelayOutOfBounds {
                delay,
                min: MINIMUM_DELAY,
                max: MAXIMUM_DELAY,
            });
        }
        Ok(Self {
            address,
            admin,
            pending_admin: None,
            delay,
            bootstrap_used: false,
            queued: HashSet::new(),
            events: Vec::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn pending_admin(&self) -> Option<Address> {
        self.pending_admin
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn is_queued(&self, tx_hash: Hash) -> bool {
        self.queued.contains(&tx_hash)
    }

    /// Drain pending events.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Deterministic identity of a queued transaction. Variable-length fields
    /// are length-prefixed so distinct payloads can never collide.
    pub fn transaction_hash(
        target: Address,
        value: u128,
        signature: &str,
        data: &[u8],
        eta: u64,
    ) -> Hash {
        Hash::compute_multi(&[
            target.as_bytes(),
            &value.to_be_bytes(),
            &(signature.len() as u32).to_be_bytes(),
            signature.as_bytes(),
            &(data.len() as u32).to_be_bytes(),
            data,
            &eta.to_be_bytes(),
        ])
    }

    /// Mark a transaction pending. Admin only; `eta` must respect the delay.
    #[allow(clippy::too_many_arguments)]
    pub fn queue_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: u128,
        signature: &str,
        data: &[u8],
        eta: u64,
        clock: Clock,
    ) -> Result<Hash, GovernanceError> {
        self.require_admin(caller)?;
        let minimum = clock.timestamp.saturating_add(self.delay);
        if eta < minimum {
            return Err(GovernanceError::EtaTooEarly { eta, minimum });
        }

        let tx_hash = Self::transaction_hash(target, value, signature, data, eta);
        if !self.queued.insert(tx_hash) {
            return Err(GovernanceError::AlreadyQueued(tx_hash));
        }

        tracing::debug!("queued transaction {} for eta {}", tx_hash, eta);
        self.events.push(GovernanceEvent::TransactionQueued {
            tx_hash,
            target,
            value,
            signature: signature.to_string(),
            data: data.to_vec(),
            eta,
        });
        Ok(tx_hash)
    }

    /// Unmark a pending transaction. Admin only; unknown hashes are a no-op.
    pub fn cancel_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: u128,
        signature: &str,
        data: &[u8],
        eta: u64,
    ) -> Result<Hash, GovernanceError> {
        self.require_admin(caller)?;
        let tx_hash = Self::transaction_hash(target, value, signature, data, eta);
        if self.queued.remove(&tx_hash) {
            tracing::debug!("canceled transaction {}", tx_hash);
            self.events
                .push(GovernanceEvent::TransactionCanceled { tx_hash });
        }
        Ok(tx_hash)
    }

    /// Execute a pending transaction through the call executor.
    ///
    /// The pending flag is cleared only after the call succeeds, so a failed
    /// call leaves the transaction re-executable within the grace window.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_transaction(
        &mut self,
        caller: Address,
        executor: &mut dyn CallExecutor,
        target: Address,
        value: u128,
        signature: &str,
        data: &[u8],
        eta: u64,
        clock: Clock,
    ) -> Result<Hash, GovernanceError> {
        self.require_admin(caller)?;
        let tx_hash = Self::transaction_hash(target, value, signature, data, eta);
        if !self.queued.contains(&tx_hash) {
            return Err(GovernanceError::PayloadMismatch(tx_hash));
        }
        if clock.timestamp < eta {
            return Err(GovernanceError::NotYetEligible {
                eta,
                now: clock.timestamp,
            });
        }
        let deadline = eta.saturating_add(GRACE_PERIOD);
        if clock.timestamp > deadline {
            return Err(GovernanceError::Expired {
                deadline,
                now: clock.timestamp,
            });
        }

        if target == self.address {
            self.apply_self_call(signature, data)?;
        } else {
            executor
                .execute_call(target, value, signature, data)
                .map_err(GovernanceError::ExecutionFailed)?;
        }

        self.queued.remove(&tx_hash);
        tracing::info!("executed transaction {} targeting {}", tx_hash, target);
        self.events.push(GovernanceEvent::TransactionExecuted {
            tx_hash,
            target,
            value,
            signature: signature.to_string(),
            data: data.to_vec(),
            eta,
        });
        Ok(tx_hash)
    }

    /// Stage a new admin.
    ///
    /// Normally only reachable through a queued self-call; the deploying
    /// admin gets exactly one direct use to hand the queue to the governor,
    /// so a botched handoff address cannot strand the component.
    pub fn set_pending_admin(
        &mut self,
        caller: Address,
        new_admin: Address,
    ) -> Result<(), GovernanceError> {
        if caller == self.address {
            // queued self-call path
        } else if caller == self.admin && !self.bootstrap_used {
            self.bootstrap_used = true;
        } else {
            return Err(GovernanceError::Unauthorized(
                "pending admin may only be set through a queued self-call".to_string(),
            ));
        }
        self.stage_pending_admin(new_admin);
        Ok(())
    }

    /// Complete an admin handoff. Only the staged address may accept.
    pub fn accept_admin(&mut self, caller: Address) -> Result<(), GovernanceError> {
        if self.pending_admin != Some(caller) {
            return Err(GovernanceError::Unauthorized(
                "caller is not the pending admin".to_string(),
            ));
        }
        self.admin = caller;
        self.pending_admin = None;
        tracing::info!("timelock admin is now {}", caller);
        self.events
            .push(GovernanceEvent::NewAdmin { admin: caller });
        Ok(())
    }

    /// Re-mark a hash pending and retract its execution event, so a drained
    /// event stream never reports an execution that was rolled back. Used by
    /// the governor to unwind partially executed proposals when a later
    /// action fails.
    pub(crate) fn restore_pending(&mut self, tx_hash: Hash) {
        self.queued.insert(tx_hash);
        if let Some(pos) = self.events.iter().rposition(|event| {
            matches!(
                event,
                GovernanceEvent::TransactionExecuted { tx_hash: executed, .. }
                    if *executed == tx_hash
            )
        }) {
            self.events.remove(pos);
        }
    }

    fn require_admin(&self, caller: Address) -> Result<(), GovernanceError> {
        if caller != self.admin {
            return Err(GovernanceError::Unauthorized(
                "caller is not the timelock admin".to_string(),
            ));
        }
        Ok(())
    }

    fn stage_pending_admin(&mut self, new_admin: Address) {
        self.pending_admin = Some(new_admin);
        self.events.push(GovernanceEvent::NewPendingAdmin {
            pending_admin: new_admin,
        });
    }

    /// Self-targeted transactions administer the timelock itself.
    fn apply_self_call(&mut self, signature: &str, data: &[u8]) -> Result<(), GovernanceError> {
        match signature {
            "setPendingAdmin(address)" => {
                let new_admin = Address::from_slice(data).map_err(|e| {
                    GovernanceError::ExecutionFailed(format!("bad admin payload: {e}"))
                })?;
                self.stage_pending_admin(new_admin);
                Ok(())
            }
            "setDelay(uint64)" => {
                let bytes: [u8; 8] = data.try_into().map_err(|_| {
                    GovernanceError::ExecutionFailed("bad delay payload".to_string())
                })?;
                let delay = u64::from_be_bytes(bytes);
                if delay < MINIMUM_DELAY || delay > MAXIMUM_DELAY {
                    return Err(GovernanceError::DelayOutOfBounds {
                        delay,
                        min: MINIMUM_DELAY,
                        max: MAXIMUM_DELAY,
                    });
                }
                self.delay = delay;
                self.events.push(GovernanceEvent::NewDelay { delay });
                Ok(())
            }
            other => Err(GovernanceError::ExecutionFailed(format!(
                "unknown self-call: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address(n: u8) -> Address {
        let mut addr = [0u8; 20];
        addr[19] = n;
        Address::from_bytes(addr)
    }

    /// Executor that records calls and optionally fails.
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Vec<(Address, u128, String)>,
        fail: bool,
    }

    impl CallExecutor for RecordingExecutor {
        fn execute_call(
            &mut self,
            target: Address,
            value: u128,
            signature: &str,
            _data: &[u8],
        ) -> Result<(), String> {
            if self.fail {
                return Err("target reverted".to_string());
            }
            self.calls.push((target, value, signature.to_string()));
            Ok(())
        }
    }

    fn timelock(admin: Address) -> TimelockQueue {
        TimelockQueue::new(test_address(0xee), admin, MINIMUM_DELAY).unwrap()
    }

    #[test]
    fn test_delay_bounds() {
        let admin = test_address(1);
        assert!(TimelockQueue::new(test_address(0xee), admin, MINIMUM_DELAY - 1).is_err());
        assert!(TimelockQueue::new(test_address(0xee), admin, MAXIMUM_DELAY + 1).is_err());
        assert!(TimelockQueue::new(test_address(0xee), admin, MINIMUM_DELAY).is_ok());
    }

    #[test]
    fn test_queue_requires_admin() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let clock = Clock::new(1, 1_000);

        let result = tl.queue_transaction(
            test_address(2),
            test_address(9),
            0,
            "doThing()",
            &[],
            1_000 + MINIMUM_DELAY,
            clock,
        );
        assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));
    }

    #[test]
    fn test_queue_eta_must_satisfy_delay() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let clock = Clock::new(1, 1_000);

        let result = tl.queue_transaction(
            admin,
            test_address(9),
            0,
            "doThing()",
            &[],
            1_000 + MINIMUM_DELAY - 1,
            clock,
        );
        assert!(matches!(result, Err(GovernanceError::EtaTooEarly { .. })));

        let ok = tl.queue_transaction(
            admin,
            test_address(9),
            0,
            "doThing()",
            &[],
            1_000 + MINIMUM_DELAY + 1,
            clock,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_duplicate_queue_rejected() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY + 1;

        tl.queue_transaction(admin, test_address(9), 0, "doThing()", &[], eta, clock)
            .unwrap();
        let result =
            tl.queue_transaction(admin, test_address(9), 0, "doThing()", &[], eta, clock);
        assert!(matches!(result, Err(GovernanceError::AlreadyQueued(_))));
    }

    #[test]
    fn test_execute_window() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let mut executor = RecordingExecutor::default();
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;

        tl.queue_transaction(admin, test_address(9), 5, "doThing()", &[1, 2], eta, clock)
            .unwrap();

        // Too early
        let result = tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            5,
            "doThing()",
            &[1, 2],
            eta,
            Clock::new(2, eta - 1),
        );
        assert!(matches!(result, Err(GovernanceError::NotYetEligible { .. })));

        // Too late
        let result = tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            5,
            "doThing()",
            &[1, 2],
            eta,
            Clock::new(2, eta + GRACE_PERIOD + 1),
        );
        assert!(matches!(result, Err(GovernanceError::Expired { .. })));

        // In window
        let tx_hash = tl
            .execute_transaction(
                admin,
                &mut executor,
                test_address(9),
                5,
                "doThing()",
                &[1, 2],
                eta,
                Clock::new(2, eta + 10),
            )
            .unwrap();
        assert!(!tl.is_queued(tx_hash));
        assert_eq!(executor.calls.len(), 1);

        // Second execute fails: no longer pending
        let result = tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            5,
            "doThing()",
            &[1, 2],
            eta,
            Clock::new(2, eta + 20),
        );
        assert!(matches!(result, Err(GovernanceError::PayloadMismatch(_))));
    }

    #[test]
    fn test_execute_unqueued_payload_mismatch() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let mut executor = RecordingExecutor::default();
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;

        tl.queue_transaction(admin, test_address(9), 0, "doThing()", &[], eta, clock)
            .unwrap();

        // Same target, different calldata: different hash, not pending
        let result = tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            0,
            "doThing()",
            &[0xde],
            eta,
            Clock::new(2, eta + 1),
        );
        assert!(matches!(result, Err(GovernanceError::PayloadMismatch(_))));
    }

    #[test]
    fn test_failed_call_leaves_transaction_queued() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let mut executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;

        let tx_hash = tl
            .queue_transaction(admin, test_address(9), 0, "doThing()", &[], eta, clock)
            .unwrap();

        let result = tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            0,
            "doThing()",
            &[],
            eta,
            Clock::new(2, eta + 1),
        );
        assert!(matches!(result, Err(GovernanceError::ExecutionFailed(_))));
        assert!(tl.is_queued(tx_hash));

        // Fix the target and retry within the window
        executor.fail = false;
        tl.execute_transaction(
            admin,
            &mut executor,
            test_address(9),
            0,
            "doThing()",
            &[],
            eta,
            Clock::new(3, eta + 2),
        )
        .unwrap();
        assert!(!tl.is_queued(tx_hash));
    }

    #[test]
    fn test_cancel_transaction() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;

        let tx_hash = tl
            .queue_transaction(admin, test_address(9), 0, "doThing()", &[], eta, clock)
            .unwrap();
        assert!(tl.is_queued(tx_hash));

        tl.cancel_transaction(admin, test_address(9), 0, "doThing()", &[], eta)
            .unwrap();
        assert!(!tl.is_queued(tx_hash));
    }

    #[test]
    fn test_bootstrap_admin_handoff() {
        let deployer = test_address(1);
        let governor = test_address(2);
        let mut tl = timelock(deployer);

        // One direct handoff allowed
        tl.set_pending_admin(deployer, governor).unwrap();
        tl.accept_admin(governor).unwrap();
        assert_eq!(tl.admin(), governor);

        // Deployer has spent the bootstrap
        let result = tl.set_pending_admin(deployer, deployer);
        assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));
    }

    #[test]
    fn test_accept_admin_requires_pending() {
        let deployer = test_address(1);
        let mut tl = timelock(deployer);

        let result = tl.accept_admin(test_address(3));
        assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));
    }

    #[test]
    fn test_admin_handoff_via_queued_self_call() {
        let deployer = test_address(1);
        let governor = test_address(2);
        let mut tl = timelock(deployer);
        let mut executor = RecordingExecutor::default();
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;
        let self_addr = tl.address();

        tl.queue_transaction(
            deployer,
            self_addr,
            0,
            "setPendingAdmin(address)",
            governor.as_bytes(),
            eta,
            clock,
        )
        .unwrap();

        tl.execute_transaction(
            deployer,
            &mut executor,
            self_addr,
            0,
            "setPendingAdmin(address)",
            governor.as_bytes(),
            eta,
            Clock::new(2, eta + 1),
        )
        .unwrap();

        // Self-call never reaches the external executor
        assert!(executor.calls.is_empty());
        assert_eq!(tl.pending_admin(), Some(governor));

        tl.accept_admin(governor).unwrap();
        assert_eq!(tl.admin(), governor);
    }

    #[test]
    fn test_set_delay_via_self_call() {
        let admin = test_address(1);
        let mut tl = timelock(admin);
        let mut executor = RecordingExecutor::default();
        let clock = Clock::new(1, 1_000);
        let eta = 1_000 + MINIMUM_DELAY;
        let self_addr = tl.address();
        let new_delay: u64 = 3 * 24 * 60 * 60;

        tl.queue_transaction(
            admin,
            self_addr,
            0,
            "setDelay(uint64)",
            &new_delay.to_be_bytes(),
            eta,
            clock,
        )
        .unwrap();
        tl.execute_transaction(
            admin,
            &mut executor,
            self_addr,
            0,
            "setDelay(uint64)",
            &new_delay.to_be_bytes(),
            eta,
            Clock::new(2, eta + 1),
        )
        .unwrap();

        assert_eq!(tl.delay(), new_delay);
    }

    #[test]
    fn test_transaction_hash_binds_fields() {
        let base =
            TimelockQueue::transaction_hash(test_address(9), 0, "doThing()", &[1], 500);
        assert_ne!(
            base,
            TimelockQueue::transaction_hash(test_address(8), 0, "doThing()", &[1], 500)
        );
        assert_ne!(
            base,
            TimelockQueue::transaction_hash(test_address(9), 1, "doThing()", &[1], 500)
        );
        assert_ne!(
            base,
            TimelockQueue::transaction_hash(test_address(9), 0, "doThing()", &[1], 501)
        );
        assert_ne!(
            base,
            TimelockQueue::transaction_hash(test_address(9), 0, "doThing()", &[2], 500)
        );
    }
}
