//! Sybil-resistant name validation.
//!
//! A name node earns the right to route voting power only after its owner
//! proves personhood through a zero-knowledge membership proof. Each proof
//! consumes a nullifier scoped to this deployment's external nullifier, so
//! one person can validate at most one node, ever. Validation is permanent:
//! no operation removes a validated node or frees its nullifier.

use std::collections::{HashMap, HashSet};

use agora_types::{Address, Hash};

use crate::clock::Clock;
use crate::error::GovernanceError;
use crate::events::GovernanceEvent;
use crate::resolver::NameResolver;

/// Zero-knowledge membership proof, eight field elements.
pub type ProofBytes = [[u8; 32]; 8];

/// Verifier for zero-knowledge personhood proofs. The host environment
/// supplies the implementation against its identity set.
pub trait IdentityVerifier {
    /// Check a membership proof against a published identity-set root.
    ///
    /// `signal` binds the proof to what is being claimed and by whom;
    /// `external_nullifier` scopes `nullifier_hash` to this deployment.
    fn verify_proof(
        &self,
        root: Hash,
        signal: Hash,
        nullifier_hash: Hash,
        external_nullifier: Hash,
        proof: &ProofBytes,
    ) -> bool;
}

/// A permanently validated name node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    /// Address that owned the node at validation time
    pub owner: Address,
    /// Timestamp of validation
    pub validated_at: u64,
}

/// Registry of personhood-validated name nodes.
#[derive(Debug)]
pub struct IdentityRegistry {
    external_nullifier: Hash,
    validated: HashMap<Hash, NodeRecord>,
    used_nullifiers: HashSet<Hash>,
    events: Vec<GovernanceEvent>,
}

impl IdentityRegistry {
    /// Create a registry scoped to an application and action identifier.
    pub fn new(app_id: &str, action_id: &str) -> Self {
        let external_nullifier = Hash::compute_multi(&[
            &(app_id.len() as u32).to_be_bytes(),
            app_id.as_bytes(),
            &(action_id.len() as u32).to_be_bytes(),
            action_id.as_bytes(),
        ]);
        Self {
            external_nullifier,
            validated: HashMap::new(),
            used_nullifiers: HashSet::new(),
            events: Vec::new(),
        }
    }

    pub fn external_nullifier(&self) -> Hash {
        self.external_nullifier
    }

    /// Whether a node has been personhood-validated.
    pub fn is_validated(&self, node: Hash) -> bool {
        self.validated.contains_key(&node)
    }

    /// The record behind a validated node, if any.
    pub fn node_record(&self, node: Hash) -> Option<&NodeRecord> {
        self.validated.get(&node)
    }

    /// Drain pending events.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Validate a name node with a personhood proof.
    ///
    /// The caller must currently own the node in the naming system, and the
    /// proof's signal must bind node and caller together. Nullifier reuse is
    /// checked before proof verification, so a spent nullifier always fails
    /// with [`GovernanceError::NullifierReused`] regardless of proof
    /// validity.
    #[allow(clippy::too_many_arguments)]
    pub fn register_node<V, R>(
        &mut self,
        verifier: &V,
        resolver: &R,
        caller: Address,
        node: Hash,
        root: Hash,
        nullifier_hash: Hash,
        proof: &ProofBytes,
        clock: Clock,
    ) -> Result<(), GovernanceError>
    where
        V: IdentityVerifier + ?Sized,
        R: NameResolver + ?Sized,
    {
        if self.validated.contains_key(&node) {
            return Err(GovernanceError::AlreadyValidated(node));
        }
        if self.used_nullifiers.contains(&nullifier_hash) {
            return Err(GovernanceError::NullifierReused(nullifier_hash));
        }
        match resolver.resolve(node) {
            Some(owner) if owner == caller => {}
            _ => {
                return Err(GovernanceError::Unauthorized(
                    "caller does not own the node".to_string(),
                ));
            }
        }

        let signal = Hash::compute_multi(&[node.as_bytes(), caller.as_bytes()]);
        if !verifier.verify_proof(root, signal, nullifier_hash, self.external_nullifier, proof) {
            return Err(GovernanceError::InvalidProof);
        }

        self.used_nullifiers.insert(nullifier_hash);
        self.validated.insert(
            node,
            NodeRecord {
                owner: caller,
                validated_at: clock.timestamp,
            },
        );
        tracing::info!("validated node {} for {}", node, caller);
        self.events.push(GovernanceEvent::EnsNodeValidated {
            node,
            owner: caller,
            nullifier_hash,
        });
        Ok(())
    }
}
