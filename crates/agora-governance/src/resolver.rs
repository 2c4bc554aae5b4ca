//! Name-routed voting power.
//!
//! Delegation targets may be naming-system node hashes instead of addresses.
//! Nothing is resolved at delegation time; at read time the queried address is
//! reverse-resolved to a candidate name, the name is forward-resolved back,
//! and only a matching round trip lets the node's checkpointed power count.
//! Any resolution failure degrades silently to a zero name component — an
//! unresolvable name must never block ordinary voting.

use agora_types::{Address, Hash};

use crate::clock::Clock;
use crate::error::GovernanceError;
use crate::ledger::{Delegatee, VotingPowerLedger};

/// Read-only window into the external naming system.
pub trait NameResolver {
    /// Forward-resolve a node hash to the address it points at.
    fn resolve(&self, node: Hash) -> Option<Address>;

    /// Reverse lookup: the primary name claimed by an address, if any.
    fn reverse(&self, address: Address) -> Option<String>;
}

/// Round-trip-verified node hash for an address.
///
/// Returns the node only when the address's reverse record forward-resolves
/// back to the same address.
pub fn verified_node<R: NameResolver + ?Sized>(resolver: &R, address: Address) -> Option<Hash> {
    let name = resolver.reverse(address)?;
    let node = Hash::node(&name);
    match resolver.resolve(node) {
        Some(resolved) if resolved == address => Some(node),
        _ => None,
    }
}

/// Voting power of `account` as of `block`, including power delegated to the
/// account's verified name node.
///
/// Returns `(total, name_component)` so callers can distinguish direct from
/// name-routed power.
pub fn prior_votes_with_ens<R: NameResolver + ?Sized>(
    ledger: &VotingPowerLedger,
    resolver: &R,
    account: Address,
    block: u64,
    clock: Clock,
) -> Result<(u128, u128), GovernanceError> {
    let direct = ledger.get_prior_votes(account, block, clock)?;
    let ens = match verified_node(resolver, account) {
        Some(node) => ledger.get_prior_votes_for(Delegatee::Name(node), block, clock)?,
        None => 0,
    };
    Ok((direct.saturating_add(ens), ens))
}
