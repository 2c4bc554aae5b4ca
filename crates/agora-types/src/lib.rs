//! Agora Types - Core type definitions for the AGORA governance protocol.
//!
//! This crate provides the fundamental types used throughout the governance
//! engine:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests) and naming-system node hashes
//! - Ed25519 signatures and public keys

pub mod address;
pub mod hash;
pub mod signature;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use signature::{Ed25519PublicKey, Ed25519Signature};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Ed25519PublicKey, Ed25519Signature, Hash, TypesError};
}
