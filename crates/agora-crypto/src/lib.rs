//! Agora Crypto - signing primitives for the governance protocol.
//!
//! This crate provides:
//! - Ed25519 keypairs and signature verification
//! - Domain-separated typed digests for off-chain-signed ballots and
//!   delegations

pub mod ed25519;
pub mod digest;
pub mod error;

pub use ed25519::{verify, verify_digest, Keypair};
pub use digest::{
    ballot_digest, ballot_with_reason_digest, delegation_digest, SigningDomain,
};
pub use error::CryptoError;
