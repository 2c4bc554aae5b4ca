use crate::error::CryptoError;
use agora_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash};
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroize;

/// Ed25519 keypair for ballot and delegation signing.
/// Private key is zeroized on drop.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key
    pub fn public_key(&self) -> Ed25519PublicKey {
        let bytes = self.signing_key.verifying_key().to_bytes();
        Ed25519PublicKey::from_bytes(bytes)
    }

    /// Get the address derived from this keypair
    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let signature = self.signing_key.sign(message);
        Ed25519Signature::from_bytes(signature.to_bytes())
    }

    /// Sign a typed digest (see [`crate::digest`])
    pub fn sign_digest(&self, digest: &Hash) -> Ed25519Signature {
        self.sign(digest.as_bytes())
    }

    /// Export private key bytes (CAUTION: sensitive)
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.to_bytes())
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Verify an ed25519 signature.
pub fn verify(
    public_key: &Ed25519PublicKey,
    message: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    let pk = ed25519_dalek::VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    pk.verify(message, &sig)?;
    Ok(())
}

/// Verify a signature over a typed digest.
pub fn verify_digest(
    public_key: &Ed25519PublicKey,
    digest: &Hash,
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    verify(public_key, digest.as_bytes(), signature)
}
