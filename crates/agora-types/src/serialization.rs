//! Serialization implementations for agora-types
//!
//! All byte types serialize as their canonical display strings so that
//! event streams and config files stay human-readable.

use crate::*;

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    // Hash
    impl Serialize for Hash {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Hash {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Hash::from_str(&s).map_err(serde::de::Error::custom)
        }
    }

    // Address
    impl Serialize for Address {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Address::from_str(&s).map_err(serde::de::Error::custom)
        }
    }

    // Ed25519Signature
    impl Serialize for Ed25519Signature {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            format!("0x{}", hex::encode(self.as_bytes())).serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Ed25519Signature {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            let s = if s.starts_with("0x") { &s[2..] } else { &s };
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            Ed25519Signature::from_slice(&bytes).map_err(serde::de::Error::custom)
        }
    }

    // Ed25519PublicKey
    impl Serialize for Ed25519PublicKey {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            format!("0x{}", hex::encode(self.as_bytes())).serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Ed25519PublicKey {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            let s = if s.starts_with("0x") { &s[2..] } else { &s };
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            Ed25519PublicKey::from_slice(&bytes).map_err(serde::de::Error::custom)
        }
    }
}
