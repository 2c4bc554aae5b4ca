use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 20-byte account address derived from ed25519 public key.
/// Display format: Bech32m with "agora" human-readable prefix.
///
/// # Derivation
/// `address = blake3(ed25519_pubkey)[0..20]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);
    pub const LEN: usize = 20;

    /// Bech32m human-readable prefix
    pub const BECH32_HRP: &'static str = "agora";

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 20 {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive address from ed25519 public key bytes (32 bytes).
    /// Uses blake3 hash, takes first 20 bytes.
    pub fn from_public_key(pubkey: &[u8; 32]) -> Self {
        let hash = blake3::hash(pubkey);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash.as_bytes()[..20]);
        Self(addr)
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Expand to a left-padded 32-byte word, for hashing alongside node hashes.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Encode as Bech32m with "agora" prefix
        let hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
        match bech32::encode::<bech32::Bech32m>(hrp, &self.0) {
            Ok(encoded) => write!(f, "{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Support both Bech32m ("agora1...") and hex ("0x...")
        if s.starts_with("agora1") {
            let (hrp, data) = bech32::decode(s).map_err(|e| {
                TypesError::Bech32Error(e.to_string())
            })?;

            let expected_hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
            if hrp != expected_hrp {
                return Err(TypesError::InvalidAddressFormat(format!(
                    "Invalid HRP: expected '{}', got '{}'",
                    Self::BECH32_HRP,
                    hrp
                )));
            }

            let data_len = data.len();
            let bytes: [u8; 20] = data.try_into().map_err(|_| {
                TypesError::InvalidAddressLength(data_len)
            })?;

            Ok(Self::from_bytes(bytes))
        } else if s.starts_with("0x") || s.starts_with("0X") {
            let bytes = hex::decode(&s[2..])?;
            Self::from_slice(&bytes)
        } else {
            Err(TypesError::InvalidAddressFormat(s.to_string()))
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
