use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address length: expected 20, got {0}")]
    InvalidAddressLength(usize),

    #[error("Invalid hash length: expected 32, got {0}")]
    InvalidHashLength(usize),

    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    #[error("Invalid public key length: expected {expected}, got {actual}")]
    InvalidPublicKeyLength { expected: usize, actual: usize },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Bech32 error: {0}")]
    Bech32Error(String),
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}

impl From<std::array::TryFromSliceError> for TypesError {
    fn from(_: std::array::TryFromSliceError) -> Self {
        TypesError::InvalidHex("Slice length mismatch".to_string())
    }
}
