use thiserror::Error;

use crate::address::Address;

pub type StrataResult<T> = Result<T, StrataError>;

#[derive(Debug, Error)]
pub enum StrataError {
    /// Envelope checksum did not match; nothing was decrypted.
    #[error("checksum mismatch for chunk {address}")]
    Checksum { address: Address },

    /// Decrypted plaintext does not hash to the address it was stored under.
    #[error("address mismatch: chunk stored as {expected} hashes to {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("chunk {address} not found in storage")]
    MissingChunk { address: Address },

    #[error("content key unwrap failed: {0}")]
    Unwrap(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("malformed data: {0}")]
    Format(String),

    #[error("sequence number space exhausted")]
    SequenceSpaceExhausted,

    #[error("concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification { expected: u64, actual: u64 },

    #[error("chunk tree recursion limit exceeded at level {level}")]
    RecursionLimitExceeded { level: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Only optimistic-concurrency rejections are worth retrying after the
    /// caller re-resolves its sequence number.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StrataError::ConcurrentModification { .. })
    }

    /// Errors that mean stored data cannot be trusted.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            StrataError::Checksum { .. } | StrataError::AddressMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_concurrent_modification_is_retryable() {
        let retry = StrataError::ConcurrentModification {
            expected: 3,
            actual: 5,
        };
        assert!(retry.is_retryable());
        assert!(!StrataError::SequenceSpaceExhausted.is_retryable());
        assert!(!StrataError::Checksum {
            address: Address::from_bytes([0u8; 32])
        }
        .is_retryable());
    }

    #[test]
    fn integrity_failures_are_flagged() {
        let addr = Address::from_bytes([7u8; 32]);
        assert!(StrataError::Checksum { address: addr }.is_integrity_failure());
        assert!(StrataError::AddressMismatch {
            expected: addr,
            actual: Address::from_bytes([8u8; 32]),
        }
        .is_integrity_failure());
        assert!(!StrataError::Cancelled.is_integrity_failure());
    }
}
