use crate::address::Address;

/// An encrypted chunk as handed to and returned from chunk storage.
///
/// The envelope is opaque to storage backends and must be preserved
/// byte-for-byte: its trailing checksum covers everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub address: Address,
    pub envelope: Vec<u8>,
}

impl EncryptedChunk {
    pub fn new(address: Address, envelope: Vec<u8>) -> Self {
        Self { address, envelope }
    }

    /// Stored size in bytes
    pub fn len(&self) -> usize {
        self.envelope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelope.is_empty()
    }
}

/// What a put should do when the address already holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteStrategy {
    Allow,
    Deny,
}

/// Outcome of a successful put.
///
/// `OverwriteDenied` is an expected result, not a failure: for content
/// addressed chunks it is a deduplication hit, for dictionary entries it
/// means another writer claimed the sequence number first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStatus {
    Success,
    OverwriteDenied,
}

impl PutStatus {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutStatus::Success)
    }
}
