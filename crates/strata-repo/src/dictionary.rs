//! Versioned dictionary
//!
//! Append-only map from `(namespace, key, sequence)` to a value. Each entry
//! is one key-addressed chunk:
//!
//! ```text
//! lookup key = varint(len(namespace)) ++ namespace ++ varint(len(key)) ++ key ++ u64_be(sequence)
//! address    = HMAC-SHA256(address_key, lookup key)
//! ```
//!
//! Entries are written with deny-overwrite, so a sequence number is claimed
//! by exactly one writer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use strata_chunks::varint;
use strata_core::{OverwriteStrategy, PutStatus, StrataResult};
use strata_crypto::ChunkEncryptor;
use strata_storage::ChunkStorage;

use crate::check_cancelled;
use crate::sequence::next_sequence_number;

#[derive(Debug, Clone)]
pub struct VersionedDictionary {
    storage: Arc<dyn ChunkStorage>,
    encryptor: Arc<ChunkEncryptor>,
}

/// Structured lookup key for one dictionary entry.
pub fn lookup_key(namespace: &[u8], key: &[u8], sequence: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len() + key.len() + 2 * varint::MAX_VARINT_LEN + 8);
    varint::encode(namespace.len() as u64, &mut out);
    out.extend_from_slice(namespace);
    varint::encode(key.len() as u64, &mut out);
    out.extend_from_slice(key);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

impl VersionedDictionary {
    pub fn new(storage: Arc<dyn ChunkStorage>, encryptor: Arc<ChunkEncryptor>) -> Self {
        Self { storage, encryptor }
    }

    pub async fn exists(&self, namespace: &[u8], key: &[u8], sequence: u64) -> StrataResult<bool> {
        let address = self
            .encryptor
            .key_address(&lookup_key(namespace, key, sequence));
        self.storage.exists(&address).await
    }

    /// Value stored at `sequence`, `None` if that number is unclaimed.
    pub async fn get_value(
        &self,
        namespace: &[u8],
        key: &[u8],
        sequence: u64,
    ) -> StrataResult<Option<Vec<u8>>> {
        let lookup = lookup_key(namespace, key, sequence);
        let address = self.encryptor.key_address(&lookup);
        match self.storage.get(&address).await? {
            Some(chunk) => Ok(Some(self.encryptor.decrypt_keyed(&lookup, &chunk)?)),
            None => Ok(None),
        }
    }

    /// Claim `sequence` for `value`. `false` means another writer got there first.
    pub async fn put_value(
        &self,
        namespace: &[u8],
        key: &[u8],
        sequence: u64,
        value: &[u8],
    ) -> StrataResult<bool> {
        let lookup = lookup_key(namespace, key, sequence);
        let chunk = self.encryptor.encrypt_keyed(&lookup, value)?;
        let status = self.storage.put(&chunk, OverwriteStrategy::Deny).await?;
        if status == PutStatus::OverwriteDenied {
            debug!(sequence, "dictionary sequence already claimed");
        }
        Ok(status.is_stored())
    }

    /// Lowest unclaimed sequence number for `key`.
    pub async fn resolve_next_sequence(
        &self,
        namespace: &[u8],
        key: &[u8],
        hint: u64,
        cancel: &CancellationToken,
    ) -> StrataResult<u64> {
        next_sequence_number(hint, |sequence| async move {
            check_cancelled(cancel)?;
            self.exists(namespace, key, sequence).await
        })
        .await
    }

    /// Highest claimed sequence number, `None` if the key has no entries.
    pub async fn last_sequence(
        &self,
        namespace: &[u8],
        key: &[u8],
        hint: u64,
        cancel: &CancellationToken,
    ) -> StrataResult<Option<u64>> {
        let next = self
            .resolve_next_sequence(namespace, key, hint, cancel)
            .await?;
        Ok(next.checked_sub(1))
    }
}
