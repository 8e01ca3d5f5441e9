//! The chunk storage contract

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use strata_core::{Address, EncryptedChunk, OverwriteStrategy, PutStatus, StrataResult};

/// Address-keyed store of opaque encrypted envelopes.
///
/// Every method is a suspension point; none of them interpret the envelope.
#[async_trait]
pub trait ChunkStorage: Debug + Send + Sync {
    /// Store `chunk`. With `OverwriteStrategy::Deny`, an address that already
    /// holds data yields `PutStatus::OverwriteDenied` and the stored bytes are
    /// left untouched.
    async fn put(&self, chunk: &EncryptedChunk, overwrite: OverwriteStrategy)
        -> StrataResult<PutStatus>;

    /// Fetch a chunk, `None` if nothing is stored under `address`.
    async fn get(&self, address: &Address) -> StrataResult<Option<EncryptedChunk>>;

    async fn exists(&self, address: &Address) -> StrataResult<bool>;

    /// Number of stored chunks
    async fn count(&self) -> StrataResult<u64>;

    /// Every stored address, in no particular order
    async fn list(&self) -> StrataResult<Vec<Address>>;

    /// Make previous puts durable. Backends that write through need not override.
    async fn flush(&self) -> StrataResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: ChunkStorage + ?Sized> ChunkStorage for Arc<T> {
    async fn put(
        &self,
        chunk: &EncryptedChunk,
        overwrite: OverwriteStrategy,
    ) -> StrataResult<PutStatus> {
        (**self).put(chunk, overwrite).await
    }

    async fn get(&self, address: &Address) -> StrataResult<Option<EncryptedChunk>> {
        (**self).get(address).await
    }

    async fn exists(&self, address: &Address) -> StrataResult<bool> {
        (**self).exists(address).await
    }

    async fn count(&self) -> StrataResult<u64> {
        (**self).count().await
    }

    async fn list(&self) -> StrataResult<Vec<Address>> {
        (**self).list().await
    }

    async fn flush(&self) -> StrataResult<()> {
        (**self).flush().await
    }
}
