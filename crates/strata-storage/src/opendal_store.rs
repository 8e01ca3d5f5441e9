//! Chunk storage on an OpenDAL operator

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use tokio::sync::{Mutex, MutexGuard};

use strata_core::{Address, EncryptedChunk, OverwriteStrategy, PutStatus, StrataError, StrataResult};

use crate::backend::ChunkStorage;
use crate::paths::{address_from_path, chunk_path, chunk_root};

const DENY_LOCK_STRIPES: usize = 64;

/// Process-wide locks for services without conditional writes, shared by
/// every operator so two stores on one root still exclude each other.
static DENY_LOCKS: OnceLock<Vec<Mutex<()>>> = OnceLock::new();

/// Chunks stored as one object each under `{prefix}/AB/CD/ABCD...`.
///
/// `OverwriteStrategy::Deny` uses the service's if-not-exists write when it
/// has one. Otherwise the stat and the write run under a per-path lock, which
/// makes deny atomic within this process only.
#[derive(Debug, Clone)]
pub struct OpendalChunkStorage {
    op: Operator,
    prefix: String,
}

impl OpendalChunkStorage {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into(),
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn path(&self, address: &Address) -> String {
        chunk_path(&self.prefix, address)
    }

    fn has_conditional_write(&self) -> bool {
        self.op.info().full_capability().write_with_if_not_exists
    }

    async fn lock_path(&self, path: &str) -> MutexGuard<'static, ()> {
        let locks = DENY_LOCKS
            .get_or_init(|| (0..DENY_LOCK_STRIPES).map(|_| Mutex::new(())).collect());
        let info = self.op.info();
        let mut hasher = DefaultHasher::new();
        info.name().hash(&mut hasher);
        info.root().hash(&mut hasher);
        path.hash(&mut hasher);
        let stripe = (hasher.finish() % DENY_LOCK_STRIPES as u64) as usize;
        locks[stripe].lock().await
    }

    async fn write(&self, chunk: &EncryptedChunk, path: &str) -> StrataResult<PutStatus> {
        self.op
            .write(path, chunk.envelope.clone())
            .await
            .map_err(|e| storage_err("writing", path, e))?;
        tracing::trace!(address = %chunk.address, bytes = chunk.len(), "stored chunk");
        Ok(PutStatus::Success)
    }

    async fn write_if_absent(&self, chunk: &EncryptedChunk, path: &str) -> StrataResult<PutStatus> {
        if self.has_conditional_write() {
            return match self
                .op
                .write_with(path, chunk.envelope.clone())
                .if_not_exists(true)
                .await
            {
                Ok(_) => {
                    tracing::trace!(address = %chunk.address, bytes = chunk.len(), "stored chunk");
                    Ok(PutStatus::Success)
                }
                Err(e) if e.kind() == ErrorKind::ConditionNotMatch => {
                    tracing::trace!(address = %chunk.address, "put denied, object exists");
                    Ok(PutStatus::OverwriteDenied)
                }
                Err(e) => Err(storage_err("writing", path, e)),
            };
        }

        let _guard = self.lock_path(path).await;
        if self
            .op
            .exists(path)
            .await
            .map_err(|e| storage_err("checking", path, e))?
        {
            tracing::trace!(address = %chunk.address, "put denied, object exists");
            return Ok(PutStatus::OverwriteDenied);
        }
        self.write(chunk, path).await
    }
}

fn storage_err(context: &str, path: &str, e: opendal::Error) -> StrataError {
    StrataError::Storage(format!("{context} {path}: {e}"))
}

#[async_trait]
impl ChunkStorage for OpendalChunkStorage {
    async fn put(
        &self,
        chunk: &EncryptedChunk,
        overwrite: OverwriteStrategy,
    ) -> StrataResult<PutStatus> {
        let path = self.path(&chunk.address);
        match overwrite {
            OverwriteStrategy::Allow => self.write(chunk, &path).await,
            OverwriteStrategy::Deny => self.write_if_absent(chunk, &path).await,
        }
    }

    async fn get(&self, address: &Address) -> StrataResult<Option<EncryptedChunk>> {
        let path = self.path(address);
        match self.op.read(&path).await {
            Ok(buf) => Ok(Some(EncryptedChunk::new(*address, buf.to_vec()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("reading", &path, e)),
        }
    }

    async fn exists(&self, address: &Address) -> StrataResult<bool> {
        let path = self.path(address);
        self.op
            .exists(&path)
            .await
            .map_err(|e| storage_err("checking", &path, e))
    }

    async fn count(&self) -> StrataResult<u64> {
        Ok(self.list().await?.len() as u64)
    }

    async fn list(&self) -> StrataResult<Vec<Address>> {
        let root = chunk_root(&self.prefix);
        let entries = match self.op.list_with(&root).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("listing", &root, e)),
        };
        Ok(entries
            .iter()
            .filter(|entry| entry.metadata().is_file())
            .filter_map(|entry| address_from_path(entry.path()))
            .collect())
    }
}
