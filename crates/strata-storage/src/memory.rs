//! In-memory chunk storage

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use strata_core::{Address, EncryptedChunk, OverwriteStrategy, PutStatus, StrataResult};

use crate::backend::ChunkStorage;

/// Chunk storage backed by a `BTreeMap`, with per-operation call counters.
#[derive(Debug, Default)]
pub struct MemoryChunkStorage {
    chunks: RwLock<BTreeMap<Address, Vec<u8>>>,
    puts: AtomicU64,
    gets: AtomicU64,
    exists_probes: AtomicU64,
}

impl MemoryChunkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `put` calls since creation or the last `reset_counters`
    pub fn put_calls(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn exists_calls(&self) -> u64 {
        self.exists_probes.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.puts.store(0, Ordering::Relaxed);
        self.gets.store(0, Ordering::Relaxed);
        self.exists_probes.store(0, Ordering::Relaxed);
    }

    /// Drop a chunk, returning whether it was present.
    pub async fn remove(&self, address: &Address) -> bool {
        self.chunks.write().await.remove(address).is_some()
    }
}

#[async_trait]
impl ChunkStorage for MemoryChunkStorage {
    async fn put(
        &self,
        chunk: &EncryptedChunk,
        overwrite: OverwriteStrategy,
    ) -> StrataResult<PutStatus> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let mut chunks = self.chunks.write().await;
        if overwrite == OverwriteStrategy::Deny && chunks.contains_key(&chunk.address) {
            tracing::trace!(address = %chunk.address, "put denied, address occupied");
            return Ok(PutStatus::OverwriteDenied);
        }
        chunks.insert(chunk.address, chunk.envelope.clone());
        Ok(PutStatus::Success)
    }

    async fn get(&self, address: &Address) -> StrataResult<Option<EncryptedChunk>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let chunks = self.chunks.read().await;
        Ok(chunks
            .get(address)
            .map(|envelope| EncryptedChunk::new(*address, envelope.clone())))
    }

    async fn exists(&self, address: &Address) -> StrataResult<bool> {
        self.exists_probes.fetch_add(1, Ordering::Relaxed);
        Ok(self.chunks.read().await.contains_key(address))
    }

    async fn count(&self) -> StrataResult<u64> {
        Ok(self.chunks.read().await.len() as u64)
    }

    async fn list(&self) -> StrataResult<Vec<Address>> {
        Ok(self.chunks.read().await.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(n: u8, body: &[u8]) -> EncryptedChunk {
        EncryptedChunk::new(Address::from_bytes([n; 32]), body.to_vec())
    }

    #[tokio::test]
    async fn deny_keeps_first_write() {
        let store = MemoryChunkStorage::new();
        let first = chunk(1, b"first");
        let second = chunk(1, b"second");

        assert_eq!(
            store.put(&first, OverwriteStrategy::Deny).await.unwrap(),
            PutStatus::Success
        );
        assert_eq!(
            store.put(&second, OverwriteStrategy::Deny).await.unwrap(),
            PutStatus::OverwriteDenied
        );
        let stored = store.get(&first.address).await.unwrap().unwrap();
        assert_eq!(stored.envelope, b"first");
    }

    #[tokio::test]
    async fn allow_replaces() {
        let store = MemoryChunkStorage::new();
        store.put(&chunk(1, b"a"), OverwriteStrategy::Allow).await.unwrap();
        store.put(&chunk(1, b"b"), OverwriteStrategy::Allow).await.unwrap();
        let stored = store.get(&Address::from_bytes([1; 32])).await.unwrap().unwrap();
        assert_eq!(stored.envelope, b"b");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_track_calls() {
        let store = MemoryChunkStorage::new();
        let addr = Address::from_bytes([5; 32]);
        assert!(!store.exists(&addr).await.unwrap());
        assert!(store.get(&addr).await.unwrap().is_none());
        store.put(&chunk(5, b"x"), OverwriteStrategy::Deny).await.unwrap();
        assert!(store.exists(&addr).await.unwrap());

        assert_eq!(store.exists_calls(), 2);
        assert_eq!(store.get_calls(), 1);
        assert_eq!(store.put_calls(), 1);
        store.reset_counters();
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn list_and_remove() {
        let store = MemoryChunkStorage::new();
        for n in [3u8, 1, 2] {
            store.put(&chunk(n, &[n]), OverwriteStrategy::Deny).await.unwrap();
        }
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(store.remove(&Address::from_bytes([2; 32])).await);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
