//! Stream tree storage
//!
//! A stream is chunked, every chunk is encrypted and stored under its content
//! address, and the addresses are written into an index stream that is
//! itself chunked, encrypted, and stored one level up. This repeats until a
//! level ends with a single address: that address and its level are the
//! root of the tree.
//!
//! ```text
//!   level 2            [I2]
//!                    /      \
//!   level 1      [I1a]      [I1b]
//!               /  |  \      |   \
//!   level 0   [c0][c1][c2] [c3] [c4]     <- plaintext chunks
//! ```
//!
//! Per-level state lives in `TreeBuilder::indexes`, indexed by depth.
//! `indexes[l]` collects the addresses of level-`l` chunks and is cut into
//! level-`l + 1` chunks by the same strategy as the input.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use strata_chunks::{ByteSource, Chunker, ChunkSource, ChunkingStrategy, IndexByteSource};
use strata_core::{Address, OverwriteStrategy, PutStatus, StrataError, StrataResult};
use strata_crypto::ChunkEncryptor;
use strata_storage::ChunkStorage;

use crate::check_cancelled;
use crate::reader::StreamReader;

/// Deepest tree level a writer will build or a reader will descend.
pub const MAX_TREE_LEVEL: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamWriteStats {
    /// Level-0 chunks produced by the chunker
    pub leaf_chunks: u64,
    /// Chunks at level 1 and above
    pub index_chunks: u64,
    /// Puts that stored a new object
    pub stored_chunks: u64,
    /// Puts answered with `OverwriteDenied`, i.e. already present
    pub deduplicated_chunks: u64,
    /// Bytes read from the input stream
    pub plaintext_bytes: u64,
    /// Envelope bytes of newly stored objects
    pub stored_bytes: u64,
}

impl StreamWriteStats {
    pub fn total_chunks(&self) -> u64 {
        self.leaf_chunks + self.index_chunks
    }
}

/// Where a written stream can be found again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamWriteResult {
    pub root: Address,
    /// 0 when the root is itself a plaintext chunk
    pub level: usize,
    pub stats: StreamWriteStats,
}

/// Totals from a full-tree verification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub chunks: u64,
    pub plaintext_bytes: u64,
}

struct TreeBuilder {
    indexes: Vec<Chunker<IndexByteSource>>,
    stats: StreamWriteStats,
}

/// A chunk waiting to be stored
struct PendingChunk {
    level: usize,
    data: Vec<u8>,
    offset: u64,
}

/// Writes and reads chunk trees.
#[derive(Debug, Clone)]
pub struct StreamStorage {
    storage: Arc<dyn ChunkStorage>,
    encryptor: Arc<ChunkEncryptor>,
    strategy: ChunkingStrategy,
}

impl StreamStorage {
    pub fn new(
        storage: Arc<dyn ChunkStorage>,
        encryptor: Arc<ChunkEncryptor>,
        strategy: ChunkingStrategy,
    ) -> Self {
        Self {
            storage,
            encryptor,
            strategy,
        }
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    /// Chunk, encrypt, and store everything `source` yields.
    pub async fn write<S: ByteSource>(
        &self,
        source: S,
        cancel: &CancellationToken,
    ) -> StrataResult<StreamWriteResult> {
        let mut builder = TreeBuilder {
            indexes: Vec::new(),
            stats: StreamWriteStats::default(),
        };

        let mut leaves = self.strategy.chunker(source);
        while let Some(chunk) = leaves.next_chunk()? {
            self.store(&mut builder, 0, chunk.data, chunk.offset, cancel)
                .await?;
        }
        if builder.stats.leaf_chunks == 0 {
            // Every stream gets a root, even an empty one
            self.store(&mut builder, 0, &[], 0, cancel).await?;
        }

        self.finish(builder, cancel).await
    }

    /// Convenience for in-memory input.
    pub async fn write_bytes(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> StrataResult<StreamWriteResult> {
        self.write(strata_chunks::SliceByteSource::new(data), cancel)
            .await
    }

    /// Store one chunk at `level`, then every index chunk it completes,
    /// depth first.
    async fn store(
        &self,
        builder: &mut TreeBuilder,
        level: usize,
        data: &[u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> StrataResult<()> {
        self.put_and_index(builder, level, data, offset, cancel)
            .await?;

        let mut pending = drain_ready(builder, level)?;
        while let Some(chunk) = pending.pop() {
            self.put_and_index(builder, chunk.level, &chunk.data, chunk.offset, cancel)
                .await?;
            let mut completed = drain_ready(builder, chunk.level)?;
            // `pending` is a stack; the earliest completed chunk goes on top
            completed.reverse();
            pending.extend(completed);
        }
        Ok(())
    }

    async fn put_and_index(
        &self,
        builder: &mut TreeBuilder,
        level: usize,
        data: &[u8],
        offset: u64,
        cancel: &CancellationToken,
    ) -> StrataResult<()> {
        if level > MAX_TREE_LEVEL {
            return Err(StrataError::RecursionLimitExceeded { level });
        }
        check_cancelled(cancel)?;

        let chunk = self.encryptor.encrypt_content(data)?;
        let status = self.storage.put(&chunk, OverwriteStrategy::Deny).await?;

        let stats = &mut builder.stats;
        if level == 0 {
            stats.leaf_chunks += 1;
            stats.plaintext_bytes += data.len() as u64;
        } else {
            stats.index_chunks += 1;
        }
        match status {
            PutStatus::Success => {
                stats.stored_chunks += 1;
                stats.stored_bytes += chunk.len() as u64;
            }
            PutStatus::OverwriteDenied => {
                stats.deduplicated_chunks += 1;
                trace!(address = %chunk.address, level, "dedup hit");
            }
        }

        while builder.indexes.len() <= level {
            // Index stream for level-l chunks produces level l+1 chunks
            let next_level = u8::try_from(builder.indexes.len() + 1)
                .map_err(|_| StrataError::RecursionLimitExceeded { level: level + 1 })?;
            builder
                .indexes
                .push(self.strategy.chunker(IndexByteSource::new(next_level)));
        }
        builder.indexes[level]
            .source_mut()
            .add(chunk.address, offset, data.len() as u64)
    }

    /// Collapse the remaining index levels into a single root.
    async fn finish(
        &self,
        mut builder: TreeBuilder,
        cancel: &CancellationToken,
    ) -> StrataResult<StreamWriteResult> {
        let mut level = 0;
        loop {
            let index = builder.indexes.get_mut(level).ok_or_else(|| {
                StrataError::Format(format!("tree level {level} has no index stream"))
            })?;

            if let Some(root) = index.source().single_record() {
                info!(
                    root = %root.address,
                    level,
                    chunks = builder.stats.total_chunks(),
                    deduplicated = builder.stats.deduplicated_chunks,
                    bytes = builder.stats.plaintext_bytes,
                    "stream written"
                );
                return Ok(StreamWriteResult {
                    root: root.address,
                    level,
                    stats: builder.stats,
                });
            }

            debug!(level, records = index.source().count(), "flushing index level");
            index.source_mut().complete_adding();
            let remaining = drain_ready(&mut builder, level)?;
            for chunk in remaining {
                self.store(&mut builder, chunk.level, &chunk.data, chunk.offset, cancel)
                    .await?;
            }
            level += 1;
        }
    }

    /// Lazily read the tree rooted at `address`.
    pub fn reader(&self, level: usize, address: Address, cancel: CancellationToken) -> StreamReader {
        StreamReader::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.encryptor),
            level,
            address,
            cancel,
        )
    }

    /// Read a whole stream into memory.
    pub async fn read_to_vec(
        &self,
        level: usize,
        address: Address,
        cancel: &CancellationToken,
    ) -> StrataResult<Vec<u8>> {
        let mut reader = self.reader(level, address, cancel.clone());
        let mut out = Vec::new();
        while let Some(fragment) = reader.next_fragment().await? {
            out.extend_from_slice(&fragment);
        }
        Ok(out)
    }

    /// Stream plaintext into `writer`, returning the byte count.
    pub async fn read_to_writer<W: AsyncWrite + Unpin>(
        &self,
        level: usize,
        address: Address,
        writer: &mut W,
        cancel: &CancellationToken,
    ) -> StrataResult<u64> {
        let mut reader = self.reader(level, address, cancel.clone());
        let mut written = 0u64;
        while let Some(fragment) = reader.next_fragment().await? {
            writer.write_all(&fragment).await?;
            written += fragment.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Fetch, decrypt, and check every chunk of a tree.
    pub async fn verify(
        &self,
        level: usize,
        address: Address,
        cancel: &CancellationToken,
    ) -> StrataResult<VerifyReport> {
        let mut reader = self.reader(level, address, cancel.clone());
        let mut report = VerifyReport::default();
        while let Some(fragment) = reader.next_fragment().await? {
            report.plaintext_bytes += fragment.len() as u64;
        }
        report.chunks = reader.chunks_read();
        info!(root = %address, level, chunks = report.chunks, bytes = report.plaintext_bytes, "stream verified");
        Ok(report)
    }
}

/// Pull every chunk the level-`level` index stream can emit right now.
fn drain_ready(builder: &mut TreeBuilder, level: usize) -> StrataResult<Vec<PendingChunk>> {
    let mut ready = Vec::new();
    if let Some(index) = builder.indexes.get_mut(level) {
        while let Some(chunk) = index.next_chunk()? {
            ready.push(PendingChunk {
                level: level + 1,
                data: chunk.data.to_vec(),
                offset: chunk.offset,
            });
        }
    }
    Ok(ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_crypto::{AddressKey, KeyEncryptionKey};
    use strata_storage::MemoryChunkStorage;

    fn setup(strategy: ChunkingStrategy) -> (Arc<MemoryChunkStorage>, StreamStorage) {
        let memory = Arc::new(MemoryChunkStorage::new());
        let encryptor = ChunkEncryptor::new(
            KeyEncryptionKey::from_bytes([1; 32]),
            &AddressKey::from_bytes([2; 32]),
        )
        .unwrap();
        let storage: Arc<dyn ChunkStorage> = memory.clone();
        (memory, StreamStorage::new(storage, Arc::new(encryptor), strategy))
    }

    #[tokio::test]
    async fn single_chunk_stream_has_level_zero_root() {
        let (memory, streams) = setup(ChunkingStrategy::fixed(1024));
        let cancel = CancellationToken::new();
        let result = streams.write_bytes(b"short", &cancel).await.unwrap();

        assert_eq!(result.level, 0);
        assert_eq!(result.stats.leaf_chunks, 1);
        assert_eq!(result.stats.index_chunks, 0);
        assert_eq!(memory.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_stream_gets_a_root() {
        let (_, streams) = setup(ChunkingStrategy::fixed(1024));
        let cancel = CancellationToken::new();
        let result = streams.write_bytes(&[], &cancel).await.unwrap();
        assert_eq!(result.level, 0);
        assert_eq!(result.stats.leaf_chunks, 1);
        assert_eq!(result.stats.plaintext_bytes, 0);
        let back = streams.read_to_vec(result.level, result.root, &cancel).await.unwrap();
        assert!(back.is_empty());
    }

    #[tokio::test]
    async fn small_fixed_chunks_build_a_deep_tree() {
        // 128-byte chunks hold at most three index records, so 100 leaves
        // need several index levels
        let (_, streams) = setup(ChunkingStrategy::fixed(128));
        let cancel = CancellationToken::new();
        let data: Vec<u8> = (0..128 * 100).map(|i| (i % 251) as u8).collect();
        let result = streams.write_bytes(&data, &cancel).await.unwrap();

        assert!(result.level >= 3, "got level {}", result.level);
        assert_eq!(result.stats.leaf_chunks, 100);
        assert!(result.stats.index_chunks > 0);
        let back = streams.read_to_vec(result.level, result.root, &cancel).await.unwrap();
        assert_eq!(back, data);
    }

    #[tokio::test]
    async fn two_leaves_give_one_index_chunk() {
        let (memory, streams) = setup(ChunkingStrategy::fixed(128));
        let cancel = CancellationToken::new();
        let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let result = streams.write_bytes(&data, &cancel).await.unwrap();

        assert_eq!(result.level, 1);
        assert_eq!(result.stats.leaf_chunks, 2);
        assert_eq!(result.stats.index_chunks, 1);
        assert_eq!(memory.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cancelled_write_stops_before_storing() {
        let (memory, streams) = setup(ChunkingStrategy::fixed(128));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = streams.write_bytes(&[0u8; 1000], &cancel).await.unwrap_err();
        assert!(matches!(err, StrataError::Cancelled));
        assert_eq!(memory.put_calls(), 0);
    }
}
