//! Lazy chunk tree reader
//!
//! Walks a tree depth first with an explicit stack of index chunk frames.
//! Each index level's stream is scanned by one `IndexRecordScanner`, kept
//! across sibling chunks, since a record may straddle two of them.

use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use strata_chunks::IndexRecordScanner;
use strata_core::{Address, StrataError, StrataResult};
use strata_crypto::ChunkEncryptor;
use strata_storage::ChunkStorage;

use crate::check_cancelled;
use crate::stream::MAX_TREE_LEVEL;

/// An index chunk body being scanned
struct Frame {
    level: usize,
    body: Vec<u8>,
    pos: usize,
}

/// Next chunk to fetch
struct Target {
    address: Address,
    level: usize,
    /// Plaintext length recorded by the parent index, `None` for the root
    expected_len: Option<u64>,
}

/// Pull-based plaintext reader over one chunk tree.
pub struct StreamReader {
    storage: Arc<dyn ChunkStorage>,
    encryptor: Arc<ChunkEncryptor>,
    cancel: CancellationToken,
    stack: Vec<Frame>,
    /// `scanners[l - 1]` parses the level-`l` index stream
    scanners: Vec<IndexRecordScanner>,
    next: Option<Target>,
    chunks_read: u64,
    root_level: usize,
}

impl StreamReader {
    pub fn new(
        storage: Arc<dyn ChunkStorage>,
        encryptor: Arc<ChunkEncryptor>,
        level: usize,
        root: Address,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            storage,
            encryptor,
            cancel,
            stack: Vec::new(),
            scanners: (0..level.min(MAX_TREE_LEVEL))
                .map(|_| IndexRecordScanner::new())
                .collect(),
            next: Some(Target {
                address: root,
                level,
                expected_len: None,
            }),
            chunks_read: 0,
            root_level: level,
        }
    }

    /// Chunks fetched and verified so far
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Next plaintext fragment in stream order, `None` once the tree is exhausted.
    pub async fn next_fragment(&mut self) -> StrataResult<Option<Vec<u8>>> {
        if self.root_level > MAX_TREE_LEVEL {
            return Err(StrataError::RecursionLimitExceeded {
                level: self.root_level,
            });
        }

        loop {
            if let Some(target) = self.next.take() {
                let plaintext = self.fetch(&target).await?;
                if target.level == 0 {
                    return Ok(Some(plaintext));
                }
                self.stack.push(Frame {
                    level: target.level,
                    body: plaintext,
                    pos: 0,
                });
                continue;
            }

            let Some(frame) = self.stack.last_mut() else {
                return self.finish();
            };
            let scanner = &mut self.scanners[frame.level - 1];
            // Index levels are at most MAX_TREE_LEVEL, so they fit the header byte
            let level_byte = frame.level as u8;
            while frame.pos < frame.body.len() {
                let byte = frame.body[frame.pos];
                frame.pos += 1;
                if let Some(record) = scanner.push(level_byte, byte)? {
                    self.next = Some(Target {
                        address: record.address,
                        level: frame.level - 1,
                        expected_len: Some(record.length),
                    });
                    break;
                }
            }
            if self.next.is_none() {
                self.stack.pop();
            }
        }
    }

    async fn fetch(&mut self, target: &Target) -> StrataResult<Vec<u8>> {
        check_cancelled(&self.cancel)?;
        let chunk = self
            .storage
            .get(&target.address)
            .await?
            .ok_or(StrataError::MissingChunk {
                address: target.address,
            })?;
        let plaintext = self.encryptor.decrypt_content(&chunk)?;
        self.chunks_read += 1;

        if let Some(expected) = target.expected_len {
            if plaintext.len() as u64 != expected {
                return Err(StrataError::Format(format!(
                    "chunk {} at level {} is {} bytes, index records {expected}",
                    target.address,
                    target.level,
                    plaintext.len()
                )));
            }
        }
        trace!(address = %target.address, level = target.level, bytes = plaintext.len(), "read chunk");
        Ok(plaintext)
    }

    fn finish(&self) -> StrataResult<Option<Vec<u8>>> {
        if let Some(level) = self.scanners.iter().position(|s| !s.is_idle()) {
            return Err(StrataError::Format(format!(
                "index stream at level {} ends inside a record",
                level + 1
            )));
        }
        Ok(None)
    }

    /// Adapt into a `futures::Stream` of fragments.
    pub fn into_stream(self) -> impl Stream<Item = StrataResult<Vec<u8>>> {
        stream::try_unfold(self, |mut reader| async move {
            let fragment = reader.next_fragment().await?;
            Ok(fragment.map(|f| (f, reader)))
        })
    }
}
