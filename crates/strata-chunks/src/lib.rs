//! strata-chunks: turning byte streams into chunks, and chunk addresses into
//! index streams
//!
//! # Overview
//! - `source`: the pull-based `ByteSource` / `ChunkSource` contracts
//! - `fixed`: fixed-size chunking
//! - `rolling`: content-defined chunking over a 64-byte Rabin window
//! - `strategy`: config-driven selection between the two
//! - `varint`: self-delimiting prefix varints
//! - `index`: index byte source (write side) and index record scanner (read side)
//! - `compress`: pluggable compression with a one-byte algorithm tag

pub mod compress;
pub mod fixed;
pub mod index;
pub mod rolling;
pub mod source;
pub mod strategy;
pub mod varint;

// Convenience re-exports for the most common operations
pub use compress::{CompressionTag, Compressor, NoCompression, ZstdCompressor};
pub use fixed::FixedSizeChunker;
pub use index::{IndexByteSource, IndexRecord, IndexRecordScanner, INDEX_FORMAT_VERSION};
pub use rolling::{RollingHash, RollingHashChunker, RollingParams};
pub use source::{ByteSource, ChunkRef, ChunkSource, ReaderByteSource, SliceByteSource};
pub use strategy::{Chunker, ChunkingStrategy};
