//! Pluggable chunk compression
//!
//! Compression runs on plaintext before encryption. The algorithm is recorded
//! as a single tag byte in the chunk envelope, so any reader can decompress
//! regardless of which compressor the writer was configured with.

use std::io::Read;

use strata_core::config::MAX_CHUNK_SIZE;
use strata_core::{StrataError, StrataResult};

/// Maximum decompressed output size, the largest chunk a writer may emit.
/// Prevents decompression bombs from consuming unbounded memory.
pub const MAX_DECOMPRESSED_SIZE: usize = MAX_CHUNK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionTag {
    None = 0,
    Zstd = 1,
}

impl CompressionTag {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> StrataResult<Self> {
        match b {
            0 => Ok(CompressionTag::None),
            1 => Ok(CompressionTag::Zstd),
            other => Err(StrataError::Format(format!(
                "unknown compression tag {other:#04x}"
            ))),
        }
    }
}

pub trait Compressor: Send + Sync {
    /// Compress `data`, reporting which algorithm produced the output.
    fn compress(&self, data: &[u8]) -> StrataResult<(Vec<u8>, CompressionTag)>;

    /// Reverse `compress`. `size_hint` is a capacity hint, never a limit.
    fn decompress(
        &self,
        tag: CompressionTag,
        data: &[u8],
        size_hint: usize,
    ) -> StrataResult<Vec<u8>> {
        decompress(tag, data, size_hint)
    }
}

/// Stores chunks as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &[u8]) -> StrataResult<(Vec<u8>, CompressionTag)> {
        Ok((data.to_vec(), CompressionTag::None))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    pub level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> StrataResult<(Vec<u8>, CompressionTag)> {
        let compressed = zstd::encode_all(data, self.level)
            .map_err(|e| StrataError::Compression(format!("zstd compress: {e}")))?;
        Ok((compressed, CompressionTag::Zstd))
    }
}

/// Decompress `data` according to `tag`.
pub fn decompress(tag: CompressionTag, data: &[u8], size_hint: usize) -> StrataResult<Vec<u8>> {
    match tag {
        CompressionTag::None => Ok(data.to_vec()),
        CompressionTag::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(data)
                .map_err(|e| StrataError::Compression(format!("zstd init: {e}")))?;
            let mut out = Vec::with_capacity(size_hint.min(MAX_DECOMPRESSED_SIZE));
            decoder
                .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| StrataError::Compression(format!("zstd decompress: {e}")))?;
            if out.len() > MAX_DECOMPRESSED_SIZE {
                return Err(StrataError::Compression(format!(
                    "decompressed size exceeds limit of {MAX_DECOMPRESSED_SIZE} bytes"
                )));
            }
            Ok(out)
        }
    }
}
