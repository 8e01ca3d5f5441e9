//! Chunking strategy selection
//!
//! The tree writer runs the same strategy over the input stream and over
//! every index level, so a strategy is a small `Copy` value that can build a
//! chunker for any byte source.

use strata_core::config::{
    ChunkingConfig, MAX_CHUNK_SIZE, MAX_ROLLING_THRESHOLD, MIN_FIXED_CHUNK_SIZE,
};
use strata_core::{StrataError, StrataResult};

use crate::fixed::FixedSizeChunker;
use crate::rolling::{RollingHashChunker, RollingParams};
use crate::source::{ByteSource, ChunkRef, ChunkSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingStrategy {
    Fixed { chunk_size: usize },
    Rolling(RollingParams),
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        ChunkingStrategy::Rolling(RollingParams::default())
    }
}

impl ChunkingStrategy {
    pub fn fixed(chunk_size: usize) -> Self {
        ChunkingStrategy::Fixed { chunk_size }
    }

    pub fn rolling(threshold: u32) -> Self {
        ChunkingStrategy::Rolling(RollingParams {
            threshold,
            ..RollingParams::default()
        })
    }

    pub fn from_config(cfg: &ChunkingConfig) -> StrataResult<Self> {
        let strategy = match cfg.strategy.as_str() {
            "fixed" => ChunkingStrategy::Fixed {
                chunk_size: cfg.fixed_size,
            },
            "rolling" => ChunkingStrategy::Rolling(RollingParams {
                min_size: cfg.min_size,
                max_size: cfg.max_size,
                threshold: cfg.threshold,
            }),
            other => {
                return Err(StrataError::Config(format!(
                    "unknown chunking strategy: {other}"
                )))
            }
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Reject parameters for which index levels would not shrink, chunks
    /// could not be decompressed again, or the rolling hash never cuts.
    pub fn validate(&self) -> StrataResult<()> {
        match self {
            ChunkingStrategy::Fixed { chunk_size }
                if !(MIN_FIXED_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(chunk_size) =>
            {
                Err(StrataError::Config(format!(
                    "fixed chunk size {chunk_size} is outside {MIN_FIXED_CHUNK_SIZE}..={MAX_CHUNK_SIZE}"
                )))
            }
            ChunkingStrategy::Rolling(p)
                if p.min_size < MIN_FIXED_CHUNK_SIZE
                    || p.min_size >= p.max_size
                    || p.max_size > MAX_CHUNK_SIZE =>
            {
                Err(StrataError::Config(format!(
                    "rolling chunk sizes must satisfy {MIN_FIXED_CHUNK_SIZE} <= min < max <= {MAX_CHUNK_SIZE} (got {} / {})",
                    p.min_size, p.max_size
                )))
            }
            ChunkingStrategy::Rolling(p)
                if p.threshold == 0 || p.threshold >= MAX_ROLLING_THRESHOLD =>
            {
                Err(StrataError::Config(format!(
                    "rolling threshold must be in 1..{MAX_ROLLING_THRESHOLD}, got {}",
                    p.threshold
                )))
            }
            _ => Ok(()),
        }
    }

    /// Largest chunk this strategy can emit
    pub fn max_chunk_size(&self) -> usize {
        match self {
            ChunkingStrategy::Fixed { chunk_size } => *chunk_size,
            ChunkingStrategy::Rolling(p) => p.max_size,
        }
    }

    pub fn chunker<S: ByteSource>(&self, source: S) -> Chunker<S> {
        match *self {
            ChunkingStrategy::Fixed { chunk_size } => {
                Chunker::Fixed(FixedSizeChunker::new(source, chunk_size))
            }
            ChunkingStrategy::Rolling(params) => {
                Chunker::Rolling(RollingHashChunker::new(source, params))
            }
        }
    }
}

/// A chunker built by a `ChunkingStrategy`
#[derive(Debug)]
pub enum Chunker<S> {
    Fixed(FixedSizeChunker<S>),
    Rolling(RollingHashChunker<S>),
}

impl<S: ByteSource> Chunker<S> {
    pub fn source(&self) -> &S {
        match self {
            Chunker::Fixed(c) => c.source(),
            Chunker::Rolling(c) => c.source(),
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        match self {
            Chunker::Fixed(c) => c.source_mut(),
            Chunker::Rolling(c) => c.source_mut(),
        }
    }
}

impl<S: ByteSource> ChunkSource for Chunker<S> {
    fn available(&mut self) -> StrataResult<bool> {
        match self {
            Chunker::Fixed(c) => c.available(),
            Chunker::Rolling(c) => c.available(),
        }
    }

    fn is_completed(&self) -> bool {
        match self {
            Chunker::Fixed(c) => c.is_completed(),
            Chunker::Rolling(c) => c.is_completed(),
        }
    }

    fn next_chunk(&mut self) -> StrataResult<Option<ChunkRef<'_>>> {
        match self {
            Chunker::Fixed(c) => c.next_chunk(),
            Chunker::Rolling(c) => c.next_chunk(),
        }
    }
}
