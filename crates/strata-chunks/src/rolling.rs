//! Content-defined chunking with a Rabin-style rolling hash
//!
//! The hash covers the last 64 bytes of input:
//!   insert: `hash = (hash * 256 + byte) mod P`
//!   evict:  subtract `byte * 256^63 mod P` for the byte leaving the window
//!
//! `P = 16_777_213` is the largest prime below 2^24, so `hash * 256` still
//! fits in 32 bits.
//!
//! A boundary falls after a byte when the current chunk is longer than
//! `min_size` and the hash has exactly `threshold` trailing zero bits, or when
//! the chunk reaches `max_size`. Since the hash only depends on the last 64
//! bytes, an insertion early in a stream stops affecting boundaries once the
//! chunker passes the next boundary after it.

use strata_core::StrataResult;

use crate::source::{take_byte, ByteSource, ChunkRef, ChunkSource};

/// Bytes covered by the rolling window
pub const WINDOW_SIZE: usize = 64;

/// Largest prime below 2^24
pub const MODULUS: u64 = 16_777_213;

/// `256^(WINDOW_SIZE - 1) mod MODULUS`: weight of the byte leaving the window
const EVICT_FACTOR: u64 = {
    let mut factor = 1u64;
    let mut i = 0;
    while i < WINDOW_SIZE - 1 {
        factor = (factor * 256) % MODULUS;
        i += 1;
    }
    factor
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingParams {
    pub min_size: usize,
    pub max_size: usize,
    /// Required trailing zero count; expected chunk size is about `2^(threshold + 1)`
    pub threshold: u32,
}

impl Default for RollingParams {
    fn default() -> Self {
        Self {
            min_size: 512,
            max_size: 128 * 1024,
            threshold: 13,
        }
    }
}

/// 64-byte sliding window hash
#[derive(Debug, Clone)]
pub struct RollingHash {
    window: [u8; WINDOW_SIZE],
    pos: usize,
    filled: usize,
    hash: u64,
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash {
    pub fn new() -> Self {
        Self {
            window: [0u8; WINDOW_SIZE],
            pos: 0,
            filled: 0,
            hash: 0,
        }
    }

    /// Push one byte, evicting the oldest once the window is full.
    pub fn roll(&mut self, byte: u8) {
        if self.filled == WINDOW_SIZE {
            let out = self.window[self.pos] as u64;
            self.hash = (self.hash + MODULUS - (out * EVICT_FACTOR) % MODULUS) % MODULUS;
        } else {
            self.filled += 1;
        }
        self.hash = (self.hash * 256 + byte as u64) % MODULUS;
        self.window[self.pos] = byte;
        self.pos = (self.pos + 1) % WINDOW_SIZE;
    }

    pub fn value(&self) -> u32 {
        self.hash as u32
    }

    /// Trailing zero count of the hash (32 for a zero hash)
    pub fn trailing_zeros(&self) -> u32 {
        self.value().trailing_zeros()
    }
}

#[derive(Debug)]
pub struct RollingHashChunker<S> {
    source: S,
    params: RollingParams,
    hash: RollingHash,
    buf: Vec<u8>,
    offset: u64,
    ready: bool,
    emitted: bool,
}

impl<S: ByteSource> RollingHashChunker<S> {
    pub fn new(source: S, params: RollingParams) -> Self {
        Self {
            source,
            params,
            hash: RollingHash::new(),
            buf: Vec::new(),
            offset: 0,
            ready: false,
            emitted: false,
        }
    }

    pub fn params(&self) -> &RollingParams {
        &self.params
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn discard_emitted(&mut self) {
        if self.emitted {
            self.offset += self.buf.len() as u64;
            self.buf.clear();
            self.emitted = false;
            self.ready = false;
        }
    }

    fn at_boundary(&self) -> bool {
        let len = self.buf.len();
        (len > self.params.min_size && self.hash.trailing_zeros() == self.params.threshold)
            || len >= self.params.max_size
    }
}

impl<S: ByteSource> ChunkSource for RollingHashChunker<S> {
    fn available(&mut self) -> StrataResult<bool> {
        self.discard_emitted();
        if self.ready {
            return Ok(true);
        }
        while let Some(b) = take_byte(&mut self.source)? {
            self.hash.roll(b);
            self.buf.push(b);
            if self.at_boundary() {
                self.ready = true;
                return Ok(true);
            }
        }
        self.ready = self.source.is_completed() && !self.buf.is_empty();
        Ok(self.ready)
    }

    fn is_completed(&self) -> bool {
        self.source.is_completed() && (self.emitted || self.buf.is_empty())
    }

    fn next_chunk(&mut self) -> StrataResult<Option<ChunkRef<'_>>> {
        if !self.available()? {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(ChunkRef {
            data: &self.buf,
            offset: self.offset,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceByteSource;
    use proptest::prelude::*;

    fn chunk_lengths(data: &[u8], params: RollingParams) -> Vec<usize> {
        let mut chunker = RollingHashChunker::new(SliceByteSource::new(data), params);
        let mut out = Vec::new();
        while let Some(c) = chunker.next_chunk().unwrap() {
            out.push(c.len());
        }
        out
    }

    fn chunks(data: &[u8], params: RollingParams) -> Vec<Vec<u8>> {
        let mut chunker = RollingHashChunker::new(SliceByteSource::new(data), params);
        let mut out = Vec::new();
        while let Some(c) = chunker.next_chunk().unwrap() {
            out.push(c.data.to_vec());
        }
        out
    }

    /// xorshift64 byte stream
    fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                (x >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn hash_depends_only_on_window_contents() {
        let tail: Vec<u8> = (0..WINDOW_SIZE as u8).collect();
        let mut a = RollingHash::new();
        let mut b = RollingHash::new();
        for byte in b"some unrelated prefix".iter().chain(tail.iter()) {
            a.roll(*byte);
        }
        for byte in b"a different, longer unrelated prefix".iter().chain(tail.iter()) {
            b.roll(*byte);
        }
        assert_eq!(a.value(), b.value());
        assert!(a.value() < MODULUS as u32);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_lengths(&[], RollingParams::default()).is_empty());
    }

    #[test]
    fn uniform_input_hits_max_size() {
        let data = vec![0u8; 300 * 1024];
        let lens = chunk_lengths(&data, RollingParams::default());
        assert_eq!(lens, vec![128 * 1024, 128 * 1024, 44 * 1024]);
    }

    #[test]
    fn repeated_pattern_regression_threshold_13() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(5000);
        let lens = chunk_lengths(&data, RollingParams::default());
        assert_eq!(lens, vec![131_072, 93_928]);
    }

    #[test]
    fn repeated_pattern_regression_threshold_5() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(5000);
        let params = RollingParams {
            threshold: 5,
            ..RollingParams::default()
        };
        let lens = chunk_lengths(&data, params);

        let mut expected = vec![534];
        expected.extend(std::iter::repeat(540).take(415));
        expected.push(366);
        assert_eq!(lens, expected);
        assert_eq!(lens.iter().sum::<usize>(), data.len());
    }

    #[test]
    fn insertion_only_disturbs_the_first_chunk() {
        let base = pseudo_random(1 << 20, 0x9E37_79B9_7F4A_7C15);
        let mut shifted = b"inserted-prefix-bytes!".repeat(5);
        shifted.extend_from_slice(&base);

        for threshold in [13, 10] {
            let params = RollingParams {
                threshold,
                ..RollingParams::default()
            };
            let original = chunks(&base, params);
            let edited = chunks(&shifted, params);
            assert!(original.len() > 10);
            assert_ne!(original[0], edited[0]);
            assert_eq!(original[1..], edited[1..], "threshold {threshold}");
        }
    }

    #[test]
    fn no_boundary_before_min_size() {
        let data = pseudo_random(256 * 1024, 42);
        let params = RollingParams {
            threshold: 4,
            ..RollingParams::default()
        };
        let lens = chunk_lengths(&data, params);
        let (last, body) = lens.split_last().unwrap();
        assert!(body.iter().all(|&l| l > params.min_size && l <= params.max_size));
        assert!(*last <= params.max_size);
    }

    proptest! {
        #[test]
        fn chunking_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=32768)) {
            let params = RollingParams { threshold: 8, ..RollingParams::default() };
            let c1 = chunk_lengths(&data, params);
            let c2 = chunk_lengths(&data, params);
            prop_assert_eq!(c1, c2, "chunk boundaries must be deterministic");
        }

        #[test]
        fn chunks_cover_full_input(data in proptest::collection::vec(any::<u8>(), 1..=65536)) {
            let params = RollingParams { threshold: 6, ..RollingParams::default() };
            let rebuilt: Vec<u8> = chunks(&data, params).concat();
            prop_assert_eq!(rebuilt, data, "chunks must cover full input");
        }
    }
}
