//! Pull-based byte and chunk sources
//!
//! A `ByteSource` hands out one byte at a time. A `ChunkSource` sits on top
//! of a byte source and groups its bytes into chunks. Because both share the
//! same `available` / `is_completed` shape, a chunk source can run over the
//! index bytes produced by another level of the tree exactly as it runs over
//! the raw input stream.
//!
//! `available` and `is_completed` are deliberately distinct: an index byte
//! source can be temporarily empty (nothing available) while still expecting
//! more records (not completed).

use std::io::{ErrorKind, Read};

use strata_core::StrataResult;

/// Default refill size for reader-backed sources
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

pub trait ByteSource {
    /// True when `next_byte` will return a byte. May pull more input.
    fn available(&mut self) -> StrataResult<bool>;

    /// True once the source is exhausted and will never yield again.
    fn is_completed(&self) -> bool;

    /// Take the next byte, or `None` if nothing is available right now.
    fn next_byte(&mut self) -> Option<u8>;
}

/// A chunk handed out by a `ChunkSource`.
///
/// `data` borrows the chunker's internal buffer and is only valid until the
/// next call on that chunker; callers copy out what they keep.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRef<'a> {
    pub data: &'a [u8],
    /// Offset of the first byte within the stream the chunker consumes
    pub offset: u64,
}

impl ChunkRef<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub trait ChunkSource {
    /// True when a complete chunk is ready. Pulls from the byte source until a
    /// boundary is found or the byte source runs dry.
    fn available(&mut self) -> StrataResult<bool>;

    /// True once every byte of the underlying source has been emitted.
    fn is_completed(&self) -> bool;

    /// Return the next complete chunk, if one is available.
    fn next_chunk(&mut self) -> StrataResult<Option<ChunkRef<'_>>>;
}

/// In-memory byte source over a borrowed slice
#[derive(Debug)]
pub struct SliceByteSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceByteSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for SliceByteSource<'_> {
    fn available(&mut self) -> StrataResult<bool> {
        Ok(self.pos < self.data.len())
    }

    fn is_completed(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }
}

/// Byte source over any `std::io::Read`, refilled in 64 KiB blocks.
pub struct ReaderByteSource<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    eof: bool,
}

impl<R: Read> ReaderByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, READ_BUFFER_SIZE)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; capacity.max(1)],
            pos: 0,
            filled: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> StrataResult<()> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.eof = true;
                    self.pos = 0;
                    self.filled = 0;
                    return Ok(());
                }
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read> ByteSource for ReaderByteSource<R> {
    fn available(&mut self) -> StrataResult<bool> {
        if self.pos < self.filled {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        self.refill()?;
        Ok(self.pos < self.filled)
    }

    fn is_completed(&self) -> bool {
        self.eof && self.pos >= self.filled
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.pos < self.filled {
            let b = self.buf[self.pos];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }
}

/// Pull one byte if the source has one ready.
pub(crate) fn take_byte<S: ByteSource>(source: &mut S) -> StrataResult<Option<u8>> {
    if source.available()? {
        Ok(source.next_byte())
    } else {
        Ok(None)
    }
}
