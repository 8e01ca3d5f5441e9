//! Fixed-size chunking
//!
//! Emits a chunk every `chunk_size` bytes. The final partial chunk is emitted
//! once the byte source reports completion.

use strata_core::StrataResult;

use crate::source::{take_byte, ByteSource, ChunkRef, ChunkSource};

#[derive(Debug)]
pub struct FixedSizeChunker<S> {
    source: S,
    chunk_size: usize,
    buf: Vec<u8>,
    /// Stream offset of `buf[0]`
    offset: u64,
    ready: bool,
    /// `buf` was handed out and is discarded on the next call
    emitted: bool,
}

impl<S: ByteSource> FixedSizeChunker<S> {
    pub fn new(source: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            source,
            chunk_size,
            buf: Vec::with_capacity(chunk_size),
            offset: 0,
            ready: false,
            emitted: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
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
}

impl<S: ByteSource> ChunkSource for FixedSizeChunker<S> {
    fn available(&mut self) -> StrataResult<bool> {
        self.discard_emitted();
        if self.ready {
            return Ok(true);
        }
        while self.buf.len() < self.chunk_size {
            match take_byte(&mut self.source)? {
                Some(b) => self.buf.push(b),
                None => break,
            }
        }
        self.ready = self.buf.len() == self.chunk_size
            || (self.source.is_completed() && !self.buf.is_empty());
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
