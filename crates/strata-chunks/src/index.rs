//! Index streams
//!
//! Each tree level writes the addresses of its chunks into an index byte
//! stream:
//!
//! ```text
//! [format version: 1 byte][tree level: 1 byte]
//! [address: 32 bytes][prefix varint: chunk length]
//! [address: 32 bytes][prefix varint: chunk length]
//! ...
//! ```
//!
//! The header appears once, at the start of a level's stream. The stream is
//! then chunked like any other input, so a record may straddle two index
//! chunks. The read side feeds index chunk bodies through one
//! `IndexRecordScanner` per level, which carries partial records across
//! sibling chunks.

use std::collections::VecDeque;

use strata_core::{Address, StrataError, StrataResult, ADDRESS_SIZE};

use crate::source::ByteSource;
use crate::varint;

/// Version byte written at the head of every index stream
pub const INDEX_FORMAT_VERSION: u8 = 1;

/// Bytes of header at the start of a level's index stream
pub const INDEX_HEADER_SIZE: usize = 2;

/// Largest encoded record
pub const MAX_INDEX_RECORD_SIZE: usize = ADDRESS_SIZE + varint::MAX_VARINT_LEN;

/// One child reference inside an index stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub address: Address,
    pub length: u64,
}

impl IndexRecord {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.address.as_bytes());
        varint::encode(self.length, out);
    }

    pub fn encoded_size(&self) -> usize {
        ADDRESS_SIZE + varint::encoded_size(self.length)
    }
}

/// Write side: queues serialized records for the next level's chunker.
#[derive(Debug)]
pub struct IndexByteSource {
    /// Tree level of the chunks this stream will be cut into
    level: u8,
    queue: VecDeque<u8>,
    header_written: bool,
    count: u64,
    first: Option<IndexRecord>,
    adding_completed: bool,
}

impl IndexByteSource {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            queue: VecDeque::new(),
            header_written: false,
            count: 0,
            first: None,
            adding_completed: false,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Enqueue the record for a chunk at `stream_offset` of the level below.
    pub fn add(&mut self, address: Address, stream_offset: u64, length: u64) -> StrataResult<()> {
        if self.adding_completed {
            return Err(StrataError::Format(format!(
                "index level {} already completed; cannot add chunk at offset {stream_offset}",
                self.level
            )));
        }
        if !self.header_written {
            self.queue.push_back(INDEX_FORMAT_VERSION);
            self.queue.push_back(self.level);
            self.header_written = true;
        }
        let record = IndexRecord { address, length };
        let mut encoded = Vec::with_capacity(record.encoded_size());
        record.encode(&mut encoded);
        self.queue.extend(encoded);
        if self.first.is_none() {
            self.first = Some(record);
        }
        self.count += 1;
        Ok(())
    }

    /// No more records will arrive; lets the chunker flush its final chunk.
    pub fn complete_adding(&mut self) {
        self.adding_completed = true;
    }

    /// Number of records added so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The only record, if exactly one was ever added.
    pub fn single_record(&self) -> Option<IndexRecord> {
        if self.count == 1 {
            self.first
        } else {
            None
        }
    }

    /// Bytes queued but not yet consumed
    pub fn pending_bytes(&self) -> usize {
        self.queue.len()
    }
}

impl ByteSource for IndexByteSource {
    fn available(&mut self) -> StrataResult<bool> {
        Ok(!self.queue.is_empty())
    }

    fn is_completed(&self) -> bool {
        self.adding_completed && self.queue.is_empty()
    }

    fn next_byte(&mut self) -> Option<u8> {
        self.queue.pop_front()
    }
}

/// Read side: per-level accumulator turning index bytes back into records.
#[derive(Debug, Default)]
pub struct IndexRecordScanner {
    header: Vec<u8>,
    scratch: Vec<u8>,
}

impl IndexRecordScanner {
    pub fn new() -> Self {
        Self {
            header: Vec::with_capacity(INDEX_HEADER_SIZE),
            scratch: Vec::with_capacity(MAX_INDEX_RECORD_SIZE),
        }
    }

    /// Feed one byte of a level-`level` index stream.
    ///
    /// Returns a record once its address and a complete varint are present.
    pub fn push(&mut self, level: u8, byte: u8) -> StrataResult<Option<IndexRecord>> {
        if self.header.len() < INDEX_HEADER_SIZE {
            self.header.push(byte);
            if self.header.len() == INDEX_HEADER_SIZE {
                check_header(&self.header, level)?;
            }
            return Ok(None);
        }

        self.scratch.push(byte);
        if self.scratch.len() <= ADDRESS_SIZE {
            return Ok(None);
        }
        let needed = ADDRESS_SIZE + varint::encoded_len(self.scratch[ADDRESS_SIZE]);
        if self.scratch.len() < needed {
            return Ok(None);
        }

        let address = Address::from_slice(&self.scratch[..ADDRESS_SIZE])?;
        let (length, _) = varint::decode(&self.scratch[ADDRESS_SIZE..]).ok_or_else(|| {
            StrataError::Format("index record varint incomplete".into())
        })?;
        self.scratch.clear();
        Ok(Some(IndexRecord { address, length }))
    }

    /// True when no partial record is buffered
    pub fn is_idle(&self) -> bool {
        self.scratch.is_empty()
    }

    pub fn header_seen(&self) -> bool {
        self.header.len() == INDEX_HEADER_SIZE
    }

    pub fn reset(&mut self) {
        self.header.clear();
        self.scratch.clear();
    }
}

fn check_header(header: &[u8], level: u8) -> StrataResult<()> {
    if header[0] != INDEX_FORMAT_VERSION {
        return Err(StrataError::Format(format!(
            "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
            header[0]
        )));
    }
    if header[1] != level {
        return Err(StrataError::Format(format!(
            "index stream declares level {} but was reached at level {level}",
            header[1]
        )));
    }
    Ok(())
}
