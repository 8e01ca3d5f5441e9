//! Collection changeset encoding
//!
//! ```text
//! varint(count)
//! repeated count times:
//!   [op: 1 byte][varint(key len)][key]            op = 1, delete
//!   [op: 1 byte][varint(key len)][key][varint(value len)][value]   op = 0, upsert
//! ```

use strata_chunks::varint;
use strata_core::{StrataError, StrataResult};

const OP_UPSERT: u8 = 0;
const OP_DELETE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Upsert { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Change {
    pub fn upsert(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Change::Upsert {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Change::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Change::Upsert { key, .. } | Change::Delete { key } => key,
        }
    }
}

pub fn encode(changes: &[Change]) -> Vec<u8> {
    let mut out = Vec::new();
    varint::encode(changes.len() as u64, &mut out);
    for change in changes {
        match change {
            Change::Upsert { key, value } => {
                out.push(OP_UPSERT);
                put_bytes(key, &mut out);
                put_bytes(value, &mut out);
            }
            Change::Delete { key } => {
                out.push(OP_DELETE);
                put_bytes(key, &mut out);
            }
        }
    }
    out
}

pub fn decode(data: &[u8]) -> StrataResult<Vec<Change>> {
    let mut cursor = Cursor { data, pos: 0 };
    let count = cursor.varint()?;
    // Each change takes at least two bytes; don't trust the count for allocation
    let mut changes = Vec::with_capacity((count as usize).min(data.len() / 2));
    for _ in 0..count {
        let op = cursor.byte()?;
        let key = cursor.bytes()?.to_vec();
        let change = match op {
            OP_UPSERT => Change::Upsert {
                key,
                value: cursor.bytes()?.to_vec(),
            },
            OP_DELETE => Change::Delete { key },
            other => {
                return Err(StrataError::Format(format!(
                    "unknown changeset operation {other}"
                )))
            }
        };
        changes.push(change);
    }
    if cursor.pos != data.len() {
        return Err(StrataError::Format(format!(
            "{} trailing bytes after changeset",
            data.len() - cursor.pos
        )));
    }
    Ok(changes)
}

fn put_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    varint::encode(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn truncated() -> StrataError {
        StrataError::Format("changeset truncated".into())
    }

    fn byte(&mut self) -> StrataResult<u8> {
        let b = *self.data.get(self.pos).ok_or_else(Self::truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn varint(&mut self) -> StrataResult<u64> {
        let (value, used) = varint::decode(&self.data[self.pos..]).ok_or_else(Self::truncated)?;
        self.pos += used;
        Ok(value)
    }

    fn bytes(&mut self) -> StrataResult<&'a [u8]> {
        let len = usize::try_from(self.varint()?).map_err(|_| Self::truncated())?;
        let end = self.pos.checked_add(len).ok_or_else(Self::truncated)?;
        let slice = self.data.get(self.pos..end).ok_or_else(Self::truncated)?;
        self.pos = end;
        Ok(slice)
    }
}
