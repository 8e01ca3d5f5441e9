//! strata-core: types shared by every strata crate
//!
//! - `address`: 32-byte chunk addresses and their hex rendering
//! - `types`: encrypted chunk envelope holder and storage put semantics
//! - `error`: the error taxonomy surfaced by the chunk/tree/dictionary layers
//! - `config`: `strata.toml` schema

pub mod address;
pub mod config;
pub mod error;
pub mod types;

pub use address::{Address, ADDRESS_SIZE};
pub use error::{StrataError, StrataResult};
pub use types::{EncryptedChunk, OverwriteStrategy, PutStatus};
