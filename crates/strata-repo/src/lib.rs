//! strata-repo: streams, dictionaries, and collections over encrypted chunks
//!
//! - `stream`: writes a byte stream as a tree of content-addressed chunks
//! - `reader`: lazily walks a chunk tree back into plaintext
//! - `sequence`: next-free sequence number search over existence probes
//! - `dictionary`: append-only `(namespace, key, sequence) -> value` store
//! - `changeset` / `collection`: a key/value map replayed from dictionary versions
//! - `repository`: wires config, keys, and storage together

pub mod changeset;
pub mod collection;
pub mod dictionary;
pub mod reader;
pub mod repository;
pub mod sequence;
pub mod stream;

pub use changeset::Change;
pub use collection::{Collection, CollectionSnapshot};
pub use dictionary::VersionedDictionary;
pub use reader::StreamReader;
pub use repository::Repository;
pub use sequence::next_sequence_number;
pub use stream::{StreamStorage, StreamWriteResult, StreamWriteStats, VerifyReport, MAX_TREE_LEVEL};

use strata_core::{StrataError, StrataResult};
use tokio_util::sync::CancellationToken;

/// Bail out with `Cancelled` once `cancel` has fired.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> StrataResult<()> {
    if cancel.is_cancelled() {
        return Err(StrataError::Cancelled);
    }
    Ok(())
}
