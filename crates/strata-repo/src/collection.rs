//! Log-structured collections
//!
//! A collection is a key/value map stored as a run of dictionary versions
//! under `(namespace, name)`. Each version holds one changeset; the live map
//! is the fold of versions `0, 1, 2, ...` until the first unclaimed one.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use strata_core::{StrataError, StrataResult};

use crate::changeset::{self, Change};
use crate::check_cancelled;
use crate::dictionary::VersionedDictionary;

/// The map as of one version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    /// Last folded version, `None` for a collection never written
    pub version: Option<u64>,
    pub entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl CollectionSnapshot {
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&mut self, version: u64, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::Upsert { key, value } => {
                    self.entries.insert(key, value);
                }
                Change::Delete { key } => {
                    self.entries.remove(&key);
                }
            }
        }
        self.version = Some(version);
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    dictionary: VersionedDictionary,
    namespace: Vec<u8>,
    name: Vec<u8>,
}

impl Collection {
    pub fn new(
        dictionary: VersionedDictionary,
        namespace: impl Into<Vec<u8>>,
        name: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            dictionary,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Current contents: every version folded in order.
    pub async fn values(&self, cancel: &CancellationToken) -> StrataResult<CollectionSnapshot> {
        self.fold(None, cancel).await
    }

    /// Contents as of `version`, folding `0..=version` only.
    pub async fn values_at(
        &self,
        version: u64,
        cancel: &CancellationToken,
    ) -> StrataResult<CollectionSnapshot> {
        let snapshot = self.fold(Some(version), cancel).await?;
        if snapshot.version != Some(version) {
            return Err(StrataError::Format(format!(
                "collection version {version} does not exist"
            )));
        }
        Ok(snapshot)
    }

    async fn fold(
        &self,
        until: Option<u64>,
        cancel: &CancellationToken,
    ) -> StrataResult<CollectionSnapshot> {
        let mut snapshot = CollectionSnapshot::default();
        let mut version = 0u64;
        loop {
            if until.is_some_and(|last| version > last) {
                break;
            }
            check_cancelled(cancel)?;
            let Some(payload) = self
                .dictionary
                .get_value(&self.namespace, &self.name, version)
                .await?
            else {
                break;
            };
            snapshot.apply(version, changeset::decode(&payload)?);
            version = match version.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        debug!(version = ?snapshot.version, entries = snapshot.len(), "replayed collection");
        Ok(snapshot)
    }

    /// Append `changes` as the version after `previous_version`.
    ///
    /// `None` means the collection has no versions yet. Fails with
    /// `ConcurrentModification` if someone else has written since; re-read
    /// and retry.
    pub async fn write_changes(
        &self,
        previous_version: Option<u64>,
        changes: &[Change],
        cancel: &CancellationToken,
    ) -> StrataResult<u64> {
        let expected = match previous_version {
            Some(v) => v.checked_add(1).ok_or(StrataError::SequenceSpaceExhausted)?,
            None => 0,
        };
        let next = self
            .dictionary
            .resolve_next_sequence(&self.namespace, &self.name, previous_version.unwrap_or(0), cancel)
            .await?;
        if next != expected {
            return Err(StrataError::ConcurrentModification {
                expected,
                actual: next,
            });
        }

        check_cancelled(cancel)?;
        let payload = changeset::encode(changes);
        if !self
            .dictionary
            .put_value(&self.namespace, &self.name, next, &payload)
            .await?
        {
            return Err(StrataError::ConcurrentModification {
                expected,
                actual: next + 1,
            });
        }

        info!(version = next, changes = changes.len(), "collection version written");
        Ok(next)
    }
}
