//! Storage health check

use strata_core::{StrataError, StrataResult};

use crate::backend::ChunkStorage;

/// Verify the chunk store is reachable by counting its chunks.
pub async fn check_health(storage: &dyn ChunkStorage) -> StrataResult<u64> {
    storage
        .count()
        .await
        .map_err(|e| StrataError::Storage(format!("storage health check failed: {e}")))
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(storage: &dyn ChunkStorage) -> bool {
    check_health(storage).await.is_ok()
}
