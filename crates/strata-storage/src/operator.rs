//! OpenDAL operator factory for strata storage backends

use std::sync::Arc;

use opendal::Operator;

use strata_core::config::StorageConfig;
use strata_core::{StrataError, StrataResult};

use crate::backend::ChunkStorage;
use crate::memory::MemoryChunkStorage;
use crate::opendal_store::OpendalChunkStorage;

/// Build an OpenDAL operator for the configured backend.
///
/// `fs` roots the operator at `storage.root`; `memory` is a fresh,
/// process-local service.
pub fn build_operator(cfg: &StorageConfig) -> StrataResult<Operator> {
    let op = match cfg.backend.as_str() {
        "fs" => {
            let root = cfg.root.to_string_lossy();
            layered(opendal::services::Fs::default().root(&root))
        }
        "memory" => layered(opendal::services::Memory::default()),
        other => {
            return Err(StrataError::Config(format!(
                "unknown storage backend: {other}"
            )))
        }
    };
    op.map_err(|e| StrataError::Storage(format!("creating {} operator: {e}", cfg.backend)))
}

fn layered<B: opendal::Builder>(builder: B) -> opendal::Result<Operator> {
    let op = Operator::new(builder)?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();
    Ok(op)
}

/// Open the chunk store described by `cfg`.
///
/// `memory` uses the native map backend; everything else goes through OpenDAL.
pub fn open_storage(cfg: &StorageConfig) -> StrataResult<Arc<dyn ChunkStorage>> {
    if cfg.backend == "memory" {
        tracing::debug!("using in-memory chunk storage");
        return Ok(Arc::new(MemoryChunkStorage::new()));
    }
    let op = build_operator(cfg)?;
    tracing::debug!(backend = %cfg.backend, root = %cfg.root.display(), prefix = %cfg.prefix, "opened chunk storage");
    Ok(Arc::new(OpendalChunkStorage::new(op, cfg.prefix.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_operator_fs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StorageConfig {
            backend: "fs".into(),
            root: dir.path().to_path_buf(),
            prefix: "chunks".into(),
        };
        assert!(build_operator(&cfg).is_ok(), "fs operator construction should succeed");
    }

    #[test]
    fn test_build_operator_unknown_backend() {
        let cfg = StorageConfig {
            backend: "s3".into(),
            ..Default::default()
        };
        let err = build_operator(&cfg).unwrap_err();
        assert!(err.to_string().contains("s3"));
    }

    #[tokio::test]
    async fn test_open_memory_storage() {
        let cfg = StorageConfig {
            backend: "memory".into(),
            ..Default::default()
        };
        let storage = open_storage(&cfg).unwrap();
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
