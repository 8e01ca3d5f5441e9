//! Repository facade: one storage backend, one key pair, one chunking strategy

use std::sync::Arc;

use strata_chunks::{ChunkingStrategy, Compressor, NoCompression, ZstdCompressor};
use strata_core::config::StrataConfig;
use strata_core::StrataResult;
use strata_crypto::{ChunkEncryptor, RepositoryKeys};
use strata_storage::{open_storage, ChunkStorage};

use crate::collection::Collection;
use crate::dictionary::VersionedDictionary;
use crate::stream::StreamStorage;

#[derive(Debug, Clone)]
pub struct Repository {
    storage: Arc<dyn ChunkStorage>,
    encryptor: Arc<ChunkEncryptor>,
    strategy: ChunkingStrategy,
}

impl Repository {
    /// Open the repository described by `config`, loading its key file.
    pub fn open(config: &StrataConfig) -> StrataResult<Self> {
        config.validate()?;
        let keys = RepositoryKeys::load(&config.keys.key_file)?;
        let storage = open_storage(&config.storage)?;
        let compressor: Arc<dyn Compressor> = if config.compression.enabled {
            Arc::new(ZstdCompressor {
                level: config.compression.level,
            })
        } else {
            Arc::new(NoCompression)
        };
        let strategy = ChunkingStrategy::from_config(&config.chunking)?;

        tracing::debug!(
            backend = %config.storage.backend,
            strategy = ?strategy,
            compression = config.compression.enabled,
            "opened repository"
        );
        Self::from_parts(storage, keys, compressor, strategy)
    }

    pub fn from_parts(
        storage: Arc<dyn ChunkStorage>,
        keys: RepositoryKeys,
        compressor: Arc<dyn Compressor>,
        strategy: ChunkingStrategy,
    ) -> StrataResult<Self> {
        strategy.validate()?;
        let encryptor = ChunkEncryptor::with_compressor(keys.kek, &keys.address_key, compressor)?;
        Ok(Self {
            storage,
            encryptor: Arc::new(encryptor),
            strategy,
        })
    }

    pub fn storage(&self) -> &Arc<dyn ChunkStorage> {
        &self.storage
    }

    pub fn encryptor(&self) -> &Arc<ChunkEncryptor> {
        &self.encryptor
    }

    pub fn chunking(&self) -> ChunkingStrategy {
        self.strategy
    }

    pub fn streams(&self) -> StreamStorage {
        StreamStorage::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.encryptor),
            self.strategy,
        )
    }

    pub fn dictionary(&self) -> VersionedDictionary {
        VersionedDictionary::new(Arc::clone(&self.storage), Arc::clone(&self.encryptor))
    }

    pub fn collection(&self, namespace: impl Into<Vec<u8>>, name: impl Into<Vec<u8>>) -> Collection {
        Collection::new(self.dictionary(), namespace, name)
    }
}
