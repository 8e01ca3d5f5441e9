use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{StrataError, StrataResult};

/// Smallest chunk size the tree writer accepts. The index header plus two
/// maximal index records must fit in one chunk, otherwise index levels stop
/// shrinking and the tree never converges on a single root.
pub const MIN_FIXED_CHUNK_SIZE: usize = 128;

/// Largest chunk the tree writer accepts (32 MiB). Readers refuse to
/// decompress anything bigger, so larger chunks could never be read back.
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Rolling thresholds must fall in `1..MAX_ROLLING_THRESHOLD`; the window
/// hash is below 2^24, so larger thresholds never cut.
pub const MAX_ROLLING_THRESHOLD: u32 = 24;

/// Top-level configuration (loaded from strata.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub compression: CompressionConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind: "fs" or "memory"
    pub backend: String,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Object key prefix under which chunks are stored
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "fs".into(),
            root: PathBuf::from("./strata-repo"),
            prefix: "chunks".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// "rolling" (content-defined) or "fixed"
    pub strategy: String,
    /// Chunk size for the fixed strategy
    pub fixed_size: usize,
    /// Rolling strategy: no boundary before this many bytes
    pub min_size: usize,
    /// Rolling strategy: forced boundary at this many bytes
    pub max_size: usize,
    /// Rolling strategy: required trailing zero count of the window hash
    pub threshold: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: "rolling".into(),
            fixed_size: 64 * 1024,
            min_size: 512,
            max_size: 128 * 1024,
            threshold: 13,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// zstd compression level
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// JSON file holding the key-encryption key and address key
    pub key_file: PathBuf,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_file: PathBuf::from("./strata-keys.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl StrataConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> StrataResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| StrataError::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> StrataResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StrataError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> StrataResult<String> {
        toml::to_string_pretty(self).map_err(|e| StrataError::Config(e.to_string()))
    }

    /// Reject parameter combinations the chunkers or backends cannot honor.
    pub fn validate(&self) -> StrataResult<()> {
        let c = &self.chunking;
        match c.strategy.as_str() {
            "fixed" => {
                if !(MIN_FIXED_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&c.fixed_size) {
                    return Err(StrataError::Config(format!(
                        "chunking.fixed_size must be in {MIN_FIXED_CHUNK_SIZE}..={MAX_CHUNK_SIZE}, got {}",
                        c.fixed_size
                    )));
                }
            }
            "rolling" => {
                if c.min_size < MIN_FIXED_CHUNK_SIZE || c.min_size >= c.max_size {
                    return Err(StrataError::Config(format!(
                        "chunking: need {MIN_FIXED_CHUNK_SIZE} <= min_size < max_size (got {} / {})",
                        c.min_size, c.max_size
                    )));
                }
                if c.max_size > MAX_CHUNK_SIZE {
                    return Err(StrataError::Config(format!(
                        "chunking.max_size must be at most {MAX_CHUNK_SIZE}, got {}",
                        c.max_size
                    )));
                }
                if c.threshold == 0 || c.threshold >= MAX_ROLLING_THRESHOLD {
                    return Err(StrataError::Config(format!(
                        "chunking.threshold must be in 1..{MAX_ROLLING_THRESHOLD}, got {}",
                        c.threshold
                    )));
                }
            }
            other => {
                return Err(StrataError::Config(format!(
                    "unknown chunking strategy: {other}"
                )))
            }
        }

        match self.storage.backend.as_str() {
            "fs" | "memory" => {}
            other => {
                return Err(StrataError::Config(format!(
                    "unknown storage backend: {other}"
                )))
            }
        }

        match self.log.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(StrataError::Config(format!("unknown log format: {other}"))),
        }
    }
}
