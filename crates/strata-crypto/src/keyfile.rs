//! On-disk repository key file
//!
//! ```json
//! { "version": 1, "key_encryption_key": "<base64>", "address_key": "<base64>" }
//! ```
//!
//! Written with mode 0600 on unix. Losing this file loses the repository.

use std::path::Path;

use serde::{Deserialize, Serialize};

use strata_core::{StrataError, StrataResult};

use crate::keys::{AddressKey, KeyEncryptionKey};
use crate::KEY_SIZE;

const KEY_FILE_VERSION: u32 = 1;

/// The two repository-wide secrets
#[derive(Debug, Clone)]
pub struct RepositoryKeys {
    pub kek: KeyEncryptionKey,
    pub address_key: AddressKey,
}

#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    key_encryption_key: String,
    address_key: String,
}

impl RepositoryKeys {
    pub fn generate() -> Self {
        Self {
            kek: KeyEncryptionKey::generate(),
            address_key: AddressKey::generate(),
        }
    }

    pub fn to_json(&self) -> StrataResult<String> {
        let file = KeyFile {
            version: KEY_FILE_VERSION,
            key_encryption_key: base64_encode(self.kek.as_bytes()),
            address_key: base64_encode(self.address_key.as_bytes()),
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| StrataError::Config(format!("key file serialization: {e}")))
    }

    pub fn from_json(json: &str) -> StrataResult<Self> {
        let file: KeyFile = serde_json::from_str(json)
            .map_err(|e| StrataError::Config(format!("key file deserialization: {e}")))?;
        if file.version != KEY_FILE_VERSION {
            return Err(StrataError::Config(format!(
                "unsupported key file version {}",
                file.version
            )));
        }
        Ok(Self {
            kek: KeyEncryptionKey::from_bytes(decode_key("key_encryption_key", &file.key_encryption_key)?),
            address_key: AddressKey::from_bytes(decode_key("address_key", &file.address_key)?),
        })
    }

    /// Write the key file, refusing to replace an existing one.
    pub fn save(&self, path: &Path) -> StrataResult<()> {
        if path.exists() {
            return Err(StrataError::Config(format!(
                "key file already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(path = %path.display(), "wrote repository key file");
        Ok(())
    }

    pub fn load(path: &Path) -> StrataResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Config(format!("reading key file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn decode_key(field: &str, s: &str) -> StrataResult<[u8; KEY_SIZE]> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    let bytes = STANDARD
        .decode(s)
        .map_err(|e| StrataError::Config(format!("{field}: base64 decode: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        StrataError::Config(format!(
            "{field}: expected {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}
