//! Key types, random generation, and AES key wrapping (RFC 3394)

use aes::cipher::generic_array::GenericArray;
use aes_kw::KekAes256;
use rand::RngCore;
use zeroize::Zeroize;

use strata_core::{StrataError, StrataResult};

use crate::{IV_SIZE, KEY_SIZE, WRAPPED_KEY_SIZE};

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }

            /// Fresh key from the thread-local CSPRNG
            pub fn generate() -> Self {
                let mut bytes = [0u8; KEY_SIZE];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self { bytes }
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Repository-wide key that wraps every per-chunk content key. Zeroized on drop.
    KeyEncryptionKey
);

secret_key!(
    /// Repository-wide HMAC key that turns plaintext into chunk addresses. Zeroized on drop.
    AddressKey
);

secret_key!(
    /// Per-chunk random AES-256 key. Zeroized on drop.
    ContentKey
);

/// Generate a random per-chunk content key.
pub fn generate_content_key() -> ContentKey {
    ContentKey::generate()
}

/// Generate a random CBC initialization vector.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Wrap a content key with the key-encryption key.
///
/// Output is always 40 bytes: the 32-byte key plus the 8-byte integrity block.
pub fn wrap_key(kek: &KeyEncryptionKey, key: &ContentKey) -> StrataResult<[u8; WRAPPED_KEY_SIZE]> {
    let wrapper = KekAes256::new(GenericArray::from_slice(kek.as_bytes()));
    let mut out = [0u8; WRAPPED_KEY_SIZE];
    wrapper
        .wrap(key.as_bytes(), &mut out)
        .map_err(|e| StrataError::Decrypt(format!("key wrapping failed: {e}")))?;
    Ok(out)
}

/// Unwrap a content key. Fails with `Unwrap` under the wrong key-encryption key.
pub fn unwrap_key(kek: &KeyEncryptionKey, wrapped: &[u8]) -> StrataResult<ContentKey> {
    if wrapped.len() != WRAPPED_KEY_SIZE {
        return Err(StrataError::Unwrap(format!(
            "wrapped key has wrong size: {} bytes (expected {WRAPPED_KEY_SIZE})",
            wrapped.len()
        )));
    }

    let wrapper = KekAes256::new(GenericArray::from_slice(kek.as_bytes()));
    let mut key_bytes = [0u8; KEY_SIZE];
    if let Err(e) = wrapper.unwrap(wrapped, &mut key_bytes) {
        key_bytes.zeroize();
        return Err(StrataError::Unwrap(format!(
            "invalid key-encryption key or corrupted wrapped key: {e}"
        )));
    }

    Ok(ContentKey::from_bytes(key_bytes))
}
