//! strata-crypto: per-chunk encryption and content addressing
//!
//! Pipeline: plaintext → HMAC-SHA256 address → compress → AES-256-CBC → checksum → store
//!
//! Key hierarchy:
//! ```text
//! Key-Encryption Key (256-bit, repository-wide)
//!   └── Content Key (per-chunk, 256-bit random, AES key-wrapped into the envelope)
//!       └── AES-256-CBC + PKCS7 (key=content_key, iv=random_128bit)
//! Address Key (256-bit, repository-wide)
//!   └── HMAC-SHA256(address_key, plaintext | lookup key) → chunk address
//! ```

pub mod envelope;
pub mod keyfile;
pub mod keys;

pub use envelope::{ChunkEncryptor, Envelope};
pub use keyfile::RepositoryKeys;
pub use keys::{generate_content_key, generate_iv, unwrap_key, wrap_key, AddressKey, ContentKey, KeyEncryptionKey};

/// Size of every key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-CBC initialization vector
pub const IV_SIZE: usize = 16;

/// Size of a 32-byte key after RFC 3394 key wrapping
pub const WRAPPED_KEY_SIZE: usize = 40;

/// Size of the trailing SHA-256 checksum
pub const CHECKSUM_SIZE: usize = 32;

/// AES block size; CBC ciphertext is always a non-zero multiple of it
pub const BLOCK_SIZE: usize = 16;
