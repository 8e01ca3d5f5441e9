//! Chunk envelope encryption, addressing, and verification
//!
//! Encrypted chunk format (binary):
//! ```text
//! [16 bytes: IV][40 bytes: wrapped content key][1 byte: compression tag]
//! [N bytes: AES-256-CBC ciphertext, PKCS7 padded][32 bytes: SHA-256 checksum]
//! ```
//!
//! The checksum covers every byte before it and is verified before any
//! decryption is attempted. The compression tag sits outside the ciphertext
//! but inside the checksum.
//!
//! Content-addressed chunks are named `HMAC-SHA256(address_key, plaintext)`;
//! after decryption the plaintext is re-hashed and compared with the address
//! it was fetched under. Key-addressed chunks (dictionary entries) are named
//! `HMAC-SHA256(address_key, lookup_key)` instead.

use std::fmt;
use std::sync::Arc;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use strata_chunks::compress::{CompressionTag, Compressor, NoCompression};
use strata_core::{Address, EncryptedChunk, StrataError, StrataResult, ADDRESS_SIZE};

use crate::keys::{generate_content_key, generate_iv, unwrap_key, wrap_key, AddressKey, ContentKey, KeyEncryptionKey};
use crate::{BLOCK_SIZE, CHECKSUM_SIZE, IV_SIZE, WRAPPED_KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Offset of the compression tag byte
const TAG_OFFSET: usize = IV_SIZE + WRAPPED_KEY_SIZE;

/// Bytes before the ciphertext
pub const HEADER_SIZE: usize = TAG_OFFSET + 1;

/// Smallest well-formed envelope: header, one cipher block, checksum
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + BLOCK_SIZE + CHECKSUM_SIZE;

/// Borrowed view of a checksum-verified envelope
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub iv: &'a [u8],
    pub wrapped_key: &'a [u8],
    pub compression: CompressionTag,
    pub ciphertext: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split and checksum-verify raw envelope bytes stored under `address`.
    pub fn parse(address: &Address, bytes: &'a [u8]) -> StrataResult<Self> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(StrataError::Format(format!(
                "envelope for {address} too short: {} bytes (minimum {MIN_ENVELOPE_SIZE})",
                bytes.len()
            )));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
        let actual = Sha256::digest(body);
        if actual.as_slice() != checksum {
            tracing::warn!(address = %address, "chunk envelope checksum mismatch");
            return Err(StrataError::Checksum { address: *address });
        }

        let ciphertext = &body[HEADER_SIZE..];
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(StrataError::Format(format!(
                "ciphertext for {address} is {} bytes, not a multiple of {BLOCK_SIZE}",
                ciphertext.len()
            )));
        }

        Ok(Self {
            iv: &body[..IV_SIZE],
            wrapped_key: &body[IV_SIZE..TAG_OFFSET],
            compression: CompressionTag::from_byte(body[TAG_OFFSET])?,
            ciphertext,
        })
    }
}

/// Encrypts, decrypts, and addresses single chunks.
///
/// Holds the repository-wide key-encryption key and a keyed HMAC; knows
/// nothing about streams or trees.
pub struct ChunkEncryptor {
    kek: KeyEncryptionKey,
    mac: HmacSha256,
    compressor: Arc<dyn Compressor>,
}

impl fmt::Debug for ChunkEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkEncryptor")
            .field("kek", &self.kek)
            .field("mac", &"[REDACTED]")
            .finish()
    }
}

impl ChunkEncryptor {
    /// Encryptor without compression
    pub fn new(kek: KeyEncryptionKey, address_key: &AddressKey) -> StrataResult<Self> {
        Self::with_compressor(kek, address_key, Arc::new(NoCompression))
    }

    pub fn with_compressor(
        kek: KeyEncryptionKey,
        address_key: &AddressKey,
        compressor: Arc<dyn Compressor>,
    ) -> StrataResult<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(address_key.as_bytes())
            .map_err(|e| StrataError::Config(format!("invalid address key: {e}")))?;
        Ok(Self {
            kek,
            mac,
            compressor,
        })
    }

    fn keyed_hash(&self, data: &[u8]) -> Address {
        let mut mac = self.mac.clone();
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest);
        Address::from_bytes(bytes)
    }

    /// Address of a content-addressed chunk
    pub fn content_address(&self, plaintext: &[u8]) -> Address {
        self.keyed_hash(plaintext)
    }

    /// Address of a key-addressed chunk
    pub fn key_address(&self, lookup_key: &[u8]) -> Address {
        self.keyed_hash(lookup_key)
    }

    /// Encrypt a content-addressed chunk with a fresh key and IV.
    pub fn encrypt_content(&self, plaintext: &[u8]) -> StrataResult<EncryptedChunk> {
        let key = generate_content_key();
        self.encrypt(plaintext, &generate_iv(), &key)
    }

    /// Encrypt a key-addressed chunk with a fresh key and IV.
    pub fn encrypt_keyed(&self, lookup_key: &[u8], plaintext: &[u8]) -> StrataResult<EncryptedChunk> {
        let key = generate_content_key();
        let address = self.key_address(lookup_key);
        self.seal(address, plaintext, &generate_iv(), &key)
    }

    /// Encrypt a content-addressed chunk with caller-supplied IV and content key.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        iv: &[u8; IV_SIZE],
        content_key: &ContentKey,
    ) -> StrataResult<EncryptedChunk> {
        let address = self.content_address(plaintext);
        self.seal(address, plaintext, iv, content_key)
    }

    fn seal(
        &self,
        address: Address,
        plaintext: &[u8],
        iv: &[u8; IV_SIZE],
        content_key: &ContentKey,
    ) -> StrataResult<EncryptedChunk> {
        let (payload, tag) = self.compress(plaintext)?;
        let wrapped = wrap_key(&self.kek, content_key)?;
        let ciphertext = Aes256CbcEnc::new(content_key.as_bytes().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&payload);

        let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len() + CHECKSUM_SIZE);
        envelope.extend_from_slice(iv);
        envelope.extend_from_slice(&wrapped);
        envelope.push(tag.as_byte());
        envelope.extend_from_slice(&ciphertext);
        let checksum = Sha256::digest(&envelope);
        envelope.extend_from_slice(&checksum);

        Ok(EncryptedChunk::new(address, envelope))
    }

    /// Compress unless it saves less than 10% of the plaintext size.
    fn compress(&self, plaintext: &[u8]) -> StrataResult<(Vec<u8>, CompressionTag)> {
        let (compressed, tag) = self.compressor.compress(plaintext)?;
        let worthwhile = (compressed.len() as u64) * 10 <= (plaintext.len() as u64) * 9;
        if tag != CompressionTag::None && worthwhile {
            Ok((compressed, tag))
        } else {
            Ok((plaintext.to_vec(), CompressionTag::None))
        }
    }

    /// Verify the checksum and decrypt, without checking the address.
    pub fn decrypt(&self, chunk: &EncryptedChunk) -> StrataResult<Vec<u8>> {
        let envelope = Envelope::parse(&chunk.address, &chunk.envelope)?;
        let content_key = unwrap_key(&self.kek, envelope.wrapped_key)?;

        // PKCS7 adds 1..=16 bytes, so the plaintext is at most len - 1
        let upper_bound = envelope.ciphertext.len() - 1;
        let iv: &[u8; IV_SIZE] = envelope
            .iv
            .try_into()
            .map_err(|_| StrataError::Format("IV has wrong length".into()))?;
        let payload = Aes256CbcDec::new(content_key.as_bytes().into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(envelope.ciphertext)
            .map_err(|_| {
                StrataError::Decrypt(format!("invalid padding in chunk {}", chunk.address))
            })?;
        debug_assert!(payload.len() <= upper_bound);

        self.compressor
            .decompress(envelope.compression, &payload, upper_bound)
    }

    /// Decrypt a content-addressed chunk and check that its plaintext hashes
    /// to the address it was stored under.
    pub fn decrypt_content(&self, chunk: &EncryptedChunk) -> StrataResult<Vec<u8>> {
        let plaintext = self.decrypt(chunk)?;
        let actual = self.content_address(&plaintext);
        if actual != chunk.address {
            tracing::warn!(expected = %chunk.address, actual = %actual, "chunk content does not match its address");
            return Err(StrataError::AddressMismatch {
                expected: chunk.address,
                actual,
            });
        }
        Ok(plaintext)
    }

    /// Decrypt a key-addressed chunk fetched for `lookup_key`.
    pub fn decrypt_keyed(&self, lookup_key: &[u8], chunk: &EncryptedChunk) -> StrataResult<Vec<u8>> {
        let expected = self.key_address(lookup_key);
        if expected != chunk.address {
            return Err(StrataError::AddressMismatch {
                expected,
                actual: chunk.address,
            });
        }
        self.decrypt(chunk)
    }
}
