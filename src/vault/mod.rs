//! Encrypted vault files
//!
//! The session only needs two operations from a vault format: open a file
//! into [`VaultContent`] and encode content back into bytes. [`SealedVault`]
//! is the format kpass ships with:
//!
//! ```text
//! "KPASSDB1" | argon2id params (3 x u32 LE) | salt (32) | nonce (24) | ciphertext
//! ```
//!
//! The ciphertext is XChaCha20-Poly1305 over DEFLATE(bincode(content)).
//! Files are never rewritten in place: [`persist`] writes `<path>-new`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::crypto::{self, Cipher, CryptoError, KeyDeriver, KDF_PARAMS_LEN};
use crate::keyfile::KeyFile;
use crate::models::{KdfParams, SensitiveString, VaultContent};

/// Name of the placeholder root some formats decode to on a bad passphrase
pub const PLACEHOLDER_GROUP: &str = "NewDatabase";

/// Vault errors
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("wrong password")]
    WrongPassword,

    #[error("wrong password or empty database")]
    EmptyDatabase,

    #[error("Not a kpass vault: {0}")]
    Corrupt(String),

    #[error("Vault already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Master passphrase plus optional key file
#[derive(Debug, Clone)]
pub struct Credentials {
    passphrase: SensitiveString,
    key_file: Option<KeyFile>,
}

impl Credentials {
    pub fn new(passphrase: impl Into<SensitiveString>) -> Self {
        Self {
            passphrase: passphrase.into(),
            key_file: None,
        }
    }

    pub fn with_key_file(mut self, key_file: KeyFile) -> Self {
        self.key_file = Some(key_file);
        self
    }

    pub fn key_file(&self) -> Option<&KeyFile> {
        self.key_file.as_ref()
    }

    /// The secret actually fed to key derivation
    pub fn composite(&self) -> SensitiveString {
        compose(self.passphrase.expose(), self.key_file.as_ref())
    }
}

/// Mix key file material into a passphrase: `<passphrase>-<data>-<hash>`
pub fn compose(passphrase: &str, key_file: Option<&KeyFile>) -> SensitiveString {
    match key_file {
        Some(key_file) => SensitiveString::new(format!("{}-{}", passphrase, key_file.material())),
        None => SensitiveString::new(passphrase),
    }
}

/// A vault container format
pub trait Vault {
    /// Decode the vault at `path`
    fn open(&self, path: &Path, credentials: &Credentials) -> VaultResult<VaultContent>;

    /// Encode `content` into the bytes of a complete vault file
    fn encode(&self, content: &VaultContent, credentials: &Credentials) -> VaultResult<Vec<u8>>;
}

/// File marker
const MAGIC: &[u8; 8] = b"KPASSDB1";

/// Salt size
const SALT_LEN: usize = 32;

/// Passphrase-sealed vault file format
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedVault {
    kdf: KdfParams,
}

impl SealedVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `kdf` when encoding; opening always follows the file header
    pub fn with_kdf(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    fn header_len() -> usize {
        MAGIC.len() + KDF_PARAMS_LEN + SALT_LEN
    }
}

impl Vault for SealedVault {
    fn open(&self, path: &Path, credentials: &Credentials) -> VaultResult<VaultContent> {
        let bytes = fs::read(path)?;
        if bytes.len() < Self::header_len() || bytes[..MAGIC.len()] != MAGIC[..] {
            return Err(VaultError::Corrupt(path.display().to_string()));
        }

        let kdf = crypto::read_kdf_params(&bytes[MAGIC.len()..])
            .ok_or_else(|| VaultError::Corrupt(path.display().to_string()))?;
        let salt_start = MAGIC.len() + KDF_PARAMS_LEN;
        let salt = &bytes[salt_start..salt_start + SALT_LEN];
        let sealed = &bytes[Self::header_len()..];

        let key = KeyDeriver::derive_from_password(
            credentials.composite().expose().as_bytes(),
            salt,
            &kdf,
        )?
        .derive_keys()?;
        let compressed = Cipher::new(&key.encryption_key)
            .decrypt(sealed)
            .map_err(|e| match e {
                CryptoError::DecryptionFailed(_) => VaultError::WrongPassword,
                other => VaultError::Crypto(other),
            })?;

        let content: VaultContent = bincode::deserialize(&decompress(&compressed)?)?;
        match content.groups.first() {
            None => Err(VaultError::EmptyDatabase),
            Some(group) if group.name == PLACEHOLDER_GROUP => Err(VaultError::EmptyDatabase),
            Some(_) => Ok(content),
        }
    }

    fn encode(&self, content: &VaultContent, credentials: &Credentials) -> VaultResult<Vec<u8>> {
        let salt: [u8; SALT_LEN] = KeyDeriver::generate_salt();
        let key = KeyDeriver::derive_from_password(
            credentials.composite().expose().as_bytes(),
            &salt,
            &self.kdf,
        )?
        .derive_keys()?;

        let serialized = bincode::serialize(content)?;
        let sealed = Cipher::new(&key.encryption_key).encrypt(&compress(&serialized)?)?;

        let mut out = Vec::with_capacity(Self::header_len() + sealed.len());
        out.extend_from_slice(MAGIC);
        crypto::write_kdf_params(&mut out, &self.kdf);
        out.extend_from_slice(&salt);
        out.extend(sealed);
        Ok(out)
    }
}

/// Encode `content` and write it next to `source` as `<source>-new`
pub fn persist(
    vault: &dyn Vault,
    content: &VaultContent,
    credentials: &Credentials,
    source: &Path,
) -> VaultResult<PathBuf> {
    let bytes = vault.encode(content, credentials)?;
    let target = crypto::suffixed(source, "new");
    write_secure(&target, &bytes)?;
    log::info!("Wrote vault file: {}", target.display());
    Ok(target)
}

/// Create a brand new vault file at `path`; never overwrites
pub fn create(
    vault: &dyn Vault,
    content: &VaultContent,
    credentials: &Credentials,
    path: &Path,
) -> VaultResult<()> {
    if path.exists() {
        return Err(VaultError::AlreadyExists(path.to_path_buf()));
    }
    let bytes = vault.encode(content, credentials)?;
    write_secure(path, &bytes)?;
    Ok(())
}

/// Compress data using DEFLATE
fn compress(data: &[u8]) -> VaultResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress DEFLATE data
fn decompress(data: &[u8]) -> VaultResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Write file with secure permissions (owner read/write only)
fn write_secure(path: &Path, data: &[u8]) -> VaultResult<()> {
    fs::write(path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
