//! Cryptographic primitives for kpass
//!
//! # Security Design
//!
//! | Purpose | Algorithm | Key Size |
//! |---------|-----------|----------|
//! | Vault encryption | XChaCha20-Poly1305 | 256-bit |
//! | File encryption (`aes`) | AES-256-GCM | 256-bit |
//! | File encryption (`nacl`) | XChaCha20-Poly1305 | 256-bit |
//! | Key derivation | Argon2id | 256-bit output |
//! | Key expansion | HKDF-SHA256 | 256-bit |
//!
//! # Example
//!
//! ```
//! use kpass::crypto::{Algorithm, FileCipher, PasswordGenerator};
//! use kpass::models::KdfParams;
//!
//! // Generate a strong password
//! let password = PasswordGenerator::new(20).generate();
//! assert_eq!(password.chars().count(), 20);
//!
//! // Encrypt data with a passphrase
//! let light = KdfParams { memory_cost: 256, time_cost: 1, parallelism: 1 };
//! let cipher = FileCipher::new(Algorithm::Aes).with_kdf(light);
//! let sealed = cipher.encrypt(b"secret data", "passphrase").unwrap();
//! let opened = cipher.decrypt(&sealed, "passphrase").unwrap();
//! assert_eq!(opened, b"secret data");
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aes_gcm::Aes256Gcm;
use argon2::{Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{Rng, RngCore};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::KdfParams;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid nonce length")]
    InvalidNonceLength,

    #[error("Not an encrypted kpass file")]
    InvalidEnvelope,

    #[error("Unsupported cipher: {0} (expected aes or nacl)")]
    UnsupportedCipher(String),

    #[error("File was encrypted with {found}, not {expected}")]
    AlgorithmMismatch { expected: Algorithm, found: Algorithm },

    #[error("Invalid password spec '{0}', expected <length>[:<n><s>]")]
    InvalidPasswordSpec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// XChaCha20-Poly1305 nonce size
const XNONCE_LEN: usize = 24;

/// AES-GCM nonce size
const GCM_NONCE_LEN: usize = 12;

/// Serialized size of [`KdfParams`]
pub const KDF_PARAMS_LEN: usize = 12;

/// Master key derived from a passphrase
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive encryption keys
    pub fn derive_keys(&self) -> CryptoResult<DerivedKeys> {
        let hk = Hkdf::<Sha256>::new(None, &self.0);

        let mut encryption_key = [0u8; 32];
        hk.expand(b"kpass-encryption-key-v1", &mut encryption_key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(DerivedKeys { encryption_key })
    }
}

/// Keys derived from master key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    pub encryption_key: [u8; 32],
}

/// Vault encryption engine
pub struct Cipher {
    cipher: XChaCha20Poly1305,
}

impl Cipher {
    /// Create a new cipher with the given key
    pub fn new(key: &[u8; 32]) -> Self {
        let cipher = XChaCha20Poly1305::new(key.into());
        Self { cipher }
    }

    /// Encrypt plaintext, returning nonce + ciphertext
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        // Prepend nonce to ciphertext
        let mut result = Vec::with_capacity(XNONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypt ciphertext (expects nonce prepended)
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < XNONCE_LEN {
            return Err(CryptoError::InvalidNonceLength);
        }

        let (nonce_bytes, encrypted) = ciphertext.split_at(XNONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, encrypted)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// Key derivation using Argon2id
pub struct KeyDeriver;

impl KeyDeriver {
    /// Derive a master key from a password
    pub fn derive_from_password(
        password: &[u8],
        salt: &[u8],
        params: &KdfParams,
    ) -> CryptoResult<MasterKey> {
        let argon2_params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            Some(32),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params);

        let mut output = [0u8; 32];
        argon2
            .hash_password_into(password, salt, &mut output)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(MasterKey(output))
    }

    /// Fresh random salt
    pub fn generate_salt<const N: usize>() -> [u8; N] {
        let mut salt = [0u8; N];
        OsRng.fill_bytes(&mut salt);
        salt
    }
}

/// Append KDF parameters to a header (little endian u32s)
pub fn write_kdf_params(out: &mut Vec<u8>, params: &KdfParams) {
    out.extend_from_slice(&params.memory_cost.to_le_bytes());
    out.extend_from_slice(&params.time_cost.to_le_bytes());
    out.extend_from_slice(&params.parallelism.to_le_bytes());
}

/// Largest Argon2 memory cost accepted from a file header (1 GiB, in KiB)
pub const MAX_KDF_MEMORY_KIB: u32 = 1 << 20;

/// Largest Argon2 pass count accepted from a file header
pub const MAX_KDF_TIME_COST: u32 = 16;

/// Largest Argon2 lane count accepted from a file header
pub const MAX_KDF_PARALLELISM: u32 = 16;

/// Read KDF parameters written by [`write_kdf_params`]
///
/// Headers asking for more than [`MAX_KDF_MEMORY_KIB`], [`MAX_KDF_TIME_COST`]
/// or [`MAX_KDF_PARALLELISM`] are refused.
pub fn read_kdf_params(bytes: &[u8]) -> Option<KdfParams> {
    let word = |i: usize| -> Option<u32> {
        let chunk: [u8; 4] = bytes.get(i * 4..i * 4 + 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(chunk))
    };
    let params = KdfParams {
        memory_cost: word(0)?,
        time_cost: word(1)?,
        parallelism: word(2)?,
    };
    if params.memory_cost > MAX_KDF_MEMORY_KIB
        || params.time_cost > MAX_KDF_TIME_COST
        || params.parallelism > MAX_KDF_PARALLELISM
    {
        log::warn!("refusing KDF parameters from header: {:?}", params);
        return None;
    }
    Some(params)
}

/// Symmetric algorithm used for file encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// AES-256-GCM
    #[default]
    Aes,
    /// XChaCha20-Poly1305
    Nacl,
}

impl Algorithm {
    fn id(self) -> u8 {
        match self {
            Self::Aes => 1,
            Self::Nacl => 2,
        }
    }

    fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Aes),
            2 => Some(Self::Nacl),
            _ => None,
        }
    }

    fn nonce_len(self) -> usize {
        match self {
            Self::Aes => GCM_NONCE_LEN,
            Self::Nacl => XNONCE_LEN,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes => write!(f, "aes"),
            Self::Nacl => write!(f, "nacl"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aes" => Ok(Self::Aes),
            "nacl" => Ok(Self::Nacl),
            other => Err(CryptoError::UnsupportedCipher(other.to_string())),
        }
    }
}

/// Envelope marker for encrypted files
const FILE_MAGIC: &[u8; 8] = b"KPASSENC";

/// Salt size for file encryption
const FILE_SALT_LEN: usize = 16;

/// Passphrase based file encryption
///
/// Envelope: magic | algorithm id | Argon2id params | salt | nonce | ciphertext
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCipher {
    algorithm: Algorithm,
    kdf: KdfParams,
}

impl FileCipher {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            kdf: KdfParams::default(),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn encrypt(&self, plaintext: &[u8], passphrase: &str) -> CryptoResult<Vec<u8>> {
        let salt: [u8; FILE_SALT_LEN] = KeyDeriver::generate_salt();
        let key = KeyDeriver::derive_from_password(passphrase.as_bytes(), &salt, &self.kdf)?
            .derive_keys()?;

        let sealed = match self.algorithm {
            Algorithm::Nacl => Cipher::new(&key.encryption_key).encrypt(plaintext)?,
            Algorithm::Aes => {
                let cipher = Aes256Gcm::new_from_slice(&key.encryption_key)
                    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
                let mut out = Vec::with_capacity(GCM_NONCE_LEN + ciphertext.len());
                out.extend_from_slice(&nonce);
                out.extend(ciphertext);
                out
            }
        };

        let mut out = Vec::with_capacity(Self::header_len() + sealed.len());
        out.extend_from_slice(FILE_MAGIC);
        out.push(self.algorithm.id());
        write_kdf_params(&mut out, &self.kdf);
        out.extend_from_slice(&salt);
        out.extend(sealed);
        Ok(out)
    }

    fn header_len() -> usize {
        FILE_MAGIC.len() + 1 + KDF_PARAMS_LEN + FILE_SALT_LEN
    }

    pub fn decrypt(&self, envelope: &[u8], passphrase: &str) -> CryptoResult<Vec<u8>> {
        if envelope.len() < Self::header_len() || envelope[..FILE_MAGIC.len()] != FILE_MAGIC[..] {
            return Err(CryptoError::InvalidEnvelope);
        }

        let mut pos = FILE_MAGIC.len();
        let found = Algorithm::from_id(envelope[pos]).ok_or(CryptoError::InvalidEnvelope)?;
        if found != self.algorithm {
            return Err(CryptoError::AlgorithmMismatch {
                expected: self.algorithm,
                found,
            });
        }
        pos += 1;
        let kdf = read_kdf_params(&envelope[pos..]).ok_or(CryptoError::InvalidEnvelope)?;
        pos += KDF_PARAMS_LEN;
        let salt = &envelope[pos..pos + FILE_SALT_LEN];
        pos += FILE_SALT_LEN;
        let sealed = &envelope[pos..];

        if sealed.len() < found.nonce_len() {
            return Err(CryptoError::InvalidNonceLength);
        }

        let key = KeyDeriver::derive_from_password(passphrase.as_bytes(), salt, &kdf)?.derive_keys()?;
        match found {
            Algorithm::Nacl => Cipher::new(&key.encryption_key).decrypt(sealed),
            Algorithm::Aes => {
                let cipher = Aes256Gcm::new_from_slice(&key.encryption_key)
                    .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
                let (nonce, ciphertext) = sealed.split_at(GCM_NONCE_LEN);
                cipher
                    .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
                    .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
            }
        }
    }

    /// Encrypt `path` into `<path>-encrypted`, returning the output path
    pub fn encrypt_file(&self, path: &Path, passphrase: &str) -> CryptoResult<PathBuf> {
        let data = fs::read(path)?;
        let output = suffixed(path, "encrypted");
        fs::write(&output, self.encrypt(&data, passphrase)?)?;
        log::info!("encrypted {} to {}", path.display(), output.display());
        Ok(output)
    }

    /// Decrypt `path` into `<path>-decrypted`, returning the output path
    pub fn decrypt_file(&self, path: &Path, passphrase: &str) -> CryptoResult<PathBuf> {
        let data = fs::read(path)?;
        let output = suffixed(path, "decrypted");
        fs::write(&output, self.decrypt(&data, passphrase)?)?;
        log::info!("decrypted {} to {}", path.display(), output.display());
        Ok(output)
    }
}

/// `<path>-<suffix>` next to the original file
pub fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("-");
    name.push(suffix);
    PathBuf::from(name)
}

/// Secure password generator
#[derive(Debug, Clone)]
pub struct PasswordGenerator {
    length: usize,
    use_digits: bool,
    use_symbols: bool,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self {
            length: 20,
            use_digits: true,
            use_symbols: true,
        }
    }
}

impl PasswordGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// Parse a `<length>:[n][s]` spec; letters are always included,
    /// `n` adds digits and `s` adds symbols
    pub fn from_spec(spec: &str) -> CryptoResult<Self> {
        let (length, flags) = spec.split_once(':').unwrap_or((spec, ""));
        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| CryptoError::InvalidPasswordSpec(spec.to_string()))?;
        if length == 0 {
            return Err(CryptoError::InvalidPasswordSpec(spec.to_string()));
        }

        Ok(Self::new(length)
            .with_digits(flags.contains('n'))
            .with_symbols(flags.contains('s')))
    }

    pub fn with_digits(mut self, use_it: bool) -> Self {
        self.use_digits = use_it;
        self
    }

    pub fn with_symbols(mut self, use_it: bool) -> Self {
        self.use_symbols = use_it;
        self
    }

    pub fn generate(&self) -> String {
        const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
        const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const DIGITS: &str = "0123456789";
        const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

        let mut charset = format!("{}{}", LOWERCASE, UPPERCASE);
        if self.use_digits {
            charset.push_str(DIGITS);
        }
        if self.use_symbols {
            charset.push_str(SYMBOLS);
        }

        let charset: Vec<char> = charset.chars().collect();

        let mut rng = OsRng;
        (0..self.length)
            .map(|_| charset[rng.gen_range(0..charset.len())])
            .collect()
    }
}
