//! kpass - interactive shell for an encrypted password vault
//!
//! # Features
//! - **REPL session**: search, copy, add and remove records from one prompt
//! - **Masked input**: passwords are typed twice and never echoed
//! - **Idle timeout**: the session exits after a period of inactivity
//! - **Key files**: optional XML key file mixed into the passphrase
//! - **File encryption**: AES-256-GCM or XChaCha20-Poly1305 with Argon2id
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            CLI                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session (InputReader → CommandRouter → controller)         │
//! ├──────────────────┬──────────────────┬───────────────────────┤
//! │   RecordStore    │    Clipboard     │    FileCipher         │
//! ├──────────────────┴──────────────────┴───────────────────────┤
//! │           Vault (sealed file) + KeyFile + Models            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       Crypto Layer                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//! ```bash
//! # Create a vault, then open it
//! kpass --kdbx ~/vault.kdbx --init
//! kpass --kdbx ~/vault.kdbx --interval 120
//!
//! # Generate a 16 character password with digits and symbols
//! kpass --pwd 16:ns
//! ```

#![warn(clippy::all)]

use std::path::PathBuf;
use std::time::Duration;

pub mod cli;
pub mod clipboard;
pub mod crypto;
pub mod keyfile;
pub mod models;
pub mod session;
pub mod store;
pub mod vault;

// Re-exports for convenience
pub use crypto::{Algorithm, FileCipher, PasswordGenerator};
pub use models::{Entry, PendingRecord, SensitiveString, VaultContent};
pub use session::{InputReader, Session, SessionEnd};
pub use store::RecordStore;
pub use vault::{Credentials, SealedVault, Vault, VaultError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default vault file
pub fn default_vault_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".keepass.kdbx")
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Vault file
    pub vault_path: PathBuf,
    /// Optional key file
    pub key_file: Option<PathBuf>,
    /// Idle timeout of the interactive session
    pub timeout: Duration,
    /// Cipher for file encryption
    pub cipher: Algorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            key_file: None,
            timeout: Duration::from_secs(30),
            cipher: Algorithm::default(),
        }
    }
}

/// Error type for the library
#[derive(Debug, thiserror::Error)]
pub enum KpassError {
    /// Vault errors
    #[error("{0}")]
    Vault(#[from] vault::VaultError),

    /// Session errors
    #[error("{0}")]
    Session(#[from] session::SessionError),

    /// Crypto errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    /// Key file errors
    #[error("Key file error: {0}")]
    KeyFile(#[from] keyfile::KeyFileError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Terminal prompt failed or was rejected
    #[error("{0}")]
    Prompt(String),
}

/// Result type for the library
pub type KpassResult<T> = Result<T, KpassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cipher, Algorithm::Aes);
        assert!(config.key_file.is_none());
    }

    #[test]
    fn test_default_vault_path() {
        let path = default_vault_path();
        assert!(path.ends_with(".keepass.kdbx"));
    }

    #[test]
    fn test_wrong_password_message() {
        let err = KpassError::from(session::SessionError::from(VaultError::WrongPassword));
        assert_eq!(err.to_string(), "Vault error: wrong password");
    }
}
