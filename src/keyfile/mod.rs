//! KeePass XML key files
//!
//! A key file augments the master passphrase:
//!
//! ```xml
//! <KeyFile>
//!     <Meta><Version>2.0</Version></Meta>
//!     <Key><Data Hash="A1B2C3D4">0123ABCD 4567EF01 ...</Data></Key>
//! </KeyFile>
//! ```
//!
//! Version 2 files carry a `Hash` attribute holding the first four bytes of
//! the SHA-256 digest of the hex-decoded data; it is verified on read.

use std::fs;
use std::path::Path;

use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Key file errors
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed key file: {0}")]
    Xml(String),

    #[error("Key file data is not valid hex")]
    InvalidData,

    #[error("Key file hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },
}

pub type KeyFileResult<T> = Result<T, KeyFileError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "KeyFile")]
pub struct KeyFile {
    #[serde(rename = "Meta")]
    pub meta: Meta,
    #[serde(rename = "Key")]
    pub key: Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "Version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "Data")]
    pub data: Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    #[serde(rename = "@Hash", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl KeyFile {
    /// Parse and verify the key file at `path`
    pub fn read(path: impl AsRef<Path>) -> KeyFileResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(xml: &str) -> KeyFileResult<Self> {
        let mut key_file: KeyFile =
            quick_xml::de::from_str(xml).map_err(|e| KeyFileError::Xml(e.to_string()))?;
        key_file.key.data.value = normalize(&key_file.key.data.value);
        key_file.verify()?;
        Ok(key_file)
    }

    /// Create a version 2 key file around 32 random bytes
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        let hex = hex_encode(&bytes);
        let value = hex
            .as_bytes()
            .chunks(8)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            meta: Meta {
                version: "2.0".to_string(),
            },
            key: Key {
                data: Data {
                    hash: Some(digest_prefix(&bytes)),
                    value,
                },
            },
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> KeyFileResult<()> {
        let xml = quick_xml::se::to_string(self).map_err(|e| KeyFileError::Xml(e.to_string()))?;
        fs::write(path, xml)?;
        Ok(())
    }

    pub fn value(&self) -> &str {
        &self.key.data.value
    }

    pub fn hash(&self) -> &str {
        self.key.data.hash.as_deref().unwrap_or_default()
    }

    /// Material mixed into the passphrase: `<data>-<hash>`
    pub fn material(&self) -> String {
        format!("{}-{}", self.value(), self.hash())
    }

    fn verify(&self) -> KeyFileResult<()> {
        let Some(expected) = self.key.data.hash.as_deref() else {
            return Ok(());
        };
        if !self.meta.version.trim().starts_with('2') {
            return Ok(());
        }

        let compact: String = self.value().split_whitespace().collect();
        let bytes = hex_decode(&compact).ok_or(KeyFileError::InvalidData)?;
        let actual = digest_prefix(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(KeyFileError::HashMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

/// Drop newlines, collapse blank runs and trim
fn normalize(value: &str) -> String {
    let joined = value.replace(['\r', '\n'], "");
    match Regex::new(r"[ \t\u{a0}]+") {
        Ok(blanks) => blanks.replace_all(&joined, " ").trim().to_string(),
        Err(_) => joined.trim().to_string(),
    }
}

fn digest_prefix(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest[..4])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
