//! Core data models for kpass
//! All sensitive data implements Zeroize for secure memory cleanup

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Attribute keys with a well-known meaning
pub mod keys {
    pub const TITLE: &str = "Title";
    pub const USERNAME: &str = "UserName";
    pub const PASSWORD: &str = "Password";
    pub const URL: &str = "URL";
    pub const NOTES: &str = "Notes";
    pub const LOGIN: &str = "Login";
    pub const EMAIL: &str = "Email";
}

/// Title given to saved records that were built without one
pub const DEFAULT_TITLE: &str = "Record";

/// Root group name for vaults kpass creates
pub const DEFAULT_GROUP: &str = "kpass";

/// A sensitive string that zeroes memory on drop
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveString(String);

impl SensitiveString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED {} chars]", self.0.len())
    }
}

impl From<String> for SensitiveString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SensitiveString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One attribute of an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub value: SensitiveString,
    /// Protected fields are kept encrypted in memory by real vault formats
    /// and are never echoed to the terminal.
    pub protected: bool,
}

/// A decoded credential record
///
/// Entries are values: editing one means building a replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: Uuid,
    pub tags: String,
    pub fields: Vec<Field>,
    pub created_at: DateTime<Utc>,
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

impl Entry {
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            tags: String::new(),
            fields: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set a plain attribute, replacing any value stored under the same key
    pub fn with_field(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(key.into(), value.into(), false)
    }

    /// Set a protected attribute
    pub fn with_protected(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(key.into(), value.into(), true)
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    fn with_value(mut self, key: String, value: String, protected: bool) -> Self {
        let value = SensitiveString::new(value);
        match self.fields.iter_mut().find(|f| f.key.eq_ignore_ascii_case(&key)) {
            Some(field) => {
                field.key = key;
                field.value = value;
                field.protected = protected;
            }
            None => self.fields.push(Field {
                key,
                value,
                protected,
            }),
        }
        self
    }

    /// Look up an attribute; key comparison ignores ASCII case
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key.eq_ignore_ascii_case(key))
            .map(|f| f.value.expose())
    }

    /// Attribute value or the empty string
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.value(keys::TITLE)
    }

    pub fn password(&self) -> &str {
        self.value(keys::PASSWORD)
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.protected && f.key.eq_ignore_ascii_case(key))
    }
}

/// A named group of entries, possibly nested
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub entries: Vec<Entry>,
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// All entries of this group, then those of each subgroup, depth first
    pub fn flatten(&self) -> Vec<&Entry> {
        let mut out: Vec<&Entry> = self.entries.iter().collect();
        for group in &self.groups {
            out.extend(group.flatten());
        }
        out
    }
}

/// Decoded vault payload: the top-level groups of the database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultContent {
    pub groups: Vec<Group>,
}

impl VaultContent {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

/// Key derivation function parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_cost: u32, // in KiB
    pub time_cost: u32,   // iterations
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Normalize an attribute key the way saved records store it
///
/// `password` (any case) becomes the protected `Password` field, `username`
/// becomes `UserName`, anything else gets its first letter upper-cased.
pub fn normalize_key(key: &str) -> (String, bool) {
    match key.to_lowercase().as_str() {
        "password" => (keys::PASSWORD.to_string(), true),
        "username" => (keys::USERNAME.to_string(), false),
        _ => {
            let mut chars = key.chars();
            let titled = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            (titled, false)
        }
    }
}

/// A record under construction by the `add <key>` protocol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRecord {
    values: BTreeMap<String, String>,
}

impl PendingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build the entry to persist: keys normalized, title defaulted
    pub fn into_entry(mut self) -> Entry {
        let mut entry = Entry::new();
        for (key, value) in std::mem::take(&mut self.values) {
            let (key, protected) = normalize_key(&key);
            entry = if protected {
                entry.with_protected(key, value)
            } else {
                entry.with_field(key, value)
            };
        }
        if entry.get(keys::TITLE).is_none() {
            entry = entry.with_field(keys::TITLE, DEFAULT_TITLE);
        }
        entry
    }
}

impl Drop for PendingRecord {
    fn drop(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_string_debug() {
        let secret = SensitiveString::new("my_password");
        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("my_password"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_entry_lookup_ignores_case() {
        let entry = Entry::new()
            .with_field("EMail", "me@gmail.com")
            .with_protected("Password", "secret");

        assert_eq!(entry.get("email"), Some("me@gmail.com"));
        assert_eq!(entry.get("Email"), Some("me@gmail.com"));
        assert_eq!(entry.password(), "secret");
        assert!(entry.is_protected("password"));
        assert_eq!(entry.get("notes"), None);
        assert_eq!(entry.value("notes"), "");
    }

    #[test]
    fn test_with_field_replaces_existing_key() {
        let entry = Entry::new().with_field("Title", "a").with_field("title", "b");
        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.title(), "b");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("PassWord"), ("Password".to_string(), true));
        assert_eq!(normalize_key("username"), ("UserName".to_string(), false));
        assert_eq!(normalize_key("notes"), ("Notes".to_string(), false));
        assert_eq!(normalize_key("url"), ("Url".to_string(), false));
        assert_eq!(normalize_key("URL"), ("URL".to_string(), false));
    }

    #[test]
    fn test_pending_record_defaults_title() {
        let mut rec = PendingRecord::new();
        rec.set("username", "u");
        rec.set("password", "p");

        let entry = rec.into_entry();
        assert_eq!(entry.title(), DEFAULT_TITLE);
        assert_eq!(entry.get("UserName"), Some("u"));
        assert_eq!(entry.password(), "p");
        assert!(entry.is_protected("Password"));
    }

    #[test]
    fn test_pending_record_keeps_lowercase_title() {
        let mut rec = PendingRecord::new();
        rec.set("title", "GitHub");

        let entry = rec.into_entry();
        assert_eq!(entry.title(), "GitHub");
        assert_eq!(entry.fields.len(), 1);
    }

    #[test]
    fn test_group_flatten_order() {
        let mut sub = Group::new("sub");
        sub.entries.push(Entry::new().with_field("Title", "c"));
        let mut top = Group::new("top");
        top.entries.push(Entry::new().with_field("Title", "a"));
        top.entries.push(Entry::new().with_field("Title", "b"));
        top.groups.push(sub);

        let titles: Vec<&str> = top.flatten().iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }
}
