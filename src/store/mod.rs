//! In-memory index of decoded vault entries
//!
//! Entries are addressed by a session-local id: their position in the
//! flattened vault (top-level entries first, then each subgroup depth
//! first). Ids are dense. Removing an entry shifts every later id down by
//! one, exactly as if the store had been rebuilt from the rewritten vault.

use regex::Regex;
use uuid::Uuid;

use crate::models::{keys, Entry, Group, VaultContent, DEFAULT_GROUP};

/// Attributes a search query is matched against as a regular expression
pub const REGEX_KEYS: [&str; 5] = [
    keys::USERNAME,
    keys::URL,
    keys::NOTES,
    keys::LOGIN,
    keys::EMAIL,
];

/// Session record store
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    entries: Vec<Entry>,
    groups: Vec<String>,
}

impl RecordStore {
    /// Flatten decoded vault content; ids follow traversal order
    pub fn from_content(content: &VaultContent) -> Self {
        let entries = content
            .groups
            .iter()
            .flat_map(Group::flatten)
            .cloned()
            .collect();

        Self {
            entries,
            groups: content.group_names().into_iter().map(String::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Names of the top-level groups the store was loaded from
    pub fn group_names(&self) -> &[String] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.entries.iter().enumerate()
    }

    /// Append an entry, returning its id
    pub fn insert(&mut self, entry: Entry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Evict the entry carrying `uuid`
    pub fn remove(&mut self, uuid: &Uuid) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| &e.uuid == uuid)?;
        Some(self.entries.remove(pos))
    }

    /// Evict the entry currently at `id`
    pub fn remove_id(&mut self, id: usize) -> Option<Entry> {
        let uuid = self.get(id)?.uuid;
        self.remove(&uuid)
    }

    /// Entries whose title or tags contain `query` literally, or whose
    /// username, URL, notes, login or email match `query` as a regex
    ///
    /// A query that is not a valid regex is matched literally everywhere.
    pub fn search(&self, query: &str) -> Vec<(usize, &Entry)> {
        let matcher = Matcher::new(query);
        self.iter().filter(|(_, e)| matcher.matches(e)).collect()
    }

    /// Content for a full rewrite: every entry, in id order, in one group
    pub fn to_content(&self) -> VaultContent {
        let name = self
            .groups
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let mut group = Group::new(name);
        group.entries = self.entries.clone();
        VaultContent::new(vec![group])
    }
}

enum Matcher<'q> {
    Pattern { query: &'q str, regex: Regex },
    Literal { query: &'q str },
}

impl<'q> Matcher<'q> {
    fn new(query: &'q str) -> Self {
        match Regex::new(query) {
            Ok(regex) => Self::Pattern { query, regex },
            Err(e) => {
                log::warn!("search pattern '{}' is not a valid regex, matching literally: {}", query, e);
                Self::Literal { query }
            }
        }
    }

    fn matches(&self, entry: &Entry) -> bool {
        let query = match self {
            Self::Pattern { query, .. } | Self::Literal { query } => *query,
        };
        if entry.title().contains(query) || entry.tags.contains(query) {
            return true;
        }

        REGEX_KEYS
            .iter()
            .filter_map(|key| entry.get(key))
            .any(|value| match self {
                Self::Pattern { regex, .. } => regex.is_match(value),
                Self::Literal { query } => value.contains(query),
            })
    }
}
