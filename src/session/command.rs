//! REPL command grammar

use std::path::PathBuf;

use regex::Regex;

use crate::models::keys;

/// Prefix of messages synthesized by the input reader
pub const WARNING_PREFIX: &str = "WARNING";

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `save`
    Save,
    /// `timeout`
    ShowTimeout,
    /// `exit` or `quit`
    Exit,
    /// A `WARNING ...` message from the input reader
    Warning(String),
    /// The literal answer to an outstanding value or passphrase request
    Value(String),
    /// `help`
    Help,
    /// `encrypt <path>`
    Encrypt(PathBuf),
    /// `decrypt <path>`
    Decrypt(PathBuf),
    /// `cp [<id> [<attribute>]]`; arguments are validated by the handler
    Copy {
        id: Option<String>,
        attribute: Option<String>,
    },
    /// `rm [<id>]`
    Remove(Option<String>),
    /// `add <key>`
    Add(String),
    /// `timeout <n>`
    SetTimeout(String),
    /// Anything else
    Search(String),
}

/// Classifies input lines; patterns are compiled once
#[derive(Debug, Clone)]
pub struct CommandRouter {
    copy: Regex,
    remove: Regex,
    add: Regex,
    encrypt: Regex,
    decrypt: Regex,
    timeout: Regex,
}

impl CommandRouter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            copy: Regex::new(r"^cp(?:\s+(\S+))?(?:\s+(\S+))?$")?,
            remove: Regex::new(r"^rm(?:\s+(\S+))?$")?,
            add: Regex::new(r"^add\s+(.+)$")?,
            encrypt: Regex::new(r"^encrypt\s+(.+)$")?,
            decrypt: Regex::new(r"^decrypt\s+(.+)$")?,
            timeout: Regex::new(r"^timeout\s+(\S+)$")?,
        })
    }

    /// Classify `line`. While `awaiting_value` is set every line that is not
    /// `save`, `timeout`, `exit`, `quit` or a warning is the awaited value,
    /// whatever it looks like.
    pub fn classify(&self, line: &str, awaiting_value: bool) -> Command {
        let trimmed = line.trim();
        match trimmed {
            "save" => return Command::Save,
            "timeout" => return Command::ShowTimeout,
            "exit" | "quit" => return Command::Exit,
            _ => {}
        }
        if trimmed.starts_with(WARNING_PREFIX) {
            return Command::Warning(trimmed.to_string());
        }
        if awaiting_value {
            return Command::Value(line.to_string());
        }
        if trimmed == "help" {
            return Command::Help;
        }

        if let Some(caps) = self.encrypt.captures(trimmed) {
            return Command::Encrypt(PathBuf::from(caps[1].trim()));
        }
        if let Some(caps) = self.decrypt.captures(trimmed) {
            return Command::Decrypt(PathBuf::from(caps[1].trim()));
        }
        if let Some(caps) = self.copy.captures(trimmed) {
            return Command::Copy {
                id: caps.get(1).map(|m| m.as_str().to_string()),
                attribute: caps.get(2).map(|m| m.as_str().to_string()),
            };
        }
        if let Some(caps) = self.remove.captures(trimmed) {
            return Command::Remove(caps.get(1).map(|m| m.as_str().to_string()));
        }
        if let Some(caps) = self.add.captures(trimmed) {
            return Command::Add(caps[1].to_string());
        }
        if let Some(caps) = self.timeout.captures(trimmed) {
            return Command::SetTimeout(caps[1].to_string());
        }

        Command::Search(line.to_string())
    }
}

/// Entry attribute addressed by a `cp` attribute name
pub fn copy_attribute(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "password" => Some(keys::PASSWORD),
        "title" => Some(keys::TITLE),
        "username" => Some(keys::USERNAME),
        "login" => Some(keys::LOGIN),
        "email" => Some(keys::EMAIL),
        "url" => Some(keys::URL),
        "notes" => Some(keys::NOTES),
        _ => None,
    }
}
