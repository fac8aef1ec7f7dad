//! Terminal output helpers

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::models::{keys, Entry};

/// CLI output helpers
pub struct Output;

impl Output {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a key-value pair
    pub fn field(key: &str, value: &str) {
        println!("{:<20}: {}", key.dimmed(), value);
    }

    /// Print a prompt without a trailing newline
    pub fn prompt(text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }
}

/// Byte count with a decimal-unit rendering, e.g. `1234 (1.2KB)`
pub fn size_format(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1000.0 {
            return format!("{} ({:.1}{})", bytes, size, unit);
        }
        size /= 1000.0;
    }
    format!("{} ({:.1}EB)", bytes, size)
}

/// Print the command summary, preceded by vault file details when known
pub fn print_usage(db: Option<&Path>) {
    if let Some(path) = db {
        if let Ok(meta) = fs::metadata(path) {
            println!();
            Output::field("Database", &path.display().to_string());
            Output::field("Size", &size_format(meta.len()));
            if let Ok(modified) = meta.modified() {
                let modified: DateTime<Local> = modified.into();
                Output::field(
                    "Modification time",
                    &modified.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
                );
            }
        }
    }

    println!();
    println!("{}", "Vault commands:".bold());
    println!("cp <ID> <attribute> # copy record ID attribute to clipboard");
    println!("rm <ID>             # remove record ID from database");
    println!("add <key>           # add specific record key");
    println!("save                # save record in DB and write new DB file");
    println!("timeout             # show current timeout settings");
    println!("timeout <int>       # set timeout interval in seconds");
    println!("exit | quit         # leave the session");
    println!("<anything else>     # search records");
    println!();
    println!("{}", "Additional commands:".bold());
    println!("encrypt <fname>     # encrypt given file");
    println!("decrypt <fname>     # decrypt given file");
    println!("help                # show this message");
}

/// Session greeting
pub fn welcome_line(groups: &[String], records: usize) -> String {
    format!("Welcome to {} ({} records)", groups.join(","), records)
}

/// Search hit rendering; never includes the password
pub fn format_record(id: usize, entry: &Entry) -> String {
    [
        "---".to_string(),
        format!("Record   {}", id),
        format!("Title    {}", entry.value(keys::TITLE)),
        format!("Login    {}", entry.value(keys::LOGIN)),
        format!("UserName {}", entry.value(keys::USERNAME)),
        format!("URL      {}", entry.value(keys::URL)),
        format!("Notes    {}", entry.value(keys::NOTES)),
        format!("Tags     {}", entry.tags),
    ]
    .join("\n")
}

pub fn print_record(id: usize, entry: &Entry) {
    println!("{}", format_record(id, entry));
}
