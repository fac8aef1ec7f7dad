//! Interactive vault session
//!
//! A [`Session`] owns everything a REPL run mutates: the record store, the
//! record under construction, the inactivity clock. Lines come from an
//! [`InputReader`]; each one is classified by the [`CommandRouter`] and
//! handled synchronously before the next capture is requested.
//!
//! ```text
//!            add <key>                    value line
//!   Idle ─────────────────▶ Collecting ────────────────▶ Idle
//!     │  encrypt|decrypt <path>          passphrase
//!     └─────────────────▶ AwaitingPassphrase ──────────▶ Idle
//! ```
//!
//! `save`, `exit` and reader warnings leave either waiting state.

pub mod command;
pub mod input;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::cli::output::{self, Output};
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::crypto::FileCipher;
use crate::models::{keys, PendingRecord};
use crate::store::RecordStore;
use crate::vault::{self, Credentials, Vault, VaultError};

pub use command::{Command, CommandRouter};
pub use input::{InputFeed, InputReader, LineSource, ReadMode, TerminalSource};

/// Session errors; anything surfacing here ends the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to write vault: {0}")]
    Persist(#[source] VaultError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Invalid command pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Prompt shown while waiting for a command
pub const COMMAND_PROMPT: &str = "\ndb # ";

/// Longest idle timeout a session accepts (30 days)
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// What the session is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// The next line is the value of `key`
    Collecting { key: String },
    /// The next line is the passphrase for a file operation
    AwaitingPassphrase { op: FileOp, path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Encrypt,
    Decrypt,
}

/// Whether the loop keeps going after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `exit` or `quit`
    Exit,
    /// The input source was exhausted
    InputClosed,
    /// No input for longer than the idle timeout
    Inactive(Duration),
}

/// Last-activity tracking against an idle timeout
#[derive(Debug, Clone)]
pub struct SessionClock {
    last_activity: Instant,
    timeout: Duration,
}

impl SessionClock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_activity: Instant::now(),
            timeout,
        }
    }

    /// Record activity now
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Time since the last activity
    pub fn idle(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// The instant the session expires unless touched again
    pub fn deadline(&self) -> Instant {
        self.last_activity
            .checked_add(self.timeout)
            .unwrap_or_else(|| self.last_activity + MAX_TIMEOUT)
    }

    pub fn is_expired(&self) -> bool {
        self.idle() >= self.timeout
    }
}

/// One interactive session over an opened vault
pub struct Session {
    store: RecordStore,
    vault: Box<dyn Vault>,
    vault_path: PathBuf,
    credentials: Credentials,
    file_cipher: FileCipher,
    clipboard: Box<dyn Clipboard>,
    router: CommandRouter,
    state: SessionState,
    pending: Option<PendingRecord>,
    clock: SessionClock,
}

impl Session {
    /// Open `path` with `vault`; fails on a wrong passphrase or an empty vault
    pub fn open(
        vault: impl Vault + 'static,
        path: impl Into<PathBuf>,
        credentials: Credentials,
        timeout: Duration,
    ) -> SessionResult<Self> {
        let path = path.into();
        let content = vault.open(&path, &credentials)?;
        let store = RecordStore::from_content(&content);
        log::debug!("opened {} with {} records", path.display(), store.len());
        Self::new(store, vault, path, credentials, timeout)
    }

    pub fn new(
        store: RecordStore,
        vault: impl Vault + 'static,
        vault_path: impl Into<PathBuf>,
        credentials: Credentials,
        timeout: Duration,
    ) -> SessionResult<Self> {
        Ok(Self {
            store,
            vault: Box::new(vault),
            vault_path: vault_path.into(),
            credentials,
            file_cipher: FileCipher::default(),
            clipboard: Box::new(SystemClipboard),
            router: CommandRouter::new()?,
            state: SessionState::Idle,
            pending: None,
            clock: SessionClock::new(timeout),
        })
    }

    pub fn with_clipboard(mut self, clipboard: impl Clipboard + 'static) -> Self {
        self.clipboard = Box::new(clipboard);
        self
    }

    pub fn with_file_cipher(mut self, file_cipher: FileCipher) -> Self {
        self.file_cipher = file_cipher;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingRecord> {
        self.pending.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.clock.timeout()
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// Capture mode the reader must use for the next line
    pub fn read_mode(&self) -> ReadMode {
        match &self.state {
            SessionState::Collecting { key } if key.eq_ignore_ascii_case(keys::PASSWORD) => {
                ReadMode::Secret {
                    prompt: format!("{} value", key),
                    confirm: true,
                }
            }
            SessionState::AwaitingPassphrase { op, .. } => ReadMode::Secret {
                prompt: "Enter passphrase".to_string(),
                confirm: *op == FileOp::Encrypt,
            },
            _ => ReadMode::Line,
        }
    }

    /// Prompt for plain line reads; masked reads prompt on their own
    pub fn prompt(&self) -> Option<String> {
        match (&self.state, self.read_mode()) {
            (_, ReadMode::Secret { .. }) => None,
            (SessionState::Collecting { key }, _) => Some(format!("{} value: ", key)),
            _ => Some(COMMAND_PROMPT.to_string()),
        }
    }

    /// Print the usage block and greeting
    pub fn greet(&self) {
        output::print_usage(Some(&self.vault_path));
        println!();
        println!(
            "{}",
            output::welcome_line(self.store.group_names(), self.store.len())
        );
    }

    /// Drive the session until exit, end of input or inactivity
    pub async fn run(&mut self, input: &mut InputReader) -> SessionResult<SessionEnd> {
        self.clock.touch();
        loop {
            if !input.request(self.read_mode()) {
                return Ok(SessionEnd::InputClosed);
            }
            if let Some(prompt) = self.prompt() {
                Output::prompt(&prompt);
            }

            let deadline = self.clock.deadline();
            tokio::select! {
                message = input.next() => {
                    let Some(line) = message else {
                        log::debug!("input closed, leaving session");
                        return Ok(SessionEnd::InputClosed);
                    };
                    if self.handle_line(&line)? == Flow::Exit {
                        return Ok(SessionEnd::Exit);
                    }
                    self.clock.touch();
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let idle = self.clock.idle();
                    println!();
                    Output::info(&format!("Exit after {:?} of inactivity", idle));
                    return Ok(SessionEnd::Inactive(idle));
                }
            }
        }
    }

    /// Process one input line
    pub fn handle_line(&mut self, line: &str) -> SessionResult<Flow> {
        let awaiting = self.state != SessionState::Idle;
        match self.router.classify(line, awaiting) {
            Command::Save => self.save()?,
            Command::ShowTimeout => Output::info(&format!(
                "Current DB timeout is {} seconds",
                self.clock.timeout().as_secs()
            )),
            Command::Exit => return Ok(Flow::Exit),
            Command::Warning(message) => {
                if self.state != SessionState::Idle {
                    log::debug!("discarding {:?} after reader warning", self.state);
                }
                self.state = SessionState::Idle;
                Output::warning(&message);
            }
            Command::Value(value) => self.accept_value(value),
            Command::Help => output::print_usage(Some(&self.vault_path)),
            Command::Encrypt(path) => self.begin_file_op(FileOp::Encrypt, path),
            Command::Decrypt(path) => self.begin_file_op(FileOp::Decrypt, path),
            Command::Copy { id, attribute } => self.copy(id.as_deref(), attribute.as_deref()),
            Command::Remove(id) => self.remove(id.as_deref())?,
            Command::Add(key) => self.add(key),
            Command::SetTimeout(raw) => self.set_timeout(&raw),
            Command::Search(query) => self.search(&query),
        }
        Ok(Flow::Continue)
    }

    fn save(&mut self) -> SessionResult<()> {
        self.state = SessionState::Idle;
        let Some(record) = self.pending.take() else {
            Output::info("nothing to save");
            return Ok(());
        };

        let id = self.store.insert(record.into_entry());
        let target = self.persist()?;
        Output::success(&format!("record {} saved to {}", id, target.display()));
        Ok(())
    }

    fn persist(&self) -> SessionResult<PathBuf> {
        vault::persist(
            self.vault.as_ref(),
            &self.store.to_content(),
            &self.credentials,
            &self.vault_path,
        )
        .map_err(SessionError::Persist)
    }

    fn accept_value(&mut self, value: String) {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Collecting { key } => {
                self.pending
                    .get_or_insert_with(PendingRecord::new)
                    .set(key, value);
            }
            SessionState::AwaitingPassphrase { op, path } => self.run_file_op(op, &path, &value),
            SessionState::Idle => self.search(&value),
        }
    }

    fn add(&mut self, key: String) {
        self.pending.get_or_insert_with(PendingRecord::new);
        if key.eq_ignore_ascii_case(keys::PASSWORD) {
            Output::info("set encrypted input for password field");
        }
        self.state = SessionState::Collecting { key };
    }

    fn begin_file_op(&mut self, op: FileOp, path: PathBuf) {
        if !path.is_file() {
            warn(&format!("no such file: {}", path.display()));
            return;
        }
        self.state = SessionState::AwaitingPassphrase { op, path };
    }

    fn run_file_op(&self, op: FileOp, path: &Path, passphrase: &str) {
        let secret = vault::compose(passphrase, self.credentials.key_file());
        let result = match op {
            FileOp::Encrypt => self.file_cipher.encrypt_file(path, secret.expose()),
            FileOp::Decrypt => self.file_cipher.decrypt_file(path, secret.expose()),
        };
        let verb = match op {
            FileOp::Encrypt => "encrypted",
            FileOp::Decrypt => "decrypted",
        };
        match result {
            Ok(target) => Output::success(&format!(
                "{} {} to {}",
                verb,
                path.display(),
                target.display()
            )),
            Err(e) => warn(&format!("unable to {} {}: {}", op_name(op), path.display(), e)),
        }
    }

    fn copy(&mut self, id: Option<&str>, attribute: Option<&str>) {
        let Some(id) = id.and_then(|raw| raw.parse::<usize>().ok()) else {
            warn("Unable to get record ID, usage: cp <ID> [attribute]");
            return;
        };
        let name = attribute.unwrap_or("password");
        let Some(key) = command::copy_attribute(name) else {
            warn(&format!("unknown attribute '{}'", name));
            return;
        };
        let Some(entry) = self.store.get(id) else {
            warn(&format!("no record with ID {}", id));
            return;
        };
        let value = entry.value(key);
        if value.is_empty() {
            warn(&format!("record {} has no {}", id, key));
            return;
        }

        match self.clipboard.set_text(value) {
            Ok(()) => Output::success(&format!("{} of record {} copied to clipboard", key, id)),
            Err(e) => warn(&e.to_string()),
        }
    }

    fn remove(&mut self, id: Option<&str>) -> SessionResult<()> {
        let Some(id) = id.and_then(|raw| raw.parse::<usize>().ok()) else {
            warn("Unable to get record ID, usage: rm <ID>");
            return Ok(());
        };
        let Some(entry) = self.store.remove_id(id) else {
            warn(&format!("no record with ID {}", id));
            return Ok(());
        };

        let target = self.persist()?;
        Output::success(&format!(
            "removed record {} ({}), new vault {}",
            id,
            entry.title(),
            target.display()
        ));
        Ok(())
    }

    fn set_timeout(&mut self, raw: &str) {
        match raw.parse::<u64>() {
            Ok(secs) if secs > 0 && Duration::from_secs(secs) <= MAX_TIMEOUT => {
                self.clock.set_timeout(Duration::from_secs(secs));
                Output::info(&format!("New DB timeout is set to {} seconds", secs));
            }
            _ => warn(&format!(
                "invalid timeout '{}' (1..={} seconds), keeping {} seconds",
                raw,
                MAX_TIMEOUT.as_secs(),
                self.clock.timeout().as_secs()
            )),
        }
    }

    fn search(&self, query: &str) {
        for (id, entry) in self.store.search(query) {
            output::print_record(id, entry);
        }
    }
}

fn op_name(op: FileOp) -> &'static str {
    match op {
        FileOp::Encrypt => "encrypt",
        FileOp::Decrypt => "decrypt",
    }
}

/// Recoverable command error: shown to the user and logged
fn warn(message: &str) {
    log::warn!("{}", message);
    Output::warning(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::crypto::Algorithm;
    use crate::models::{Entry, Group, KdfParams, VaultContent};
    use crate::vault::SealedVault;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn light_kdf() -> KdfParams {
        KdfParams {
            memory_cost: 256,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn sample() -> VaultContent {
        let mut group = Group::new("Personal");
        group.entries.push(
            Entry::new()
                .with_field("Title", "Mail")
                .with_field("Email", "me@gmail.com")
                .with_protected("Password", "mail-pw"),
        );
        group.entries.push(
            Entry::new()
                .with_field("Title", "Bank")
                .with_protected("Password", "bank-pw"),
        );
        VaultContent::new(vec![group])
    }

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        clipboard: MemoryClipboard,
        session: Session,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.kdbx");
        let vault = SealedVault::with_kdf(light_kdf());
        let creds = Credentials::new("master");
        vault::create(&vault, &sample(), &creds, &path).unwrap();

        let clipboard = MemoryClipboard::new();
        let session = Session::open(vault, &path, creds, Duration::from_secs(30))
            .unwrap()
            .with_clipboard(clipboard.clone())
            .with_file_cipher(FileCipher::new(Algorithm::Aes).with_kdf(light_kdf()));

        Fixture {
            _dir: dir,
            path,
            clipboard,
            session,
        }
    }

    fn new_path(path: &Path) -> PathBuf {
        crate::crypto::suffixed(path, "new")
    }

    #[test]
    fn test_add_collects_next_line_verbatim() {
        let mut f = fixture();
        f.session.handle_line("add title").unwrap();
        assert_eq!(
            f.session.state(),
            &SessionState::Collecting {
                key: "title".to_string()
            }
        );
        assert_eq!(f.session.prompt(), Some("title value: ".to_string()));

        // looks like a command, is the value
        f.session.handle_line("rm 0").unwrap();
        assert_eq!(f.session.state(), &SessionState::Idle);
        assert_eq!(f.session.pending().unwrap().get("title"), Some("rm 0"));
        assert_eq!(f.session.store().len(), 2);
    }

    #[test]
    fn test_add_accepts_multi_word_key() {
        let mut f = fixture();
        f.session.handle_line("add security question").unwrap();
        assert_eq!(f.session.prompt(), Some("security question value: ".to_string()));
        f.session.handle_line("first pet").unwrap();
        assert_eq!(
            f.session.pending().unwrap().get("security question"),
            Some("first pet")
        );
    }

    #[test]
    fn test_add_password_requests_masked_read() {
        let mut f = fixture();
        assert_eq!(f.session.read_mode(), ReadMode::Line);

        f.session.handle_line("add password").unwrap();
        assert!(matches!(
            f.session.read_mode(),
            ReadMode::Secret { confirm: true, .. }
        ));
        assert_eq!(f.session.prompt(), None);
    }

    #[test]
    fn test_warning_discards_in_flight_value() {
        let mut f = fixture();
        f.session.handle_line("add password").unwrap();
        f.session
            .handle_line(input::MISMATCH_WARNING)
            .unwrap();

        assert_eq!(f.session.state(), &SessionState::Idle);
        assert_eq!(f.session.pending().unwrap().get("password"), None);
        assert_eq!(f.session.read_mode(), ReadMode::Line);
    }

    #[test]
    fn test_save_without_pending_record_leaves_disk_alone() {
        let mut f = fixture();
        f.session.handle_line("save").unwrap();
        assert!(!new_path(&f.path).exists());
        assert_eq!(f.session.store().len(), 2);
    }

    #[test]
    fn test_save_appends_and_persists() {
        let mut f = fixture();
        for line in ["add title", "T", "add username", "u", "add password", "p", "save"] {
            assert_eq!(f.session.handle_line(line).unwrap(), Flow::Continue);
        }
        assert!(f.session.pending().is_none());
        assert_eq!(f.session.store().len(), 3);

        let reopened = SealedVault::new()
            .open(&new_path(&f.path), &Credentials::new("master"))
            .unwrap();
        let store = RecordStore::from_content(&reopened);
        let entry = store.get(2).unwrap();
        assert_eq!(entry.title(), "T");
        assert_eq!(entry.value("UserName"), "u");
        assert_eq!(entry.password(), "p");
        assert!(entry.is_protected("Password"));
    }

    #[test]
    fn test_save_defaults_title() {
        let mut f = fixture();
        for line in ["add url", "https://example.com", "save"] {
            f.session.handle_line(line).unwrap();
        }
        let entry = f.session.store().get(2).unwrap();
        assert_eq!(entry.title(), "Record");
        assert_eq!(entry.value("URL"), "https://example.com");
    }

    #[test]
    fn test_exit_and_quit() {
        let mut f = fixture();
        assert_eq!(f.session.handle_line("exit").unwrap(), Flow::Exit);
        assert_eq!(f.session.handle_line("quit").unwrap(), Flow::Exit);
        f.session.handle_line("add notes").unwrap();
        assert_eq!(f.session.handle_line("exit").unwrap(), Flow::Exit);
    }

    #[test]
    fn test_copy_defaults_to_password() {
        let mut f = fixture();
        f.session.handle_line("cp 1").unwrap();
        assert_eq!(f.clipboard.contents(), Some("bank-pw".to_string()));

        f.session.handle_line("cp 0 title").unwrap();
        assert_eq!(f.clipboard.contents(), Some("Mail".to_string()));

        f.session.handle_line("cp 0 EMAIL").unwrap();
        assert_eq!(f.clipboard.contents(), Some("me@gmail.com".to_string()));
    }

    #[test]
    fn test_copy_rejects_bad_arguments() {
        let mut f = fixture();
        for line in ["cp", "cp x", "cp 9", "cp 0 shoe", "cp 1 url"] {
            f.session.handle_line(line).unwrap();
        }
        assert_eq!(f.clipboard.contents(), None);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut f = fixture();
        f.session.handle_line("rm 9").unwrap();
        f.session.handle_line("rm").unwrap();
        assert_eq!(f.session.store().len(), 2);
        assert!(!new_path(&f.path).exists());
    }

    #[test]
    fn test_remove_persists_and_renumbers() {
        let mut f = fixture();
        f.session.handle_line("rm 0").unwrap();
        assert_eq!(f.session.store().len(), 1);
        assert_eq!(f.session.store().get(0).unwrap().title(), "Bank");

        let reopened = SealedVault::new()
            .open(&new_path(&f.path), &Credentials::new("master"))
            .unwrap();
        assert_eq!(RecordStore::from_content(&reopened).len(), 1);
    }

    #[test]
    fn test_timeout_commands() {
        let mut f = fixture();
        f.session.handle_line("timeout 90").unwrap();
        assert_eq!(f.session.timeout(), Duration::from_secs(90));

        for bad in [
            "timeout 0",
            "timeout -5",
            "timeout soon",
            "timeout 2592001",
            "timeout 18446744073709551615",
            "timeout 99999999999999999999999",
        ] {
            f.session.handle_line(bad).unwrap();
        }
        assert_eq!(f.session.timeout(), Duration::from_secs(90));
        f.session.handle_line("timeout").unwrap();
    }

    #[test]
    fn test_file_encryption_through_session() {
        let mut f = fixture();
        let plain = f.path.with_file_name("notes.txt");
        fs::write(&plain, b"top secret notes").unwrap();

        f.session
            .handle_line(&format!("encrypt {}", plain.display()))
            .unwrap();
        assert!(matches!(
            f.session.read_mode(),
            ReadMode::Secret { confirm: true, .. }
        ));
        f.session.handle_line("file-pass").unwrap();
        assert_eq!(f.session.state(), &SessionState::Idle);

        let sealed = crate::crypto::suffixed(&plain, "encrypted");
        assert!(sealed.exists());

        f.session
            .handle_line(&format!("decrypt {}", sealed.display()))
            .unwrap();
        assert!(matches!(
            f.session.read_mode(),
            ReadMode::Secret { confirm: false, .. }
        ));
        f.session.handle_line("file-pass").unwrap();

        let opened = crate::crypto::suffixed(&sealed, "decrypted");
        assert_eq!(fs::read(opened).unwrap(), b"top secret notes");
    }

    #[test]
    fn test_wrong_file_passphrase_is_recoverable() {
        let mut f = fixture();
        let plain = f.path.with_file_name("notes.txt");
        fs::write(&plain, b"data").unwrap();
        f.session
            .handle_line(&format!("encrypt {}", plain.display()))
            .unwrap();
        f.session.handle_line("right").unwrap();

        let sealed = crate::crypto::suffixed(&plain, "encrypted");
        f.session
            .handle_line(&format!("decrypt {}", sealed.display()))
            .unwrap();
        assert_eq!(f.session.handle_line("wrong").unwrap(), Flow::Continue);
        assert!(!crate::crypto::suffixed(&sealed, "decrypted").exists());
    }

    #[test]
    fn test_encrypt_missing_file_stays_idle() {
        let mut f = fixture();
        f.session.handle_line("encrypt /no/such/file").unwrap();
        assert_eq!(f.session.state(), &SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_deadline_tracks_activity() {
        let mut clock = SessionClock::new(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!clock.is_expired());

        clock.touch();
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!clock.is_expired());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(clock.is_expired());
        assert!(clock.deadline() <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_deadline_saturates() {
        let clock = SessionClock::new(Duration::MAX);
        assert!(clock.deadline() > Instant::now());
        assert!(!clock.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_huge_timeout() {
        let mut f = fixture();
        let (mut reader, mut feed) = InputReader::channel();
        tokio::spawn(async move {
            for line in ["timeout 18446744073709551615", "timeout 2592000", "exit"] {
                feed.next_request().await;
                feed.deliver(line).await;
            }
        });

        assert_eq!(f.session.run(&mut reader).await.unwrap(), SessionEnd::Exit);
        assert_eq!(f.session.timeout(), MAX_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_on_inactivity() {
        let mut f = fixture();
        let (mut reader, mut feed) = InputReader::channel();

        let driver = tokio::spawn(async move {
            // answer the first request, then go quiet
            feed.next_request().await;
            feed.deliver("gmail").await;
            while feed.next_request().await.is_some() {}
        });

        let end = f.session.run(&mut reader).await.unwrap();
        assert!(matches!(end, SessionEnd::Inactive(idle) if idle >= Duration::from_secs(30)));
        drop(reader);
        driver.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exit_and_closed_input() {
        let mut f = fixture();
        let (mut reader, mut feed) = InputReader::channel();
        tokio::spawn(async move {
            feed.next_request().await;
            feed.deliver("quit").await;
        });
        assert_eq!(f.session.run(&mut reader).await.unwrap(), SessionEnd::Exit);

        let (mut reader, feed) = InputReader::channel();
        drop(feed);
        assert_eq!(
            f.session.run(&mut reader).await.unwrap(),
            SessionEnd::InputClosed
        );
    }
}
