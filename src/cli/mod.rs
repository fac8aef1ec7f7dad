//! Command line interface for kpass
//!
//! Modes, checked in order:
//! - `--version`: print build information
//! - `--pwd <len:[n][s]>`: generate a password into the clipboard
//! - `--encrypt` / `--decrypt <path>`: one-shot file encryption
//! - `--init`: create an empty vault
//! - otherwise: unlock the vault and start the interactive session

pub mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Password};

use crate::clipboard::{Clipboard, SystemClipboard};
use crate::crypto::{Algorithm, FileCipher, PasswordGenerator};
use crate::keyfile::KeyFile;
use crate::models::{Group, SensitiveString, VaultContent, DEFAULT_GROUP};
use crate::session::{FileOp, InputReader, Session, SessionEnd, TerminalSource, MAX_TIMEOUT};
use crate::vault::{self, Credentials, SealedVault};
use crate::{Config, KpassError, KpassResult, VERSION};

use output::Output;

/// kpass - interactive shell for an encrypted password vault
#[derive(Parser, Debug)]
#[command(name = "kpass")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Vault file (default: ~/.keepass.kdbx)
    #[arg(long, value_name = "PATH")]
    pub kdbx: Option<PathBuf>,

    /// Key file mixed into the passphrase
    #[arg(long, value_name = "PATH")]
    pub kfile: Option<PathBuf>,

    /// Idle timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub interval: u64,

    /// Generate a password (e.g. 16:ns), copy it to the clipboard and exit
    #[arg(long, value_name = "LEN:[n][s]")]
    pub pwd: Option<String>,

    /// Cipher for file encryption: aes or nacl
    #[arg(long, default_value = "aes")]
    pub cipher: String,

    /// Encrypt a file into <PATH>-encrypted and exit
    #[arg(long, value_name = "PATH", conflicts_with = "decrypt")]
    pub encrypt: Option<PathBuf>,

    /// Decrypt a file into <PATH>-decrypted and exit
    #[arg(long, value_name = "PATH")]
    pub decrypt: Option<PathBuf>,

    /// Create a new empty vault at the vault path and exit
    #[arg(long)]
    pub init: bool,

    /// Show version information
    #[arg(long)]
    pub version: bool,
}

impl Cli {
    /// Validated configuration from the flags
    pub fn config(&self) -> KpassResult<Config> {
        if self.interval == 0 || Duration::from_secs(self.interval) > MAX_TIMEOUT {
            return Err(KpassError::InvalidConfig(format!(
                "--interval must be between 1 and {} seconds",
                MAX_TIMEOUT.as_secs()
            )));
        }
        let cipher: Algorithm = self
            .cipher
            .parse()
            .map_err(|e: crate::crypto::CryptoError| KpassError::InvalidConfig(e.to_string()))?;

        let defaults = Config::default();
        Ok(Config {
            vault_path: self.kdbx.clone().unwrap_or(defaults.vault_path),
            key_file: self.kfile.clone(),
            timeout: Duration::from_secs(self.interval),
            cipher,
        })
    }
}

/// Interactive prompts
pub struct Prompts;

impl Prompts {
    /// Masked passphrase, typed twice when `confirm` is set
    pub fn passphrase(prompt: &str, confirm: bool) -> KpassResult<SensitiveString> {
        let theme = ColorfulTheme::default();

        let passphrase = Password::with_theme(&theme)
            .with_prompt(prompt)
            .interact()
            .map_err(|e| KpassError::Prompt(e.to_string()))?;

        if confirm {
            let again = Password::with_theme(&theme)
                .with_prompt("Confirm passphrase")
                .interact()
                .map_err(|e| KpassError::Prompt(e.to_string()))?;

            if passphrase != again {
                return Err(KpassError::Prompt("Passphrases don't match".to_string()));
            }
        }

        Ok(SensitiveString::new(passphrase))
    }
}

/// `kpass <version> date=<today>`
pub fn version_line() -> String {
    format!(
        "kpass {} date={}",
        VERSION,
        chrono::Local::now().format("%Y-%m-%d")
    )
}

/// Run the mode selected by the flags
pub fn run(cli: Cli) -> KpassResult<ExitCode> {
    if cli.version {
        Output::info(&version_line());
        return Ok(ExitCode::SUCCESS);
    }

    let config = cli.config()?;

    if let Some(spec) = &cli.pwd {
        generate_password(spec)?;
        return Ok(ExitCode::SUCCESS);
    }

    let key_file = config
        .key_file
        .as_deref()
        .map(KeyFile::read)
        .transpose()?;

    if let Some(path) = &cli.encrypt {
        file_operation(&config, key_file.as_ref(), FileOp::Encrypt, path)?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(path) = &cli.decrypt {
        file_operation(&config, key_file.as_ref(), FileOp::Decrypt, path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let passphrase = if cli.init {
        Prompts::passphrase("New vault passphrase", true)?
    } else {
        Prompts::passphrase("Vault passphrase", false)?
    };
    let mut credentials = Credentials::new(passphrase);
    if let Some(key_file) = key_file {
        credentials = credentials.with_key_file(key_file);
    }

    if cli.init {
        init_vault(&config.vault_path, &credentials)?;
        return Ok(ExitCode::SUCCESS);
    }

    run_session(config, credentials)
}

fn generate_password(spec: &str) -> KpassResult<()> {
    let password = PasswordGenerator::from_spec(spec)
        .map_err(|e| KpassError::InvalidConfig(e.to_string()))?
        .generate();

    match SystemClipboard.set_text(&password) {
        Ok(()) => Output::success(&format!("New password {} copied to clipboard", password)),
        Err(e) => {
            println!("New password {}", password);
            Output::warning(&e.to_string());
        }
    }
    Ok(())
}

fn file_operation(
    config: &Config,
    key_file: Option<&KeyFile>,
    op: FileOp,
    path: &Path,
) -> KpassResult<()> {
    let passphrase = Prompts::passphrase("File passphrase", op == FileOp::Encrypt)?;
    let secret = vault::compose(passphrase.expose(), key_file);
    let cipher = FileCipher::new(config.cipher);

    let (verb, target) = match op {
        FileOp::Encrypt => ("encrypted", cipher.encrypt_file(path, secret.expose())?),
        FileOp::Decrypt => ("decrypted", cipher.decrypt_file(path, secret.expose())?),
    };
    Output::success(&format!(
        "{} {} to {}",
        verb,
        path.display(),
        target.display()
    ));
    Ok(())
}

fn init_vault(path: &Path, credentials: &Credentials) -> KpassResult<()> {
    let content = VaultContent::new(vec![Group::new(DEFAULT_GROUP)]);
    vault::create(&SealedVault::new(), &content, credentials, path)?;
    Output::success(&format!("Vault created at {}", path.display()));
    Ok(())
}

fn run_session(config: Config, credentials: Credentials) -> KpassResult<ExitCode> {
    let mut session = Session::open(
        SealedVault::new(),
        &config.vault_path,
        credentials,
        config.timeout,
    )?
    .with_file_cipher(FileCipher::new(config.cipher));
    session.greet();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut input = InputReader::spawn(TerminalSource)?;

    match runtime.block_on(session.run(&mut input))? {
        SessionEnd::Inactive(idle) => {
            log::info!("session closed after {:?} idle", idle);
            Ok(ExitCode::FAILURE)
        }
        SessionEnd::Exit | SessionEnd::InputClosed => Ok(ExitCode::SUCCESS),
    }
}
