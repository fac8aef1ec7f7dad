//! kpass - interactive shell for an encrypted password vault

use clap::Parser;
use std::process::ExitCode;

use kpass::cli::{run, Cli};

fn main() -> ExitCode {
    // Initialize logging
    if std::env::var("KPASS_DEBUG").is_ok() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    }

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31m✗ Error:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}
