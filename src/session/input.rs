//! Terminal input capture
//!
//! Reads happen on a dedicated thread so the session loop never blocks on
//! the terminal. The two sides talk over a pair of channels: the session
//! asks for one capture at a time (plain line or masked secret), the reader
//! answers with exactly one message per request. A message slot holds at
//! most one line, and the reader never starts a capture before it has been
//! told which mode to use.

use std::io::{self, BufRead};
use std::thread;

use dialoguer::Password;
use tokio::sync::mpsc;

/// Delivered instead of a secret when the two masked reads differ
pub const MISMATCH_WARNING: &str = "WARNING: password match failed, will discard it ...";

/// Prompt for the confirmation read of a secret
pub const REPEAT_PROMPT: &str = "repeat password";

/// How the next line is captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadMode {
    Line,
    Secret { prompt: String, confirm: bool },
}

/// A source of terminal lines
pub trait LineSource: Send + 'static {
    /// Next line without its line terminator; `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// One masked read
    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// Standard input, with masked reads through the terminal
#[derive(Debug, Default)]
pub struct TerminalSource;

impl LineSource for TerminalSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map(|secret| secret.trim().to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

fn wrong_input(e: io::Error) -> String {
    format!("WARNING: wrong input {}", e)
}

/// Perform one capture. Errors and secret mismatches come back as
/// `WARNING` messages; `None` means the source is exhausted.
pub fn capture(source: &mut dyn LineSource, mode: &ReadMode) -> Option<String> {
    match mode {
        ReadMode::Line => match source.read_line() {
            Ok(line) => line,
            Err(e) => Some(wrong_input(e)),
        },
        ReadMode::Secret { prompt, confirm } => {
            let secret = match source.read_secret(prompt) {
                Ok(secret) => secret,
                Err(e) => return Some(wrong_input(e)),
            };
            if *confirm {
                match source.read_secret(REPEAT_PROMPT) {
                    Ok(again) if again == secret => {}
                    Ok(_) => return Some(MISMATCH_WARNING.to_string()),
                    Err(e) => return Some(wrong_input(e)),
                }
            }
            Some(secret)
        }
    }
}

/// Session side of the reader
#[derive(Debug)]
pub struct InputReader {
    requests: mpsc::UnboundedSender<ReadMode>,
    messages: mpsc::Receiver<String>,
}

/// Reader side: takes capture requests, hands back messages
#[derive(Debug)]
pub struct InputFeed {
    requests: mpsc::UnboundedReceiver<ReadMode>,
    messages: mpsc::Sender<String>,
}

impl InputReader {
    /// A connected reader/feed pair with nothing driving the feed
    pub fn channel() -> (InputReader, InputFeed) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::channel(1);
        (
            InputReader {
                requests: request_tx,
                messages: message_rx,
            },
            InputFeed {
                requests: request_rx,
                messages: message_tx,
            },
        )
    }

    /// Drive a feed from `source` on a detached thread
    pub fn spawn(source: impl LineSource) -> io::Result<Self> {
        let (reader, feed) = Self::channel();
        thread::Builder::new()
            .name("input-reader".to_string())
            .spawn(move || feed.run(source))?;
        Ok(reader)
    }

    /// Ask for the next capture; `false` once the reader has stopped
    pub fn request(&self, mode: ReadMode) -> bool {
        self.requests.send(mode).is_ok()
    }

    /// Next message; `None` once the reader has stopped
    pub async fn next(&mut self) -> Option<String> {
        self.messages.recv().await
    }
}

impl InputFeed {
    pub async fn next_request(&mut self) -> Option<ReadMode> {
        self.requests.recv().await
    }

    pub async fn deliver(&self, message: impl Into<String>) -> bool {
        self.messages.send(message.into()).await.is_ok()
    }

    fn run(mut self, mut source: impl LineSource) {
        while let Some(mode) = self.requests.blocking_recv() {
            let Some(message) = capture(&mut source, &mode) else {
                log::debug!("input closed");
                break;
            };
            if self.messages.blocking_send(message).is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted reads; an `Err` string becomes an IO error
    struct Scripted {
        lines: VecDeque<Result<&'static str, &'static str>>,
        secrets: VecDeque<&'static str>,
    }

    impl Scripted {
        fn lines(lines: &[&'static str]) -> Self {
            Self {
                lines: lines.iter().map(|l| Ok(*l)).collect(),
                secrets: VecDeque::new(),
            }
        }

        fn secrets(secrets: &[&'static str]) -> Self {
            Self {
                lines: VecDeque::new(),
                secrets: secrets.iter().copied().collect(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            match self.lines.pop_front() {
                Some(Ok(line)) => Ok(Some(line.to_string())),
                Some(Err(e)) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                None => Ok(None),
            }
        }

        fn read_secret(&mut self, _prompt: &str) -> io::Result<String> {
            self.secrets
                .pop_front()
                .map(String::from)
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no secret"))
        }
    }

    fn secret(confirm: bool) -> ReadMode {
        ReadMode::Secret {
            prompt: "Password value".to_string(),
            confirm,
        }
    }

    #[test]
    fn test_capture_line() {
        let mut source = Scripted::lines(&["hello"]);
        assert_eq!(capture(&mut source, &ReadMode::Line), Some("hello".to_string()));
        assert_eq!(capture(&mut source, &ReadMode::Line), None);
    }

    #[test]
    fn test_capture_read_error_becomes_warning() {
        let mut source = Scripted {
            lines: VecDeque::from([Err("stream did not contain valid UTF-8")]),
            secrets: VecDeque::new(),
        };
        let message = capture(&mut source, &ReadMode::Line).unwrap();
        assert!(message.starts_with("WARNING: wrong input"));
    }

    #[test]
    fn test_capture_confirmed_secret() {
        let mut source = Scripted::secrets(&["s3cret", "s3cret"]);
        assert_eq!(capture(&mut source, &secret(true)), Some("s3cret".to_string()));
    }

    #[test]
    fn test_capture_secret_mismatch_discards_value() {
        let mut source = Scripted::secrets(&["s3cret", "s3cert"]);
        let message = capture(&mut source, &secret(true)).unwrap();
        assert_eq!(message, MISMATCH_WARNING);
        assert!(!message.contains("s3cret"));
    }

    #[test]
    fn test_capture_unconfirmed_secret_reads_once() {
        let mut source = Scripted::secrets(&["one", "two"]);
        assert_eq!(capture(&mut source, &secret(false)), Some("one".to_string()));
        assert_eq!(source.secrets.len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_reader_answers_each_request() {
        let source = Scripted {
            lines: VecDeque::from([Ok("first"), Ok("second")]),
            secrets: VecDeque::from(["pw", "pw"]),
        };
        let mut reader = InputReader::spawn(source).unwrap();

        assert!(reader.request(ReadMode::Line));
        assert_eq!(reader.next().await, Some("first".to_string()));

        assert!(reader.request(secret(true)));
        assert_eq!(reader.next().await, Some("pw".to_string()));

        assert!(reader.request(ReadMode::Line));
        assert_eq!(reader.next().await, Some("second".to_string()));

        // source exhausted: the reader stops and the channel closes
        reader.request(ReadMode::Line);
        assert_eq!(reader.next().await, None);
    }
}
