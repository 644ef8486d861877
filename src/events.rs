//! Progress event stream
//!
//! The process runner publishes what it is doing as [`LogEvent`]s on a
//! bounded channel. A consumer (the CLI's printer thread, or any other
//! front end) drains the channel independently of the engine; a full
//! channel applies ordinary backpressure, a dropped consumer is ignored.

use std::fmt;
use std::io::Write;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::JoinHandle;

use regex::Regex;
use std::sync::OnceLock;
use strum::Display;

/// Default capacity of the event channel.
pub const EVENT_BUFFER: usize = 100;

/// Severity / kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    /// Phase heading ("Planning", "Installing", "Complete")
    Section,
    /// Informational note or the command about to run
    Info,
    /// A line of child process output
    Output,
    /// A command finished successfully
    Success,
    /// A command failed
    Error,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub text: String,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            LogLevel::Section => "==> ",
            LogLevel::Info => "  ",
            LogLevel::Output => "    ",
            LogLevel::Success => "✔ ",
            LogLevel::Error => "✖ ",
        };
        write!(f, "{}{}", prefix, self.text)
    }
}

/// Sending half of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: SyncSender<LogEvent>,
}

impl EventSink {
    /// Create a bounded channel and return both ends.
    pub fn channel(capacity: usize) -> (Self, Receiver<LogEvent>) {
        let (tx, rx) = sync_channel(capacity);
        (Self { tx }, rx)
    }

    /// Publish an event. Blocks only while the channel is full.
    pub fn send(&self, level: LogLevel, text: impl Into<String>) {
        let event = LogEvent {
            level,
            text: text.into(),
        };
        if self.tx.send(event).is_err() {
            tracing::debug!("Event consumer dropped; discarding progress event");
        }
    }
}

/// Spawn a thread that prints every event to stdout until all senders are
/// dropped.
pub fn spawn_printer(rx: Receiver<LogEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let stdout = std::io::stdout();
        while let Ok(event) = rx.recv() {
            let mut out = stdout.lock();
            if writeln!(out, "{}", event).is_err() {
                break;
            }
        }
    })
}

/// Remove ANSI color/cursor escape sequences from a line of output.
pub fn strip_ansi(input: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let pattern = ANSI.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // constant pattern
        Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap()
    });
    pattern.replace_all(input, "").into_owned()
}
