//! Command execution port
//!
//! The engine never spawns processes itself; it asks a [`CommandRunner`].
//! `ProcessRunner` runs real commands, `DryRunRunner` only reports them.
//!
//! # Pseudo-commands
//!
//! | Command   | Meaning                                              |
//! |-----------|------------------------------------------------------|
//! | `section` | progress heading, never spawned                      |
//! | `info`    | informational note, never spawned                    |
//! | `script`  | literal script text, rendered and run through bash   |

mod process;
mod script;

use anyhow::Result;

pub use process::{ProcessRunner, build_command};
pub use script::ScriptExecutor;

/// Progress heading pseudo-command.
pub const SECTION: &str = "section";
/// Informational note pseudo-command.
pub const INFO: &str = "info";
/// Templated script pseudo-command.
pub const SCRIPT: &str = "script";

/// Runs commands on behalf of the engine.
pub trait CommandRunner {
    /// Run a command to completion. Output handling is up to the
    /// implementation; only success or failure is reported.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()>;

    /// Run a command and capture its standard output.
    fn output(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()> {
        (**self).run(cmd, args)
    }

    fn output(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>> {
        (**self).output(cmd, args)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()> {
        (**self).run(cmd, args)
    }

    fn output(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>> {
        (**self).output(cmd, args)
    }
}

/// True for the annotation pseudo-commands that never spawn a process.
pub fn is_annotation(cmd: &str) -> bool {
    cmd == SECTION || cmd == INFO
}

/// Reports what would run without touching the system.
///
/// Read-only queries (`output`) still execute so installed-package
/// detection reflects the real host.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    queries: ProcessRunner,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()> {
        if is_annotation(cmd) {
            return Ok(());
        }
        tracing::info!("[dry-run] Would run: {} {}", cmd, args.join(" "));
        Ok(())
    }

    fn output(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>> {
        self.queries.output(cmd, args)
    }
}
