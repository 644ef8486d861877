//! Templated script execution
//!
//! Manifest `script` snippets may contain template expressions (for
//! example `{{ .chezmoi.os }}`). Before running, the snippet is written to a
//! temporary file, rendered by an external template command, and the
//! rendered text is written to a second temporary file that `bash` runs.
//! Both files are removed when the returned handle is dropped.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tempfile::NamedTempFile;

/// Default renderer: `chezmoi execute-template <file>`.
pub const DEFAULT_TEMPLATE_COMMAND: &[&str] = &["chezmoi", "execute-template"];

/// Renders and runs literal script snippets.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    /// argv of the renderer; the raw script path is appended. `None` runs
    /// the snippet as written.
    template_command: Option<Vec<String>>,
    shell: String,
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self {
            template_command: Some(DEFAULT_TEMPLATE_COMMAND.iter().map(|s| s.to_string()).collect()),
            shell: "bash".to_string(),
        }
    }
}

impl ScriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different renderer, or `None` to skip rendering.
    pub fn with_template_command(mut self, argv: Option<Vec<String>>) -> Self {
        self.template_command = argv.filter(|argv| !argv.is_empty());
        self
    }

    /// Write and render `script`, returning the file the shell should run.
    pub fn prepare(&self, script: &str) -> Result<NamedTempFile> {
        let raw = write_temp("alacarte-script-raw-", script.as_bytes())?;

        let Some(argv) = &self.template_command else {
            return Ok(raw);
        };
        let (program, rest) = argv
            .split_first()
            .context("template command is empty")?;

        let output = Command::new(program)
            .args(rest)
            .arg(raw.path())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to start template renderer: {}", program))?;

        if !output.status.success() {
            bail!(
                "template rendering failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        write_temp("alacarte-script-", &output.stdout)
    }

    /// Shell command that runs a prepared script file.
    pub fn command(&self, script_path: &Path) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(script_path);
        cmd
    }
}

fn write_temp(prefix: &str, content: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".sh")
        .tempfile()
        .context("Failed to create temporary script file")?;
    file.write_all(content)
        .context("Failed to write temporary script file")?;
    file.flush().context("Failed to flush temporary script file")?;
    Ok(file)
}

/// First line of a script, for progress messages.
pub(crate) fn script_label(script: &str) -> String {
    let first = script.lines().next().unwrap_or_default().trim();
    if script.lines().nth(1).is_some() {
        format!("{first} ...")
    } else {
        first.to_string()
    }
}
