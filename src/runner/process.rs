//! Real command execution
//!
//! Translates installer invocations into their non-interactive package
//! manager command lines, spawns them in their own process group and
//! streams their output as progress events.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use super::script::{ScriptExecutor, script_label};
use super::{CommandRunner, INFO, SCRIPT, SECTION};
use crate::events::{EventSink, LogLevel, strip_ansi};
#[cfg(unix)]
use crate::process_guard::{CommandProcessGroup, TrackedChild};

/// Runs commands on the host.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    events: Option<EventSink>,
    scripts: ScriptExecutor,
    binary_dir: PathBuf,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        let binary_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("bin");
        Self {
            events: None,
            scripts: ScriptExecutor::default(),
            binary_dir,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish progress and child output on `sink` instead of inheriting
    /// the terminal.
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn with_script_executor(mut self, scripts: ScriptExecutor) -> Self {
        self.scripts = scripts;
        self
    }

    /// Where `binary:*` downloads are placed.
    pub fn with_binary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.binary_dir = dir.into();
        self
    }

    fn emit(&self, level: LogLevel, text: impl Into<String>) {
        if let Some(sink) = &self.events {
            sink.send(level, text);
        }
    }

    fn spawn_and_wait(&self, mut cmd: Command, shown: &str) -> Result<()> {
        self.emit(LogLevel::Info, shown);
        tracing::debug!("Executing: {}", shown);

        if self.events.is_some() {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        #[cfg(unix)]
        cmd.in_new_process_group();

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn: {}", shown))?;
        #[cfg(unix)]
        let _tracked = TrackedChild::register(child.id());

        let mut readers = Vec::new();
        if let Some(sink) = &self.events {
            if let Some(out) = child.stdout.take() {
                readers.push(spawn_forwarder(sink.clone(), out));
            }
            if let Some(err) = child.stderr.take() {
                readers.push(spawn_forwarder(sink.clone(), err));
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("Failed waiting for: {}", shown))?;

        // A background process started by the child can hold the pipes open
        // after the child exits; its readers are left detached.
        let deadline = Instant::now() + READER_GRACE;
        while readers.iter().any(|r| !r.is_finished()) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if readers.iter().any(|r| !r.is_finished()) {
            tracing::debug!("Output of {} still open after exit; not waiting for it", shown);
        }

        if status.success() {
            self.emit(LogLevel::Success, format!("Success: {}", shown));
            Ok(())
        } else {
            self.emit(LogLevel::Error, format!("Failed ({}): {}", status, shown));
            bail!("{} exited with {}", shown, status)
        }
    }
}

/// How long to keep draining output once the child has exited.
const READER_GRACE: Duration = Duration::from_millis(500);

fn spawn_forwarder(sink: EventSink, stream: impl Read + Send + 'static) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(|line| line.ok()) {
            sink.send(LogLevel::Output, strip_ansi(&line));
        }
    })
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()> {
        match cmd {
            SECTION => {
                self.emit(LogLevel::Section, args.join(" "));
                Ok(())
            }
            INFO => {
                self.emit(LogLevel::Info, args.join(" "));
                Ok(())
            }
            SCRIPT => {
                let script = args.join(" ");
                let prepared = self.scripts.prepare(&script)?;
                let command = self.scripts.command(prepared.path());
                self.spawn_and_wait(command, &format!("script: {}", script_label(&script)))
            }
            _ => {
                let (command, shown) = build_command(cmd, args, &self.binary_dir);
                self.spawn_and_wait(command, &shown)
            }
        }
    }

    fn output(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}", cmd))?;
        if !output.status.success() {
            bail!("{} {} exited with {}", cmd, args.join(" "), output.status);
        }
        Ok(output.stdout)
    }
}

/// Build the host command for an installer id (or any other command) and
/// its human-readable form.
///
/// Installer ids map to their unattended package manager invocation;
/// anything that is not an installer id runs verbatim.
pub fn build_command(cmd: &str, args: &[&str], binary_dir: &Path) -> (Command, String) {
    let (program, argv): (&str, Vec<String>) = match cmd {
        "apt" => (
            "sudo",
            with_args(
                &[
                    "env",
                    "DEBIAN_FRONTEND=noninteractive",
                    "apt-get",
                    "-o",
                    "DPkg::Options::=--force-confdef",
                    "install",
                    "-y",
                    "--no-install-recommends",
                    "--ignore-missing",
                ],
                args,
            ),
        ),
        "apk" => ("sudo", with_args(&["apk", "add", "--no-cache"], args)),
        "dnf" | "yum" => (
            "sudo",
            with_args(
                &[
                    cmd,
                    "install",
                    "-y",
                    "--setopt=skip_if_unavailable=True",
                    "--setopt=skip_missing_names_on_install=True",
                ],
                args,
            ),
        ),
        "zypper" => (
            "sudo",
            with_args(&["zypper", "--non-interactive", "install", "-y"], args),
        ),
        "pacman" => (
            "sudo",
            with_args(&["pacman", "-S", "--noconfirm", "--needed"], args),
        ),
        "yay" => ("yay", with_args(&["-S", "--noconfirm", "--needed"], args)),
        "xbps" => ("sudo", with_args(&["xbps-install", "-Sy"], args)),
        "emerge" => ("sudo", with_args(&["emerge", "--noreplace"], args)),
        "port" => ("sudo", with_args(&["port", "install"], args)),
        "pkg" => ("sudo", with_args(&["pkg", "install", "-y"], args)),
        "pkg-termux" => ("pkg", with_args(&["install", "-y"], args)),
        "snap" => ("sudo", with_args(&["snap", "install"], args)),
        "flatpak" => (
            "flatpak",
            with_args(&["install", "-y", "--noninteractive", "flathub"], args),
        ),
        "choco" => ("choco", with_args(&["install", "-y"], args)),
        "scoop" => ("scoop", with_args(&["install"], args)),
        "nix" => (
            "nix",
            ["profile".to_string(), "install".to_string()]
                .into_iter()
                .chain(args.iter().map(|pkg| format!("nixpkgs#{}", pkg)))
                .collect(),
        ),
        "nix-env" => ("nix-env", with_args(&["-iA"], args)),
        "mas" => ("mas", with_args(&["install"], args)),
        // Verb-style installers arrive as `[install, pkg]`.
        "npm" => ("npm", with_args(&["install", "-g"], strip_verb(args))),
        "cask" => ("brew", with_args(&["install", "--cask"], strip_verb(args))),
        _ if cmd.starts_with("binary:") => {
            let url = args.first().copied().unwrap_or_default();
            let name = url
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .unwrap_or("download");
            let dir = binary_dir.to_string_lossy().into_owned();
            (
                "sh",
                vec![
                    "-c".to_string(),
                    r#"mkdir -p "$2" && curl -fsSL "$1" -o "$2/$3" && chmod +x "$2/$3""#
                        .to_string(),
                    "sh".to_string(),
                    url.to_string(),
                    dir,
                    name.to_string(),
                ],
            )
        }
        _ => (cmd, args.iter().map(|a| a.to_string()).collect()),
    };

    let display = std::iter::once(program.to_string())
        .chain(argv.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    let mut command = Command::new(program);
    command.args(&argv);
    (command, display)
}

fn with_args(prefix: &[&str], args: &[&str]) -> Vec<String> {
    prefix
        .iter()
        .chain(args.iter())
        .map(|s| s.to_string())
        .collect()
}

fn strip_verb<'a, 'b>(args: &'a [&'b str]) -> &'a [&'b str] {
    match args.split_first() {
        Some((&"install", rest)) => rest,
        _ => args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEvent;

    fn display(cmd: &str, args: &[&str]) -> String {
        build_command(cmd, args, Path::new("/home/u/.local/bin")).1
    }

    #[test]
    fn test_apt_is_noninteractive() {
        assert_eq!(
            display("apt", &["git"]),
            "sudo env DEBIAN_FRONTEND=noninteractive apt-get -o DPkg::Options::=--force-confdef \
             install -y --no-install-recommends --ignore-missing git"
        );
    }

    #[test]
    fn test_dnf_and_yum_share_flags() {
        assert!(display("dnf", &["git"]).starts_with("sudo dnf install -y --setopt="));
        assert!(display("yum", &["git"]).starts_with("sudo yum install -y --setopt="));
    }

    #[test]
    fn test_package_manager_translations() {
        assert_eq!(display("apk", &["curl"]), "sudo apk add --no-cache curl");
        assert_eq!(
            display("zypper", &["curl"]),
            "sudo zypper --non-interactive install -y curl"
        );
        assert_eq!(
            display("pacman", &["curl"]),
            "sudo pacman -S --noconfirm --needed curl"
        );
        assert_eq!(display("yay", &["paru"]), "yay -S --noconfirm --needed paru");
        assert_eq!(display("snap", &["code"]), "sudo snap install code");
        assert_eq!(
            display("flatpak", &["org.gimp.GIMP"]),
            "flatpak install -y --noninteractive flathub org.gimp.GIMP"
        );
        assert_eq!(display("nix", &["ripgrep"]), "nix profile install nixpkgs#ripgrep");
    }

    #[test]
    fn test_verb_installers() {
        assert_eq!(display("cask", &["install", "iterm2"]), "brew install --cask iterm2");
        assert_eq!(display("npm", &["install", "pnpm"]), "npm install -g pnpm");
        assert_eq!(display("brew", &["install", "jq"]), "brew install jq");
        assert_eq!(display("cargo", &["install", "fd-find"]), "cargo install fd-find");
    }

    #[test]
    fn test_binary_download() {
        let shown = display("binary:linux", &["https://example.com/dl/tool"]);
        assert!(shown.starts_with("sh -c "));
        assert!(shown.ends_with("https://example.com/dl/tool /home/u/.local/bin tool"));
    }

    #[test]
    fn test_unknown_command_runs_verbatim() {
        assert_eq!(display("echo", &["a", "b"]), "echo a b");
    }

    #[test]
    fn test_run_reports_failure() {
        let runner = ProcessRunner::new();
        assert!(runner.run("true", &[]).is_ok());
        assert!(runner.run("false", &[]).is_err());
    }

    #[test]
    fn test_output_captures_stdout() {
        let runner = ProcessRunner::new();
        assert_eq!(runner.output("echo", &["hello"]).unwrap(), b"hello\n");
        assert!(runner.output("false", &[]).is_err());
    }

    #[test]
    fn test_output_streams_as_events() {
        let (sink, rx) = EventSink::channel(64);
        let runner = ProcessRunner::new().with_events(sink);
        runner.run(SECTION, &["Installing"]).unwrap();
        runner
            .run("sh", &["-c", "printf 'one\\n\\033[32mtwo\\033[0m\\n'"])
            .unwrap();
        drop(runner);

        let events: Vec<LogEvent> = rx.iter().collect();
        assert_eq!(events[0].level, LogLevel::Section);
        assert_eq!(events[0].text, "Installing");
        let lines: Vec<&str> = events
            .iter()
            .filter(|e| e.level == LogLevel::Output)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(lines, ["one", "two"]);
        assert_eq!(events.last().map(|e| e.level), Some(LogLevel::Success));
    }

    #[test]
    fn test_background_child_does_not_block_return() {
        let (sink, rx) = EventSink::channel(64);
        let runner = ProcessRunner::new().with_events(sink);
        let start = Instant::now();
        runner
            .run("sh", &["-c", "sleep 5 & echo started"])
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        drop(runner);

        let texts: Vec<String> = rx.try_iter().map(|e| e.text).collect();
        assert!(texts.iter().any(|t| t == "started"));
        assert!(texts.iter().any(|t| t.starts_with("Success: ")));
    }

    #[test]
    fn test_script_runs_through_shell() {
        let scripts = ScriptExecutor::new().with_template_command(None);
        let runner = ProcessRunner::new().with_script_executor(scripts);
        assert!(runner.run(SCRIPT, &["exit 0"]).is_ok());
        assert!(runner.run(SCRIPT, &["exit 3"]).is_err());
    }
}
