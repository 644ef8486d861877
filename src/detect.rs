//! Installed-package detection
//!
//! Asks each supported package manager what it has installed and merges the
//! answers into one set. A manager that is missing or whose query fails
//! contributes nothing; detection itself never fails.
//!
//! # Sources
//!
//! | Manager | Query                      | Installed when                        |
//! |---------|----------------------------|---------------------------------------|
//! | dpkg    | `dpkg -l`                  | line starts with `ii `, 2nd field     |
//! | brew    | `brew list -1`             | any non-blank line                    |
//! | pipx    | `pipx list`                | line starts with `  - `               |
//! | cargo   | `cargo install --list`     | unindented `name version:` header     |
//! | npm     | `npm list -g --depth=0`    | `name@` on a line containing `@`      |
//! | pacman  | `pacman -Qq`               | any non-blank line                    |

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::runner::CommandRunner;

/// Normalized set of installed identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPackages {
    names: BTreeSet<String>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn merge(&mut self, other: InstalledPackages) {
        self.names.extend(other.names);
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for InstalledPackages {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// One package manager's "what is installed" query.
pub trait InstalledSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    /// Command and arguments whose stdout lists installed packages.
    fn query(&self) -> (&'static str, &'static [&'static str]);
    /// Extract package names from the query output.
    fn parse(&self, output: &str) -> Vec<String>;

    /// Run the query; any failure yields an empty set.
    fn installed<R: CommandRunner + ?Sized>(&self, runner: &R) -> InstalledPackages
    where
        Self: Sized,
    {
        let (cmd, args) = self.query();
        match runner.output(cmd, args) {
            Ok(out) => {
                let found: InstalledPackages =
                    self.parse(&String::from_utf8_lossy(&out)).into_iter().collect();
                tracing::debug!("{}: {} installed package(s)", self.name(), found.len());
                found
            }
            Err(e) => {
                tracing::debug!("{}: query unavailable ({:#})", self.name(), e);
                InstalledPackages::new()
            }
        }
    }
}

/// Debian-family packages via `dpkg -l`.
pub struct Dpkg;

impl InstalledSource for Dpkg {
    fn name(&self) -> &'static str {
        "dpkg"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("dpkg", &["-l"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter(|line| line.starts_with("ii "))
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
            .collect()
    }
}

/// Homebrew formulae via `brew list -1`.
pub struct Brew;

impl InstalledSource for Brew {
    fn name(&self) -> &'static str {
        "brew"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("brew", &["list", "-1"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        non_blank_lines(output)
    }
}

/// pipx-managed Python applications.
pub struct Pipx;

impl InstalledSource for Pipx {
    fn name(&self) -> &'static str {
        "pipx"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("pipx", &["list"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|line| line.strip_prefix("  - "))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Binaries installed with `cargo install`.
pub struct CargoInstall;

impl InstalledSource for CargoInstall {
    fn name(&self) -> &'static str {
        "cargo"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("cargo", &["install", "--list"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        // Header lines look like `ripgrep v14.1.0:`; binaries are indented.
        output
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with(char::is_whitespace))
            .filter(|line| line.contains(' '))
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }
}

/// Global npm packages.
pub struct NpmGlobal;

fn npm_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // constant pattern
        Regex::new(r"([a-zA-Z0-9._-]+)@").unwrap()
    })
}

impl InstalledSource for NpmGlobal {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("npm", &["list", "-g", "--depth=0"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter(|line| line.contains('@'))
            .filter_map(|line| npm_name_pattern().captures(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Arch Linux packages via `pacman -Qq`.
pub struct Pacman;

impl InstalledSource for Pacman {
    fn name(&self) -> &'static str {
        "pacman"
    }

    fn query(&self) -> (&'static str, &'static [&'static str]) {
        ("pacman", &["-Qq"])
    }

    fn parse(&self, output: &str) -> Vec<String> {
        non_blank_lines(output)
    }
}

fn non_blank_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Query every supported manager and merge the results.
pub fn installed_packages<R: CommandRunner + ?Sized>(runner: &R) -> InstalledPackages {
    let mut installed = InstalledPackages::new();
    installed.merge(Dpkg.installed(runner));
    installed.merge(Brew.installed(runner));
    installed.merge(Pipx.installed(runner));
    installed.merge(CargoInstall.installed(runner));
    installed.merge(NpmGlobal.installed(runner));
    installed.merge(Pacman.installed(runner));
    tracing::info!("Detected {} installed package(s)", installed.len());
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::collections::HashMap;

    /// Serves canned stdout per command; anything else fails like a
    /// missing binary.
    struct CannedRunner(HashMap<&'static str, &'static str>);

    impl CommandRunner for CannedRunner {
        fn run(&self, _cmd: &str, _args: &[&str]) -> anyhow::Result<()> {
            Ok(())
        }

        fn output(&self, cmd: &str, _args: &[&str]) -> anyhow::Result<Vec<u8>> {
            match self.0.get(cmd) {
                Some(out) => Ok(out.as_bytes().to_vec()),
                None => bail!("{cmd}: command not found"),
            }
        }
    }

    #[test]
    fn test_dpkg_only_counts_installed_status() {
        let out = "Desired=Unknown/Install/Remove/Purge/Hold\n\
                   ||/ Name    Version  Architecture Description\n\
                   +++-=======-========-============-===========\n\
                   ii  curl    7.88.1   amd64        command line tool\n\
                   rc  oldpkg  1.0      amd64        removed\n\
                   ii  git     1:2.39   amd64        fast vcs\n";
        assert_eq!(Dpkg.parse(out), ["curl", "git"]);
    }

    #[test]
    fn test_brew_lines() {
        assert_eq!(Brew.parse("bat\n\n  fd  \nripgrep\n"), ["bat", "fd", "ripgrep"]);
    }

    #[test]
    fn test_pipx_package_lines() {
        let out = "venvs are in /home/u/.local/pipx/venvs\n\
                   package black 24.1.0, installed using Python 3.11\n  - black\n  - blackd\n";
        assert_eq!(Pipx.parse(out), ["black", "blackd"]);
    }

    #[test]
    fn test_cargo_headers() {
        let out = "ripgrep v14.1.0:\n    rg\ncargo-edit v0.12.2:\n    cargo-add\n    cargo-rm\n";
        assert_eq!(CargoInstall.parse(out), ["ripgrep", "cargo-edit"]);
    }

    #[test]
    fn test_npm_names() {
        let out = "/usr/local/lib\n├── npm@10.2.4\n├── typescript@5.3.3\n└── @angular/cli@17.0.0\n";
        assert_eq!(NpmGlobal.parse(out), ["npm", "typescript", "cli"]);
    }

    #[test]
    fn test_missing_managers_contribute_nothing() {
        let runner = CannedRunner(HashMap::from([
            ("brew", "bat\n"),
            ("cargo", "ripgrep v14.1.0:\n    rg\n"),
        ]));
        let installed = installed_packages(&runner);
        assert_eq!(installed.len(), 2);
        assert!(installed.contains("bat"));
        assert!(installed.contains("ripgrep"));
        assert!(!installed.contains("rg"));
    }

    #[test]
    fn test_all_managers_absent_is_empty() {
        let runner = CannedRunner(HashMap::new());
        assert!(installed_packages(&runner).is_empty());
    }
}
