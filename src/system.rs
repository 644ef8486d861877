//! Host environment probe
//!
//! Reports the OS family, CPU architecture, distribution identifier and
//! headless state that installer resolution keys on. Values use the
//! spellings manifest authors write in composite keys (`linux`, `darwin`,
//! `x64`, `arm64`, `debian`, ...).

use std::fmt;
use std::fs;
use std::path::Path;

/// Read-only view of the environment the provisioner runs on.
pub trait SystemInfo {
    /// Operating system family (`linux`, `darwin`, `windows`).
    fn os(&self) -> &str;
    /// CPU architecture (`x64`, `arm64`, ...).
    fn arch(&self) -> &str;
    /// Distribution identifier (`debian`, `fedora`, `darwin`, ...).
    fn id(&self) -> &str;
    /// True when there is no graphical display.
    fn is_headless(&self) -> bool;
}

/// Fixed probe values, used for tests and explicit CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticSystem {
    pub os: String,
    pub arch: String,
    pub id: String,
    pub headless: bool,
}

impl StaticSystem {
    pub fn new(os: &str, arch: &str, id: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            id: id.to_string(),
            headless: false,
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

impl SystemInfo for StaticSystem {
    fn os(&self) -> &str {
        &self.os
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_headless(&self) -> bool {
        self.headless
    }
}

/// Probe of the machine the binary is running on.
///
/// Detection happens once in `detect()`; the accessors are plain reads.
#[derive(Debug, Clone)]
pub struct HostSystem {
    inner: StaticSystem,
}

impl HostSystem {
    /// Detect the host environment. Never fails: an unreadable
    /// `/etc/os-release` falls back to the OS family as the identifier.
    pub fn detect() -> Self {
        let os = os_family(std::env::consts::OS);
        let arch = normalize_arch(std::env::consts::ARCH);
        let id = match os.as_str() {
            "linux" => read_os_release_id(Path::new("/etc/os-release")).unwrap_or_else(|| os.clone()),
            _ => os.clone(),
        };
        let headless = detect_headless(&os);

        tracing::info!(
            "System detection: os={}, arch={}, id={}, headless={}",
            os,
            arch,
            id,
            headless
        );

        Self {
            inner: StaticSystem {
                os,
                arch: arch.to_string(),
                id,
                headless,
            },
        }
    }

    /// Force the headless flag (e.g. from configuration).
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.inner.headless = headless;
        self
    }
}

impl SystemInfo for HostSystem {
    fn os(&self) -> &str {
        self.inner.os()
    }

    fn arch(&self) -> &str {
        self.inner.arch()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn is_headless(&self) -> bool {
        self.inner.is_headless()
    }
}

impl fmt::Display for HostSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}){}",
            self.inner.id,
            self.inner.os,
            self.inner.arch,
            if self.inner.headless { " headless" } else { "" }
        )
    }
}

fn os_family(target_os: &str) -> String {
    match target_os {
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

/// Map Rust target architectures to the names used in manifests.
pub fn normalize_arch(target_arch: &str) -> &str {
    match target_arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

fn read_os_release_id(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    parse_os_release_id(&content)
}

/// Extract the `ID=` value from os-release content.
pub fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .find(|value| !value.is_empty())
}

fn detect_headless(os: &str) -> bool {
    if os != "linux" {
        return false;
    }
    let has_display = |name: &str| std::env::var_os(name).is_some_and(|v| !v.is_empty());
    !has_display("DISPLAY") && !has_display("WAYLAND_DISPLAY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_id() {
        let content = "NAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\nID=debian\nID_LIKE=\"\"\n";
        assert_eq!(parse_os_release_id(content), Some("debian".to_string()));

        let quoted = "ID=\"fedora\"\n";
        assert_eq!(parse_os_release_id(quoted), Some("fedora".to_string()));

        assert_eq!(parse_os_release_id("ID_LIKE=arch\n"), None);
    }

    #[test]
    fn test_normalize_arch() {
        assert_eq!(normalize_arch("x86_64"), "x64");
        assert_eq!(normalize_arch("aarch64"), "arm64");
        assert_eq!(normalize_arch("riscv64"), "riscv64");
    }

    #[test]
    fn test_os_family() {
        assert_eq!(os_family("macos"), "darwin");
        assert_eq!(os_family("linux"), "linux");
        assert_eq!(os_family("windows"), "windows");
    }

    #[test]
    fn test_static_system_accessors() {
        let sys = StaticSystem::new("linux", "x64", "debian").headless(true);
        assert_eq!(sys.os(), "linux");
        assert_eq!(sys.arch(), "x64");
        assert_eq!(sys.id(), "debian");
        assert!(sys.is_headless());
    }

    #[test]
    fn test_host_headless_override() {
        let host = HostSystem::detect().with_headless(true);
        assert!(host.is_headless());
        assert!(!host.os().is_empty());
    }
}
