//! Post-install PATH wrappers
//!
//! Flatpak apps and macOS app bundles do not put a binary on `PATH`. For
//! entries that name one via `_bin`, a small launcher script is written to
//! `~/.local/bin/<family>/<bin>`:
//!
//! ```text
//! #!/usr/bin/env bash
//! exec flatpak run org.gimp.GIMP "$@"
//! ```
//!
//! All writes go through the command runner, so dry-run mode only reports
//! them. Rewriting an existing wrapper produces identical content.

use std::path::{Component, Path, PathBuf};

use super::{Provisioner, resolve_field};
use crate::manifest::SoftwareEntry;
use crate::runner::CommandRunner;
use crate::system::SystemInfo;

const SHEBANG: &str = "#!/usr/bin/env bash";

/// Filesystem locations used by the wrapper generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperPaths {
    /// Parent of the per-family wrapper directories (`~/.local/bin`).
    pub bin_root: PathBuf,
    /// Searched first for app bundles.
    pub system_applications: PathBuf,
    /// Searched when the bundle is not in `system_applications`.
    pub user_applications: PathBuf,
}

impl WrapperPaths {
    pub fn for_home(home: &Path) -> Self {
        Self {
            bin_root: home.join(".local").join("bin"),
            system_applications: PathBuf::from("/Applications"),
            user_applications: home.join("Applications"),
        }
    }

    pub fn for_current_user() -> Self {
        Self::for_home(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Directory holding one wrapper family (`flatpak`, `cask`).
    pub fn wrapper_dir(&self, family: &str) -> PathBuf {
        self.bin_root.join(family)
    }

    fn find_app(&self, app: &str) -> Option<PathBuf> {
        [&self.system_applications, &self.user_applications]
            .into_iter()
            .map(|dir| dir.join(app))
            .find(|path| path.exists())
    }
}

impl<S: SystemInfo, R: CommandRunner> Provisioner<S, R> {
    /// Write wrappers for every manifest entry that needs one.
    ///
    /// Returns the wrapper paths written. An app bundle that cannot be
    /// found is treated as not installed yet and skipped without error.
    pub fn post_install(&self) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for (key, entry) in self.manifest.iter() {
            for (family, exec_line) in [
                ("flatpak", self.flatpak_exec(entry)),
                ("cask", self.cask_exec(entry)),
            ] {
                let Some((bin, exec_line)) = exec_line else {
                    continue;
                };
                let Some(bin) = wrapper_name(bin) else {
                    tracing::warn!("Ignoring {} wrapper for {}: invalid _bin {:?}", family, key, bin);
                    continue;
                };
                let path = self.wrapper_paths.wrapper_dir(family).join(bin);
                match self.write_wrapper(&path, &exec_line) {
                    Ok(()) => {
                        tracing::info!("Wrote {} wrapper for {}: {}", family, key, path.display());
                        written.push(path);
                    }
                    Err(e) => tracing::warn!("Could not write wrapper {}: {:#}", path.display(), e),
                }
            }
        }
        written
    }

    /// `(bin, exec line)` for a flatpak entry with a `_bin`.
    fn flatpak_exec<'e>(&self, entry: &'e SoftwareEntry) -> Option<(&'e str, String)> {
        let platform = self.platform();
        let app_id = resolve_field(entry, "flatpak", None, &platform).filter(|v| !v.is_empty())?;
        let bin = resolve_field(entry, "_bin", Some("flatpak"), &platform)
            .filter(|v| !v.is_empty())?;
        let app_id = match shlex::try_quote(app_id) {
            Ok(quoted) => quoted,
            Err(e) => {
                tracing::warn!("Cannot quote flatpak id {:?}: {}", app_id, e);
                return None;
            }
        };
        Some((bin, format!("exec flatpak run {} \"$@\"", app_id)))
    }

    /// `(bin, exec line)` for a cask (or macOS app) entry whose bundle exists.
    fn cask_exec<'e>(&self, entry: &'e SoftwareEntry) -> Option<(&'e str, String)> {
        let platform = self.platform();
        let is_cask = resolve_field(entry, "cask", None, &platform).is_some()
            || (self.system.os() == "darwin" && !entry.app().is_empty());
        if !is_cask {
            return None;
        }
        let bin = resolve_field(entry, "_bin", Some("cask"), &platform)
            .filter(|v| !v.is_empty())?;
        let app = resolve_field(entry, "_app", Some("cask"), &platform)
            .filter(|v| !v.is_empty())?;
        let Some(app_path) = self.wrapper_paths.find_app(app) else {
            tracing::debug!("{} not found in Applications; skipping wrapper", app);
            return None;
        };
        let app_path = app_path.to_string_lossy();
        let quoted = match shlex::try_quote(&app_path) {
            Ok(quoted) => quoted,
            Err(e) => {
                tracing::warn!("Cannot quote app path {}: {}", app_path, e);
                return None;
            }
        };
        Some((bin, format!("exec open {} --args \"$@\"", quoted)))
    }

    fn write_wrapper(&self, path: &Path, exec_line: &str) -> anyhow::Result<()> {
        let target = path.to_string_lossy();
        if let Some(dir) = path.parent() {
            self.runner.run("mkdir", &["-p", &dir.to_string_lossy()])?;
        }
        self.runner.run(
            "sh",
            &[
                "-c",
                r#"printf '%s\n' "$1" "$2" > "$3""#,
                "sh",
                SHEBANG,
                exec_line,
                &target,
            ],
        )?;
        self.runner.run("chmod", &["+x", &target])
    }
}

/// `bin` if it names a single file inside the wrapper directory.
fn wrapper_name(bin: &str) -> Option<&str> {
    if bin.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(bin).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(bin),
        _ => None,
    }
}
