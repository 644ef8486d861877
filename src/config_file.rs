//! Provisioner configuration file.
//!
//! A small JSON document telling the CLI where the manifest lives and how
//! to run. Every field is optional in the file; missing ones take the
//! defaults below.
//!
//! ```json
//! {
//!   "manifest_path": "software.yml",
//!   "installer_order": ["brew", "apt", "cargo"],
//!   "log_file": "/tmp/alacarte.log",
//!   "lazy_only": false,
//!   "template_command": ["chezmoi", "execute-template"],
//!   "headless": null
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::installer::{Installer, parse_installer_order};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ALACARTE_CONFIG";
/// Manifest used when the config does not name one.
pub const DEFAULT_MANIFEST: &str = "software.yml";

/// Settings for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub manifest_path: PathBuf,
    /// Installer ids, most preferred first. `None` keeps the built-in order.
    pub installer_order: Option<Vec<String>>,
    /// Append every invocation (and `[ERROR]` lines) here.
    pub log_file: Option<PathBuf>,
    pub lazy_only: bool,
    /// Script renderer argv. `None` uses the default renderer.
    pub template_command: Option<Vec<String>>,
    /// Force headless on or off instead of probing the display.
    pub headless: Option<bool>,

    /// File this config was loaded from, for resolving relative paths.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST),
            installer_order: None,
            log_file: None,
            lazy_only: false,
            template_command: None,
            headless: None,
            source: None,
        }
    }
}

impl ProvisionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$XDG_CONFIG_HOME/alacarte/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("alacarte").join("config.json"))
    }

    /// Locate and load the active configuration.
    ///
    /// Precedence: `explicit` (the `--config` flag), then `$ALACARTE_CONFIG`,
    /// then the default path if it exists, then built-in defaults. A file
    /// named explicitly or by the environment must exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::load_from_file(PathBuf::from(path));
        }
        match Self::default_path().filter(|p| p.is_file()) {
            Some(path) => Self::load_from_file(path),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to a JSON file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, json).map_err(|e| {
            ProvisionError::config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Load configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ProvisionError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| {
            ProvisionError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.source = Some(path.to_path_buf());
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_path.as_os_str().is_empty() {
            return Err(ProvisionError::config("manifest_path must not be empty"));
        }
        self.installer_order()?;
        if matches!(&self.template_command, Some(argv) if argv.iter().all(|a| a.trim().is_empty()))
        {
            return Err(ProvisionError::config(
                "template_command must name a program (omit it to use the default)",
            ));
        }
        Ok(())
    }

    /// Configured installer order, or empty for the built-in default.
    pub fn installer_order(&self) -> Result<Vec<Installer>> {
        match &self.installer_order {
            Some(names) => parse_installer_order(names),
            None => Ok(Vec::new()),
        }
    }

    /// The manifest path, relative paths taken from the config file's
    /// directory.
    pub fn resolve_manifest_path(&self) -> PathBuf {
        if self.manifest_path.is_absolute() {
            return self.manifest_path.clone();
        }
        match self.source.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(&self.manifest_path),
            None => self.manifest_path.clone(),
        }
    }
}
