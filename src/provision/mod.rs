//! Provisioning engine
//!
//! Turns requested manifest keys into an ordered list of
//! [`InstallInstruction`]s and runs them through a [`CommandRunner`].
//!
//! # Flow
//!
//! 1. `expand_deps` orders keys so dependencies come first
//! 2. `plan_provision` applies skip rules and picks one installer per key
//! 3. `execute_plan` runs instructions sequentially, collecting failures
//! 4. `post_install` writes PATH wrappers for flatpak and cask apps
//!
//! The engine is synchronous: no instruction starts before the previous
//! one's process has exited.

mod execute;
mod expand;
mod plan;
mod postinstall;
mod resolve;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::InstructionFailure;
use crate::installer::{DEFAULT_INSTALLER_ORDER, Installer};
use crate::manifest::Manifest;
use crate::runner::{CommandRunner, INFO, SECTION};
use crate::system::SystemInfo;

pub use expand::expand_deps;
pub use plan::SkipReason;
pub use postinstall::WrapperPaths;
pub use resolve::{Platform, resolve_field};

/// What an instruction runs: a literal script or an installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Script,
    Installer(Installer),
}

impl InstructionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Installer(installer) => installer.id(),
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single install/provision action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallInstruction {
    pub kind: InstructionKind,
    /// Script text, or the package argument for the installer.
    pub package: String,
}

impl InstallInstruction {
    pub fn script(text: impl Into<String>) -> Self {
        Self {
            kind: InstructionKind::Script,
            package: text.into(),
        }
    }

    pub fn package(installer: Installer, package: impl Into<String>) -> Self {
        Self {
            kind: InstructionKind::Installer(installer),
            package: package.into(),
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self.kind, InstructionKind::Script)
    }
}

impl fmt::Display for InstallInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.package)
    }
}

impl Serialize for InstallInstruction {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut state = serializer.serialize_struct("InstallInstruction", 2)?;
        state.serialize_field("type", self.kind.as_str())?;
        state.serialize_field("package", &self.package)?;
        state.end()
    }
}

/// Aggregate root for one provisioning run.
///
/// Owns the environment probe, the manifest and the command runner, plus
/// the mutable run state (dry-run log, collected failures).
pub struct Provisioner<S, R> {
    system: S,
    manifest: Manifest,
    runner: R,
    installer_order: Vec<Installer>,
    lazy_only: bool,
    dry_run: bool,
    dry_run_log: Vec<String>,
    errors: Vec<InstructionFailure>,
    log_file: Option<PathBuf>,
    wrapper_paths: WrapperPaths,
}

impl<S: SystemInfo, R: CommandRunner> Provisioner<S, R> {
    pub fn new(system: S, manifest: Manifest, runner: R) -> Self {
        Self {
            system,
            manifest,
            runner,
            installer_order: DEFAULT_INSTALLER_ORDER.to_vec(),
            lazy_only: false,
            dry_run: false,
            dry_run_log: Vec::new(),
            errors: Vec::new(),
            log_file: None,
            wrapper_paths: WrapperPaths::for_current_user(),
        }
    }

    /// Replace the installer preference order. An empty order restores the
    /// default one.
    pub fn with_installer_order(mut self, order: Vec<Installer>) -> Self {
        self.installer_order = if order.is_empty() {
            DEFAULT_INSTALLER_ORDER.to_vec()
        } else {
            order
        };
        self
    }

    pub fn lazy_only(mut self, lazy_only: bool) -> Self {
        self.lazy_only = lazy_only;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_wrapper_paths(mut self, paths: WrapperPaths) -> Self {
        self.wrapper_paths = paths;
        self
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn installer_order(&self) -> &[Installer] {
        &self.installer_order
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Lines recorded instead of running commands in dry-run mode.
    pub fn dry_run_commands(&self) -> &[String] {
        &self.dry_run_log
    }

    /// Failures collected by `execute_plan` since the last `clear_errors`.
    pub fn errors(&self) -> &[InstructionFailure] {
        &self.errors
    }

    fn platform(&self) -> Platform<'_> {
        Platform::of(&self.system)
    }

    fn section(&self, title: &str) {
        if let Err(e) = self.runner.run(SECTION, &[title]) {
            tracing::debug!("Section annotation rejected: {}", e);
        }
    }

    fn note(&self, text: &str) {
        tracing::info!("{}", text);
        if let Err(e) = self.runner.run(INFO, &[text]) {
            tracing::debug!("Info annotation rejected: {}", e);
        }
    }
}
