//! alacarte library
//!
//! Provisioning engine that turns a declarative software manifest into
//! native package manager installs: dependency expansion, per-platform
//! installer resolution, installed-package detection, plan execution and
//! post-install PATH wrappers.

pub mod cli;
pub mod config_file;
pub mod detect;
pub mod error;
pub mod events;
pub mod installer;
pub mod manifest;
#[cfg(unix)]
pub mod process_guard;
pub mod provision;
pub mod runner;
pub mod selection;
pub mod system;

// Re-export main types for convenience
pub use config_file::ProvisionConfig;
pub use detect::{InstalledPackages, installed_packages};
pub use error::{InstructionFailure, ProvisionError, Result};
pub use events::{EventSink, LogEvent, LogLevel};
pub use installer::{DEFAULT_INSTALLER_ORDER, Installer};
pub use manifest::{Manifest, SoftwareEntry, StringList};
#[cfg(unix)]
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use provision::{
    InstallInstruction, InstructionKind, Provisioner, SkipReason, WrapperPaths, expand_deps,
};
pub use runner::{CommandRunner, DryRunRunner, ProcessRunner, ScriptExecutor};
pub use selection::KeySelection;
pub use system::{HostSystem, StaticSystem, SystemInfo};
