//! Installer families known to the provisioning engine
//!
//! Each variant's string form is exactly the manifest field name used for
//! that installer (`apt`, `pkg-termux`, `binary:darwin`, ...), so the same
//! identifier flows from the manifest through the plan into the runner.

use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{ProvisionError, Result};

/// A package manager or toolchain installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
pub enum Installer {
    #[strum(serialize = "apt")]
    Apt,
    #[strum(serialize = "brew")]
    Brew,
    #[strum(serialize = "pacman")]
    Pacman,
    #[strum(serialize = "apk")]
    Apk,
    #[strum(serialize = "dnf")]
    Dnf,
    #[strum(serialize = "zypper")]
    Zypper,
    #[strum(serialize = "yum")]
    Yum,
    #[strum(serialize = "scoop")]
    Scoop,
    #[strum(serialize = "choco")]
    Choco,
    #[strum(serialize = "go")]
    Go,
    #[strum(serialize = "cargo")]
    Cargo,
    #[strum(serialize = "pipx")]
    Pipx,
    #[strum(serialize = "npm")]
    Npm,
    #[strum(serialize = "cask")]
    Cask,
    #[strum(serialize = "flatpak")]
    Flatpak,
    #[strum(serialize = "snap")]
    Snap,
    #[strum(serialize = "port")]
    Port,
    #[strum(serialize = "yay")]
    Yay,
    #[strum(serialize = "pkg")]
    Pkg,
    #[strum(serialize = "pkg-termux")]
    PkgTermux,
    #[strum(serialize = "emerge")]
    Emerge,
    #[strum(serialize = "nix")]
    Nix,
    #[strum(serialize = "nix-env")]
    NixEnv,
    #[strum(serialize = "mas")]
    Mas,
    #[strum(serialize = "xbps")]
    Xbps,
    #[strum(serialize = "binary:darwin")]
    BinaryDarwin,
    #[strum(serialize = "binary:linux")]
    BinaryLinux,
    #[strum(serialize = "binary:windows")]
    BinaryWindows,
}

/// Installer preference used when no order is configured.
pub const DEFAULT_INSTALLER_ORDER: &[Installer] = &[
    Installer::Apt,
    Installer::Brew,
    Installer::Pacman,
    Installer::Apk,
    Installer::Dnf,
    Installer::Zypper,
    Installer::Scoop,
    Installer::Choco,
    Installer::Go,
    Installer::Cargo,
    Installer::Pipx,
    Installer::Cask,
    Installer::Flatpak,
    Installer::Snap,
    Installer::Port,
    Installer::Yay,
    Installer::Pkg,
    Installer::Emerge,
    Installer::Nix,
    Installer::Mas,
    Installer::Xbps,
    Installer::BinaryDarwin,
    Installer::BinaryLinux,
    Installer::BinaryWindows,
];

impl Installer {
    /// Manifest field name / runner command identifier.
    pub fn id(self) -> &'static str {
        self.into()
    }

    /// System package managers whose manifest values are sometimes authored
    /// as full command fragments (`apt-get install -y foo`).
    pub fn is_line_oriented(self) -> bool {
        matches!(
            self,
            Self::Apt | Self::Apk | Self::Dnf | Self::Zypper | Self::Yum
        )
    }

    /// Subcommand passed ahead of the package argument, if any.
    pub fn verb(self) -> Option<&'static str> {
        match self {
            Self::Brew | Self::Cask | Self::Go | Self::Cargo | Self::Pipx | Self::Npm => {
                Some("install")
            }
            _ => None,
        }
    }

    /// Arguments handed to the command runner for one package.
    pub fn invocation_args(self, package: &str) -> Vec<String> {
        match self.verb() {
            Some(verb) => vec![verb.to_string(), package.to_string()],
            None => vec![package.to_string()],
        }
    }

    /// Normalize a resolved manifest value into the package argument.
    ///
    /// Line-oriented managers keep only the last whitespace-delimited token.
    pub fn normalize_package(self, value: &str) -> String {
        if self.is_line_oriented() && value.contains(char::is_whitespace) {
            if let Some(last) = value.split_whitespace().last() {
                return last.to_string();
            }
        }
        value.to_string()
    }
}

/// Parse a configured installer order, rejecting unknown identifiers.
pub fn parse_installer_order<S: AsRef<str>>(names: &[S]) -> Result<Vec<Installer>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim();
            Installer::from_str(name)
                .map_err(|_| ProvisionError::UnknownInstaller(name.to_string()))
        })
        .collect()
}
