use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::selection::{KeySelection, split_csv};

/// alacarte - install software from a declarative manifest
#[derive(Parser, Debug)]
#[command(name = "alacarte")]
#[command(about = "Resolve a software manifest into native package manager installs")]
#[command(version)]
pub struct Cli {
    /// Configuration file (overrides $ALACARTE_CONFIG and the XDG default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Manifest file (overrides the configured manifest_path)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Dry-run mode: show what would be installed without changing anything.
    ///
    /// Installed-package queries still run so the preview reflects the
    /// real host.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only install entries marked `_lazy`
    #[arg(long, global = true)]
    pub lazy: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan and install the selected entries (default)
    Install {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Skip writing flatpak/cask PATH wrappers afterwards
        #[arg(long)]
        no_post_install: bool,
    },
    /// Print the install plan without running it
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = PlanFormat::Text)]
        format: PlanFormat,
    },
    /// List packages the host reports as installed
    Detect,
    /// Write PATH wrappers for installed flatpak and cask apps
    Wrappers,
    /// Validate the configuration and manifest
    Validate,
}

#[derive(Args, Debug, Default, Clone)]
pub struct SelectionArgs {
    /// Every manifest entry
    #[arg(long, conflicts_with_all = ["group", "only", "keys"])]
    pub all: bool,

    /// Entries tagged with these groups (comma-separated or repeated)
    #[arg(short, long, conflicts_with_all = ["only", "keys"])]
    pub group: Vec<String>,

    /// Exactly these keys (comma-separated or repeated)
    #[arg(short, long, conflicts_with = "keys")]
    pub only: Vec<String>,

    /// Keys to install
    pub keys: Vec<String>,
}

impl SelectionArgs {
    /// The requested selection. Nothing given means everything.
    pub fn selection(&self) -> KeySelection {
        let groups = split_csv(&self.group);
        let only = split_csv(&self.only);
        let keys = split_csv(&self.keys);
        if self.all {
            KeySelection::All
        } else if !groups.is_empty() {
            KeySelection::Groups(groups)
        } else if !only.is_empty() {
            KeySelection::Only(only)
        } else if !keys.is_empty() {
            KeySelection::Only(keys)
        } else {
            KeySelection::All
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Text,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
