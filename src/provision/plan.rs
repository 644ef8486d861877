use std::fmt;

use super::{InstallInstruction, Provisioner, expand_deps, resolve_field};
use crate::detect::InstalledPackages;
use crate::error::Result;
use crate::installer::Installer;
use crate::manifest::SoftwareEntry;
use crate::runner::CommandRunner;
use crate::system::SystemInfo;

/// Why a requested key produced no instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Installed,
    Headless,
    NotLazy,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Installed => "already installed",
            Self::Headless => "headless mode",
            Self::NotLazy => "not marked lazy",
        })
    }
}

impl<S: SystemInfo, R: CommandRunner> Provisioner<S, R> {
    /// Build the ordered instruction list for `keys` and their dependencies.
    ///
    /// Fails only when a key (requested or transitive) is missing from the
    /// manifest; nothing is planned in that case.
    pub fn plan_provision<K: AsRef<str>>(
        &self,
        keys: &[K],
        installed: &InstalledPackages,
    ) -> Result<Vec<InstallInstruction>> {
        self.section("Planning");
        let ordered = expand_deps(&self.manifest, keys)?;

        let mut plan = Vec::new();
        for key in &ordered {
            let Some(entry) = self.manifest.get(key) else {
                continue;
            };
            if let Some(reason) = self.skip_reason(key, entry, installed) {
                self.note(&format!("Skipping {}: {}", key, reason));
                continue;
            }

            let before = plan.len();
            plan.extend(entry.scripts().iter().map(InstallInstruction::script));
            if let Some(inst) = self.select_installer(entry) {
                plan.push(inst);
            }
            if plan.len() == before {
                tracing::debug!("{} has no installer for {}", key, self.system.os());
            }
            for inst in &plan[before..] {
                self.note(&format!("Will install: {}", inst));
            }
        }

        tracing::info!("Planned {} instruction(s) for {} key(s)", plan.len(), ordered.len());
        Ok(plan)
    }

    /// First skip rule that excludes `key`, if any.
    pub fn skip_reason(
        &self,
        key: &str,
        entry: &SoftwareEntry,
        installed: &InstalledPackages,
    ) -> Option<SkipReason> {
        if installed.contains(key) {
            Some(SkipReason::Installed)
        } else if self.system.is_headless() && !entry.app().is_empty() {
            Some(SkipReason::Headless)
        } else if self.lazy_only && !entry.is_lazy() {
            Some(SkipReason::NotLazy)
        } else {
            None
        }
    }

    /// The package instruction for the first installer in preference order
    /// that has a value on this platform.
    pub fn select_installer(&self, entry: &SoftwareEntry) -> Option<InstallInstruction> {
        let platform = self.platform();
        self.installer_order.iter().find_map(|&installer: &Installer| {
            resolve_field(entry, installer.id(), None, &platform).map(|value| {
                InstallInstruction::package(installer, installer.normalize_package(value))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::manifest::Manifest;
    use crate::provision::InstructionKind;
    use crate::runner::DryRunRunner;
    use crate::system::StaticSystem;

    fn debian() -> StaticSystem {
        StaticSystem::new("linux", "x64", "debian")
    }

    fn chain() -> Manifest {
        [
            ("a", SoftwareEntry::new().with_deps(["b", "c"]).with_field("apt", "a")),
            ("b", SoftwareEntry::new().with_deps(["c"]).with_field("apt", "b")),
            ("c", SoftwareEntry::new().with_field("apt", "c")),
        ]
        .into_iter()
        .collect()
    }

    fn packages(plan: &[InstallInstruction]) -> Vec<&str> {
        plan.iter().map(|i| i.package.as_str()).collect()
    }

    #[test]
    fn test_installed_key_is_skipped_but_its_deps_are_not() {
        let p = Provisioner::new(debian(), chain(), DryRunRunner::new());
        let installed: InstalledPackages = ["b"].into_iter().collect();
        let plan = p.plan_provision(&["a"], &installed).unwrap();
        assert_eq!(packages(&plan), ["c", "a"]);
    }

    #[test]
    fn test_scripts_come_before_package() {
        let manifest: Manifest = [(
            "tool",
            SoftwareEntry::new()
                .with_scripts(["echo one", "echo two"])
                .with_field("brew", "tool")
                .with_field("apt", "tool"),
        )]
        .into_iter()
        .collect();
        let p = Provisioner::new(debian(), manifest, DryRunRunner::new());
        let plan = p.plan_provision(&["tool"], &InstalledPackages::new()).unwrap();

        assert_eq!(plan.len(), 3);
        assert!(plan[0].is_script() && plan[1].is_script());
        assert_eq!(plan[0].package, "echo one");
        // apt precedes brew in the default order
        assert_eq!(plan[2].kind, InstructionKind::Installer(Installer::Apt));
    }

    #[test]
    fn test_custom_order_changes_selection() {
        let manifest: Manifest = [(
            "tool",
            SoftwareEntry::new().with_field("brew", "tool").with_field("apt", "tool"),
        )]
        .into_iter()
        .collect();
        let p = Provisioner::new(debian(), manifest, DryRunRunner::new())
            .with_installer_order(vec![Installer::Apt, Installer::Brew]);
        let plan = p.plan_provision(&["tool"], &InstalledPackages::new()).unwrap();
        assert_eq!(plan, [InstallInstruction::package(Installer::Apt, "tool")]);
    }

    #[test]
    fn test_headless_skips_gui_apps() {
        let manifest: Manifest = [
            ("gimp", SoftwareEntry::new().with_app("GIMP").with_field("flatpak", "org.gimp.GIMP")),
            ("jq", SoftwareEntry::new().with_field("apt", "jq")),
        ]
        .into_iter()
        .collect();
        let p = Provisioner::new(debian().headless(true), manifest, DryRunRunner::new());
        let plan = p
            .plan_provision(&["gimp", "jq"], &InstalledPackages::new())
            .unwrap();
        assert_eq!(packages(&plan), ["jq"]);
    }

    #[test]
    fn test_lazy_only_keeps_lazy_entries() {
        let manifest: Manifest = [
            ("eager", SoftwareEntry::new().with_field("apt", "eager")),
            ("later", SoftwareEntry::new().lazy(true).with_field("apt", "later")),
        ]
        .into_iter()
        .collect();
        let p = Provisioner::new(debian(), manifest, DryRunRunner::new()).lazy_only(true);
        let plan = p
            .plan_provision(&["eager", "later"], &InstalledPackages::new())
            .unwrap();
        assert_eq!(packages(&plan), ["later"]);
    }

    #[test]
    fn test_platform_override_wins() {
        let entry = SoftwareEntry::new()
            .with_field("apt:debian:x64", "foo-x64")
            .with_field("apt", "foo");
        let manifest: Manifest = [("foo", entry)].into_iter().collect();

        let p = Provisioner::new(debian(), manifest.clone(), DryRunRunner::new());
        let plan = p.plan_provision(&["foo"], &InstalledPackages::new()).unwrap();
        assert_eq!(packages(&plan), ["foo-x64"]);

        let p = Provisioner::new(
            StaticSystem::new("linux", "x64", "ubuntu"),
            manifest,
            DryRunRunner::new(),
        );
        let plan = p.plan_provision(&["foo"], &InstalledPackages::new()).unwrap();
        assert_eq!(packages(&plan), ["foo"]);
    }

    #[test]
    fn test_line_oriented_value_is_reduced_to_last_token() {
        let manifest: Manifest = [(
            "node",
            SoftwareEntry::new().with_field("apt", "-t bookworm-backports nodejs"),
        )]
        .into_iter()
        .collect();
        let p = Provisioner::new(debian(), manifest, DryRunRunner::new());
        let plan = p.plan_provision(&["node"], &InstalledPackages::new()).unwrap();
        assert_eq!(packages(&plan), ["nodejs"]);
    }

    #[test]
    fn test_unknown_key_produces_no_plan() {
        let p = Provisioner::new(debian(), chain(), DryRunRunner::new());
        let err = p
            .plan_provision(&["a", "missing"], &InstalledPackages::new())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownKey(key) if key == "missing"));
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Installed.to_string(), "already installed");
        assert_eq!(SkipReason::NotLazy.to_string(), "not marked lazy");
    }
}
