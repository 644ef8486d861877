//! Which manifest keys a run asks for.

use crate::manifest::Manifest;

/// Requested keys, before dependency expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    /// Every key in the manifest.
    All,
    /// Every entry tagged with at least one of these `_groups`.
    Groups(Vec<String>),
    /// Exactly these keys. Unknown ones fail at planning time.
    Only(Vec<String>),
}

impl KeySelection {
    pub fn resolve(&self, manifest: &Manifest) -> Vec<String> {
        match self {
            Self::All => manifest.keys().cloned().collect(),
            Self::Groups(groups) => manifest
                .iter()
                .filter(|(_, entry)| groups.iter().any(|g| entry.groups().contains(g)))
                .map(|(key, _)| key.clone())
                .collect(),
            Self::Only(keys) => keys.clone(),
        }
    }
}

/// Split comma-separated CLI values, trimming and dropping blanks.
pub fn split_csv<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.as_ref().split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::SoftwareEntry;

    fn manifest() -> Manifest {
        [
            ("zsh", SoftwareEntry::new().with_groups(["shell"])),
            ("git", SoftwareEntry::new().with_groups(["dev", "core"])),
            ("bat", SoftwareEntry::new().with_groups(["cli"])),
            ("alacritty", SoftwareEntry::new()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_all_is_sorted() {
        assert_eq!(
            KeySelection::All.resolve(&manifest()),
            ["alacritty", "bat", "git", "zsh"]
        );
    }

    #[test]
    fn test_groups_match_any_tag() {
        let sel = KeySelection::Groups(vec!["core".into(), "shell".into()]);
        assert_eq!(sel.resolve(&manifest()), ["git", "zsh"]);
    }

    #[test]
    fn test_only_is_verbatim() {
        let sel = KeySelection::Only(vec!["zsh".into(), "ghost".into()]);
        assert_eq!(sel.resolve(&manifest()), ["zsh", "ghost"]);
    }

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv(&["a, b", "", "c,,"]), ["a", "b", "c"]);
    }
}
