//! Composite-key resolution
//!
//! Finds the most specific value for a field on the current platform. With
//! prefix `apt` on a Debian x64 host the lookup order is:
//!
//! | Key                  |
//! |----------------------|
//! | `apt:debian:x64`     |
//! | `apt:debian`         |
//! | `apt:linux:x64`      |
//! | `apt:linux`          |
//! | `apt:x64`            |
//! | `apt`                |
//!
//! When an installer is given (`_bin` + `flatpak`), each key carries the
//! installer segment after the prefix and the bare prefix is the final
//! fallback.

use serde_yaml::Value;

use crate::manifest::SoftwareEntry;
use crate::system::SystemInfo;

/// Platform coordinates used to build composite keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform<'a> {
    pub id: &'a str,
    pub os: &'a str,
    pub arch: &'a str,
}

impl<'a> Platform<'a> {
    pub fn of<S: SystemInfo + ?Sized>(system: &'a S) -> Self {
        Self {
            id: system.id(),
            os: system.os(),
            arch: system.arch(),
        }
    }

    /// Candidate keys, most specific first.
    pub fn candidate_keys(&self, prefix: &str, installer: Option<&str>) -> Vec<String> {
        let head = match installer {
            Some(installer) => format!("{prefix}:{installer}"),
            None => prefix.to_string(),
        };
        let mut keys = vec![
            format!("{head}:{}:{}", self.id, self.arch),
            format!("{head}:{}", self.id),
            format!("{head}:{}:{}", self.os, self.arch),
            format!("{head}:{}", self.os),
            format!("{head}:{}", self.arch),
            head.clone(),
        ];
        if installer.is_some() {
            keys.push(prefix.to_string());
        }
        keys
    }
}

/// Resolve `prefix` (optionally scoped to `installer`) against an entry.
///
/// Returns the first matching key's value if it is a string, or the first
/// element of a non-empty list if that element is a string. Any other value
/// type counts as "not found" and the search moves on.
pub fn resolve_field<'e>(
    entry: &'e SoftwareEntry,
    prefix: &str,
    installer: Option<&str>,
    platform: &Platform<'_>,
) -> Option<&'e str> {
    platform
        .candidate_keys(prefix, installer)
        .iter()
        .find_map(|key| entry.field(key).and_then(first_string))
}

fn first_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Sequence(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
