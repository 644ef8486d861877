//! Dependency expansion
//!
//! Depth-first walk over `_deps`: a key is emitted after all of its
//! dependencies, each key at most once. A key reached again while it is
//! still being expanded (a cycle) is not re-entered; the walk reports the
//! cycle and carries on.

use std::collections::HashSet;

use crate::error::{ProvisionError, Result};
use crate::manifest::Manifest;

/// Expand `keys` into an install order where dependencies come first.
///
/// Fails with `ProvisionError::UnknownKey` as soon as a requested or
/// depended-upon key is missing; no partial order is returned.
pub fn expand_deps<K: AsRef<str>>(manifest: &Manifest, keys: &[K]) -> Result<Vec<String>> {
    let mut walk = Walk::default();
    for key in keys {
        walk.visit(manifest, key.as_ref())?;
    }
    Ok(walk.order)
}

#[derive(Default)]
struct Walk {
    visited: HashSet<String>,
    in_progress: HashSet<String>,
    order: Vec<String>,
}

impl Walk {
    fn visit(&mut self, manifest: &Manifest, key: &str) -> Result<()> {
        if self.visited.contains(key) {
            if self.in_progress.contains(key) {
                tracing::warn!(
                    "Dependency cycle through '{}'; installing it once without re-entering",
                    key
                );
            }
            return Ok(());
        }
        self.visited.insert(key.to_string());

        let entry = manifest
            .get(key)
            .ok_or_else(|| ProvisionError::UnknownKey(key.to_string()))?;

        self.in_progress.insert(key.to_string());
        for dep in entry.deps() {
            self.visit(manifest, dep)?;
        }
        self.in_progress.remove(key);

        self.order.push(key.to_string());
        Ok(())
    }
}
