//! Software manifest model
//!
//! A manifest maps a logical key (`ripgrep`, `docker`, ...) to one
//! [`SoftwareEntry`]. Each entry keeps every key it was authored with in an
//! ordered mapping, so composite overrides such as `apt:debian:x64` or
//! `_bin:flatpak` are looked up in the same place as plain installer fields.
//! The well-known metadata keys are additionally decoded into [`EntryMeta`].
//!
//! ```yaml
//! ripgrep:
//!   _name: ripgrep
//!   _bin: rg
//!   _deps: [build-essential]
//!   apt: ripgrep
//!   apt:debian:x64: ripgrep-x64
//!   brew: ripgrep
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ProvisionError, Result};
use crate::installer::Installer;

/// A field authored either as one string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct StringList(Vec<String>);

impl StringList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Normalize a YAML value: a string becomes a one-element list, a
    /// sequence keeps its string elements, null becomes empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::default()),
            Value::String(s) => Some(Self(vec![s.clone()])),
            Value::Sequence(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            None => Self::default(),
            Some(OneOrMany::One(s)) => Self(vec![s]),
            Some(OneOrMany::Many(v)) => Self(v),
        })
    }
}

impl From<&str> for StringList {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for StringList {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for StringList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<S: Into<String>> FromIterator<S> for StringList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Typed view of an entry's metadata keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EntryMeta {
    #[serde(rename = "_name")]
    pub name: String,
    #[serde(rename = "_short")]
    pub short: String,
    #[serde(rename = "_desc")]
    pub desc: String,
    #[serde(rename = "_docs")]
    pub docs: String,
    #[serde(rename = "_github")]
    pub github: String,
    #[serde(rename = "_home")]
    pub home: String,
    #[serde(rename = "_bin")]
    pub bin: StringList,
    #[serde(rename = "_groups")]
    pub groups: StringList,
    #[serde(rename = "_deps")]
    pub deps: StringList,
    /// GUI application marker; non-empty means the entry needs a display.
    #[serde(rename = "_app")]
    pub app: String,
    /// Only installed in lazy-only runs.
    #[serde(rename = "_lazy")]
    pub lazy: bool,
    /// Literal shell snippets, run before the package-manager install.
    pub script: StringList,
}

impl EntryMeta {
    fn from_fields(fields: &Mapping) -> Result<Self> {
        let known: Mapping = fields
            .iter()
            .filter(|(k, _)| k.as_str().is_some_and(is_meta_key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_yaml::from_value(Value::Mapping(known)).map_err(ProvisionError::from)
    }
}

fn is_meta_key(key: &str) -> bool {
    matches!(
        key,
        "_name"
            | "_short"
            | "_desc"
            | "_docs"
            | "_github"
            | "_home"
            | "_bin"
            | "_groups"
            | "_deps"
            | "_app"
            | "_lazy"
            | "script"
    )
}

/// One logical software item.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "Mapping")]
pub struct SoftwareEntry {
    meta: EntryMeta,
    fields: Mapping,
}

impl TryFrom<Mapping> for SoftwareEntry {
    type Error = ProvisionError;

    fn try_from(fields: Mapping) -> Result<Self> {
        let meta = EntryMeta::from_fields(&fields)?;
        Ok(Self { meta, fields })
    }
}

impl SoftwareEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    /// Ordered mapping of every authored key to its value.
    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    /// Look up one exact (possibly composite) key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Package names authored for an installer's plain field.
    pub fn packages(&self, installer: Installer) -> StringList {
        self.field(installer.id())
            .and_then(StringList::from_value)
            .unwrap_or_default()
    }

    pub fn deps(&self) -> &StringList {
        &self.meta.deps
    }

    pub fn scripts(&self) -> &StringList {
        &self.meta.script
    }

    pub fn app(&self) -> &str {
        &self.meta.app
    }

    pub fn is_lazy(&self) -> bool {
        self.meta.lazy
    }

    pub fn groups(&self) -> &StringList {
        &self.meta.groups
    }

    /// Set any key. Metadata keys also refresh the typed view.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(Value::from(key), value.into());
        if is_meta_key(key) {
            match EntryMeta::from_fields(&self.fields) {
                Ok(meta) => self.meta = meta,
                Err(e) => tracing::warn!("Ignoring malformed metadata key {}: {}", key, e),
            }
        }
        self
    }

    pub fn with_deps<I, S>(self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_field("_deps", string_seq(deps))
    }

    pub fn with_scripts<I, S>(self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_field("script", string_seq(scripts))
    }

    pub fn with_groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_field("_groups", string_seq(groups))
    }

    pub fn with_app(self, app: &str) -> Self {
        self.with_field("_app", app)
    }

    pub fn lazy(self, lazy: bool) -> Self {
        self.with_field("_lazy", lazy)
    }
}

fn string_seq<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Sequence(items.into_iter().map(|s| Value::String(s.into())).collect())
}

/// Mapping from logical key to software entry.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, SoftwareEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ProvisionError::manifest(format!("failed to read {}: {}", path.display(), e))
        })?;
        let manifest = Self::from_yaml_str(&content)?;
        tracing::debug!(
            "Loaded manifest {} with {} entries",
            path.display(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Parse a manifest from YAML text. An empty document is an empty manifest.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn get(&self, key: &str) -> Option<&SoftwareEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: SoftwareEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SoftwareEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, SoftwareEntry)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (K, SoftwareEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
testapp:
  _bin: testapp
  _desc: Test app description
  _docs: https://example.com/docs
  _github: https://github.com/example/testapp
  _home: https://example.com
  _name: TestApp
  _short: A test app
  _groups: [cli, dev]
  brew: testapp
  apt: testapp
  apt:debian:x64: testapp-x64
  pacman: testapp
  go: github.com/example/testapp@
  snap: [testapp, testapp-extra]
guiapp:
  _app: GuiApp.app
  _lazy: true
  _deps: testapp
  script: echo hello
  cask: guiapp
  _bin:cask: guiapp
"#;

    #[test]
    fn test_load_manifest_from_yaml() {
        let manifest = Manifest::from_yaml_str(SAMPLE_YAML).unwrap();
        assert_eq!(manifest.len(), 2);

        let entry = manifest.get("testapp").unwrap();
        assert_eq!(entry.meta().name, "TestApp");
        assert_eq!(entry.meta().bin.as_slice(), ["testapp"]);
        assert_eq!(entry.groups().as_slice(), ["cli", "dev"]);
        assert_eq!(entry.packages(Installer::Snap).len(), 2);
        assert_eq!(
            entry.field("apt:debian:x64").and_then(Value::as_str),
            Some("testapp-x64")
        );
    }

    #[test]
    fn test_scalar_fields_normalize_to_lists() {
        let manifest = Manifest::from_yaml_str(SAMPLE_YAML).unwrap();
        let entry = manifest.get("guiapp").unwrap();
        assert_eq!(entry.deps().as_slice(), ["testapp"]);
        assert_eq!(entry.scripts().as_slice(), ["echo hello"]);
        assert_eq!(entry.app(), "GuiApp.app");
        assert!(entry.is_lazy());
        assert!(entry.field("_bin:cask").is_some());
    }

    #[test]
    fn test_fields_keep_authored_order() {
        let manifest = Manifest::from_yaml_str(SAMPLE_YAML).unwrap();
        let keys: Vec<&str> = manifest
            .get("guiapp")
            .unwrap()
            .fields()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, ["_app", "_lazy", "_deps", "script", "cask", "_bin:cask"]);
    }

    #[test]
    fn test_empty_document_is_empty_manifest() {
        assert!(Manifest::from_yaml_str("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_metadata_is_rejected() {
        let err = Manifest::from_yaml_str("bad:\n  _deps: {a: 1}\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Manifest::load("/nonexistent/software.yml").unwrap_err();
        assert!(matches!(err, ProvisionError::Manifest(_)));
    }

    #[test]
    fn test_builder_keeps_meta_in_sync() {
        let entry = SoftwareEntry::new()
            .with_field("apt", "foo")
            .with_deps(["bar"])
            .with_scripts(["echo one", "echo two"])
            .with_app("Foo.app")
            .lazy(true);
        assert_eq!(entry.deps().as_slice(), ["bar"]);
        assert_eq!(entry.scripts().len(), 2);
        assert_eq!(entry.app(), "Foo.app");
        assert!(entry.is_lazy());
        assert_eq!(entry.packages(Installer::Apt).first(), Some("foo"));
        assert_eq!(entry.field("_app").and_then(Value::as_str), Some("Foo.app"));
    }

    #[test]
    fn test_string_list_from_value() {
        assert_eq!(
            StringList::from_value(&Value::from("a")),
            Some(StringList::from("a"))
        );
        assert_eq!(StringList::from_value(&Value::from(3)), None);
        assert_eq!(StringList::from_value(&Value::Null), Some(StringList::new()));
    }
}
