use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the descriptor file that marks a directory as a plugin.
pub const DESCRIPTOR_FILE: &str = "plugkit.yml";

const DEFAULT_LOADER: &str = "loader";

fn default_loader() -> String {
    DEFAULT_LOADER.to_string()
}

/// Declarative description of a plugin, parsed from a `plugkit.yml` file or
/// built programmatically for registration.
///
/// Well-known fields are typed; anything else in the descriptor file lands in
/// [`extra`](Self::extra) and survives composition untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin id. Descriptors with an empty id are dropped after
    /// discovery.
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Relative capability path resolved against [`plugin_path`](Self::plugin_path)
    /// to select the loader factory.
    #[serde(default = "default_loader")]
    pub loader: String,

    /// Directory anchoring the loader path. Set from the descriptor file's
    /// own directory during discovery; required for manual registration.
    #[serde(skip_deserializing, default)]
    pub plugin_path: PathBuf,

    /// Ids this plugin depends on. Deduplicated, first occurrence wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Id of the type descriptor whose contract this plugin's exports must
    /// satisfy. Implicitly added to [`dependencies`](Self::dependencies).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,

    /// Id of the base plugin this descriptor decorates, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorates: Option<String>,

    /// Free-form descriptor fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, plugin_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            loader: default_loader(),
            plugin_path: plugin_path.into(),
            dependencies: Vec::new(),
            type_id: None,
            decorates: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_loader(mut self, loader: impl Into<String>) -> Self {
        self.loader = loader.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_decorates(mut self, decorates: impl Into<String>) -> Self {
        self.decorates = Some(decorates.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub(crate) fn parse(content: &str) -> Result<Self, serde_yaml_bw::Error> {
        serde_yaml_bw::from_str(content)
    }

    /// Folds the implicit type dependency into the dependency list and
    /// deduplicates it. Idempotent.
    pub(crate) fn normalize(&mut self) {
        if let Some(type_id) = &self.type_id {
            self.dependencies.push(type_id.clone());
        }
        let mut seen = HashSet::new();
        self.dependencies.retain(|dep| seen.insert(dep.clone()));
    }

    /// A descriptor survives discovery only with a non-empty id and loader.
    pub(crate) fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.loader.is_empty()
    }

    /// Capability key this descriptor's loader resolves to: the loader path
    /// anchored at the plugin directory, lexically normalized. The key never
    /// touches the filesystem.
    pub fn loader_key(&self) -> PathBuf {
        lexical_normalize(&self.plugin_path.join(&self.loader))
    }
}

/// Folds `.` and `..` components without consulting the filesystem, so keys
/// derived from decorator-rewritten loader paths compare equal to the base's.
pub(crate) fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if last_is_normal {
                    normalized.pop();
                } else {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Lexical relative path from `from` to `to`, the inverse of joining.
pub(crate) fn relative_from(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in shared..from.len() {
        relative.push(Component::ParentDir);
    }
    for component in &to[shared..] {
        relative.push(component);
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let descriptor = PluginDescriptor::parse("id: mango\n").unwrap();
        assert_eq!(descriptor.id, "mango");
        assert_eq!(descriptor.loader, "loader");
        assert!(descriptor.dependencies.is_empty());
        assert!(descriptor.type_id.is_none());
        assert!(descriptor.extra.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let descriptor = PluginDescriptor::parse(
            r#"
id: avocado
name: Avocado
description: A green fruit
loader: custom/loader
type: fruit
dependencies:
  - mango
sugarLevel: low
"#,
        )
        .unwrap();
        assert_eq!(descriptor.id, "avocado");
        assert_eq!(descriptor.name.as_deref(), Some("Avocado"));
        assert_eq!(descriptor.loader, "custom/loader");
        assert_eq!(descriptor.type_id.as_deref(), Some("fruit"));
        assert_eq!(descriptor.dependencies, vec!["mango"]);
        assert_eq!(
            descriptor.extra.get("sugarLevel"),
            Some(&serde_json::json!("low"))
        );
    }

    #[test]
    fn test_parse_missing_id_defaults_empty() {
        let descriptor = PluginDescriptor::parse("name: anonymous\n").unwrap();
        assert_eq!(descriptor.id, "");
        assert!(!descriptor.is_valid());
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        assert!(PluginDescriptor::parse("id: [unclosed\n").is_err());
    }

    #[test]
    fn test_normalize_adds_type_edge_and_dedups() {
        let mut descriptor = PluginDescriptor::new("avocado", "/plugins/avocado")
            .with_type("fruit")
            .with_dependencies(["mango", "mango", "fruit"]);
        descriptor.normalize();
        assert_eq!(descriptor.dependencies, vec!["mango", "fruit"]);

        // Re-applying defaults must not grow the list.
        descriptor.normalize();
        assert_eq!(descriptor.dependencies, vec!["mango", "fruit"]);
    }

    #[test]
    fn test_builder() {
        let descriptor = PluginDescriptor::new("pear", "/plugins/pear")
            .with_name("Pear")
            .with_loader("loaders/pear")
            .with_extra("shape", serde_json::json!("teardrop"));
        assert_eq!(descriptor.id, "pear");
        assert_eq!(descriptor.loader, "loaders/pear");
        assert_eq!(descriptor.extra.get("shape"), Some(&serde_json::json!("teardrop")));
        assert!(descriptor.is_valid());
    }

    #[test]
    fn test_loader_key_normalizes() {
        let native = PluginDescriptor::new("a", "/plugins/a");
        let via_sibling =
            PluginDescriptor::new("b", "/plugins/b").with_loader("../a/loader");
        assert_eq!(native.loader_key(), PathBuf::from("/plugins/a/loader"));
        assert_eq!(via_sibling.loader_key(), native.loader_key());
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(
            lexical_normalize(Path::new("a/../../b")),
            PathBuf::from("../b")
        );
    }

    #[test]
    fn test_relative_from() {
        assert_eq!(
            relative_from(Path::new("/plugins/ripe"), Path::new("/plugins/avocado")),
            PathBuf::from("../avocado")
        );
        assert_eq!(
            relative_from(Path::new("/a/b"), Path::new("/a/b/c")),
            PathBuf::from("c")
        );
        assert_eq!(relative_from(Path::new("/a/b"), Path::new("/a/b")), PathBuf::new());
    }

    #[test]
    fn test_serialize_skips_empty_optionals() {
        let descriptor = PluginDescriptor::new("kiwi", "/plugins/kiwi");
        let value = serde_json::to_value(&descriptor).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.get("id"), Some(&serde_json::json!("kiwi")));
        assert!(!object.contains_key("name"));
        assert!(!object.contains_key("dependencies"));
    }
}
