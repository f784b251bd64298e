use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

use super::{ExportContext, PluginLoader};

/// Export key holding a type's declared property names.
pub const PROPS_KEY: &str = "props";
/// Export key holding the descriptors of every plugin of a type.
pub const PLUGINS_KEY: &str = "plugins";

/// Contract declared by a plugin type.
///
/// A type is itself a plugin; wrap an implementation in [`TypeLoader`] to
/// register it. Plugins naming the type in their descriptor must export at
/// least the declared properties, and their exports are trimmed to exactly
/// that set.
pub trait PluginTypeLoader: Send + Sync {
    /// Property names every plugin of this type must export.
    fn plugin_properties(&self) -> Vec<String>;
}

/// Adapts a [`PluginTypeLoader`] to the loader contract.
///
/// Exports `{ "props": [...], "plugins": [...] }`: the declared contract and
/// the descriptors of every registered plugin of the type, in id order.
pub struct TypeLoader<T> {
    inner: T,
}

impl<T: PluginTypeLoader> TypeLoader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: PluginTypeLoader> PluginLoader for TypeLoader<T> {
    async fn export(
        &self,
        context: &ExportContext<'_>,
        _options: &Value,
    ) -> Result<Value> {
        let descriptors = context.manager.plugins_of_type(&context.descriptor.id).await;
        let mut plugins = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            plugins.push(serde_json::to_value(descriptor.as_ref())?);
        }

        let mut exports = serde_json::Map::new();
        exports.insert(
            PROPS_KEY.to_string(),
            serde_json::to_value(self.inner.plugin_properties())?,
        );
        exports.insert(PLUGINS_KEY.to_string(), Value::Array(plugins));
        Ok(Value::Object(exports))
    }
}

/// The property contract read back out of a type instance's exports, used to
/// validate and trim the exports of plugins of that type.
#[derive(Debug, Clone)]
pub struct TypeContract {
    type_id: String,
    props: Vec<String>,
}

impl TypeContract {
    /// Reads the declared property list from a type's exports. A type that
    /// exports no `props` array declares an empty contract.
    pub fn from_exports(type_id: &str, exports: &serde_json::Map<String, Value>) -> Self {
        let props = exports
            .get(PROPS_KEY)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            type_id: type_id.to_string(),
            props,
        }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn props(&self) -> &[String] {
        &self.props
    }

    /// Fails when any declared property is absent, naming the missing ones
    /// in declared order.
    pub fn validate(&self, exports: &serde_json::Map<String, Value>) -> Result<()> {
        let missing: Vec<&str> = self
            .props
            .iter()
            .filter(|prop| !exports.contains_key(*prop))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingProperties {
                type_id: self.type_id.clone(),
                missing: missing.join(", "),
            })
        }
    }

    /// Keeps exactly the declared properties; anything extra is dropped.
    pub fn filter(
        &self,
        mut exports: serde_json::Map<String, Value>,
    ) -> serde_json::Map<String, Value> {
        let mut filtered = serde_json::Map::new();
        for prop in &self.props {
            if let Some(value) = exports.remove(prop) {
                filtered.insert(prop.clone(), value);
            }
        }
        filtered
    }
}
