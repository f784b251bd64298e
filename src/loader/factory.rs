use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::descriptor::{PluginDescriptor, lexical_normalize};
use crate::{Error, Result};

use super::PluginLoader;

/// Constructs the loader for a descriptor.
///
/// Factories are registered under a capability key and may inspect the
/// descriptor before constructing, refusing descriptors they cannot serve.
pub trait LoaderFactory: Send + Sync {
    fn create(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn PluginLoader>>;
}

/// The capability table: loader keys mapped to their factories.
///
/// Keys are lexically normalized paths, so a key registered as
/// `plugins/avocado/loader` matches a decorator whose rewritten loader path
/// walks back into the same directory. Keys are never resolved against the
/// filesystem and need not exist on disk.
pub struct LoaderRegistry {
    factories: RwLock<HashMap<PathBuf, Arc<dyn LoaderFactory>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn from_entries(
        entries: impl IntoIterator<Item = (PathBuf, Arc<dyn LoaderFactory>)>,
    ) -> Self {
        let factories = entries
            .into_iter()
            .map(|(key, factory)| (lexical_normalize(&key), factory))
            .collect();
        Self {
            factories: RwLock::new(factories),
        }
    }

    pub async fn register(&self, key: impl AsRef<Path>, factory: Arc<dyn LoaderFactory>) {
        let key = lexical_normalize(key.as_ref());
        self.factories.write().await.insert(key, factory);
    }

    /// Looks up the factory for a descriptor's loader key.
    pub async fn resolve(&self, descriptor: &PluginDescriptor) -> Result<Arc<dyn LoaderFactory>> {
        let key = descriptor.loader_key();
        self.factories
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::LoaderNotRegistered {
                plugin: descriptor.id.clone(),
                key,
            })
    }

    pub async fn contains(&self, key: impl AsRef<Path>) -> bool {
        let key = lexical_normalize(key.as_ref());
        self.factories.read().await.contains_key(&key)
    }

    pub async fn len(&self) -> usize {
        self.factories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.factories.read().await.is_empty()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ExportContext;
    use async_trait::async_trait;

    struct NullLoader;

    #[async_trait]
    impl PluginLoader for NullLoader {
        async fn export(
            &self,
            _context: &ExportContext<'_>,
            _options: &serde_json::Value,
        ) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    struct NullFactory;

    impl LoaderFactory for NullFactory {
        fn create(&self, _descriptor: &PluginDescriptor) -> Result<Box<dyn PluginLoader>> {
            Ok(Box::new(NullLoader))
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = LoaderRegistry::new();
        registry
            .register("/plugins/avocado/loader", Arc::new(NullFactory))
            .await;

        let descriptor = PluginDescriptor::new("avocado", "/plugins/avocado");
        let factory = registry.resolve(&descriptor).await.unwrap();
        assert!(factory.create(&descriptor).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_unregistered() {
        let registry = LoaderRegistry::new();
        let descriptor = PluginDescriptor::new("avocado", "/plugins/avocado");

        let err = registry.resolve(&descriptor).await.err().unwrap();
        assert!(matches!(err, Error::LoaderNotRegistered { .. }));
        assert!(err.to_string().contains("avocado"));
    }

    #[tokio::test]
    async fn test_decorated_path_hits_base_key() {
        let registry = LoaderRegistry::new();
        registry
            .register("/plugins/avocado/customLoader", Arc::new(NullFactory))
            .await;

        // A decorator in a sibling directory reaches the same key through
        // its rewritten relative path.
        let decorator = PluginDescriptor::new("ripe-avocado", "/plugins/ripe")
            .with_loader("../avocado/customLoader");
        assert!(registry.resolve(&decorator).await.is_ok());
    }

    #[tokio::test]
    async fn test_key_normalization_on_register() {
        let registry = LoaderRegistry::new();
        registry
            .register("/plugins/./avocado/../avocado/loader", Arc::new(NullFactory))
            .await;
        assert!(registry.contains("/plugins/avocado/loader").await);
        assert_eq!(registry.len().await, 1);
    }
}
