use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};

use crate::config::DiscoveryOptions;
use crate::descriptor::PluginDescriptor;
use crate::discovery::Discovery;
use crate::fingerprint;
use crate::loader::{ExportContext, LoaderFactory, LoaderRegistry, PluginLoader, TypeContract};
use crate::registry::DescriptorRegistry;
use crate::{Error, Result};

/// A plugin realized: its composed descriptor and its validated exports.
#[derive(Debug, Clone)]
pub struct PluginInstance {
    descriptor: Arc<PluginDescriptor>,
    exports: serde_json::Map<String, Value>,
}

impl PluginInstance {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn exports(&self) -> &serde_json::Map<String, Value> {
        &self.exports
    }

    pub fn export(&self, key: &str) -> Option<&Value> {
        self.exports.get(key)
    }
}

/// Owns the descriptor store, the loader capability table, and the instance
/// cache. Everything runs through a `&PluginManager`; there is no process
/// global.
///
/// Discovery runs at most once per manager, lazily on the first
/// [`discover`](Self::discover) or [`instantiate`](Self::instantiate) call.
/// Instances are memoized per (plugin, options) fingerprint, and concurrent
/// requests for the same fingerprint share one loader invocation.
pub struct PluginManager {
    options: DiscoveryOptions,
    registry: DescriptorRegistry,
    loaders: LoaderRegistry,
    discovered: OnceCell<()>,
    instances: Mutex<HashMap<String, Arc<OnceCell<Arc<PluginInstance>>>>>,
}

impl PluginManager {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self {
            options,
            registry: DescriptorRegistry::new(),
            loaders: LoaderRegistry::new(),
            discovered: OnceCell::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn builder() -> PluginManagerBuilder {
        PluginManagerBuilder::new()
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Scans the configured root and returns all registered descriptors,
    /// ordered by id. The scan runs once; later calls return the store
    /// as-is without touching the filesystem. A failed scan stays
    /// retryable.
    pub async fn discover(&self) -> Result<Vec<Arc<PluginDescriptor>>> {
        self.ensure_discovered().await?;
        Ok(self.registry.all().await)
    }

    /// Registers a descriptor directly, composing decorators and replacing
    /// any entry with the same id.
    pub async fn register(&self, descriptor: PluginDescriptor) -> Result<Arc<PluginDescriptor>> {
        self.registry.register(descriptor).await
    }

    /// Registers a loader factory under a capability key.
    pub async fn register_loader(
        &self,
        key: impl Into<PathBuf>,
        factory: Arc<dyn LoaderFactory>,
    ) {
        self.loaders.register(key.into(), factory).await;
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        self.registry.get(id).await
    }

    /// All registered descriptors, ordered by id.
    pub async fn descriptors(&self) -> Vec<Arc<PluginDescriptor>> {
        self.registry.all().await
    }

    /// Descriptors of every plugin whose `type` names the given id.
    pub async fn plugins_of_type(&self, type_id: &str) -> Vec<Arc<PluginDescriptor>> {
        self.registry.plugins_of_type(type_id).await
    }

    /// Verifies the full dependency closure of `id`.
    pub async fn check(&self, id: &str) -> Result<()> {
        self.registry.check(id).await
    }

    pub async fn has_plugin(&self, id: &str) -> bool {
        self.registry.contains(id).await
    }

    pub async fn plugin_count(&self) -> usize {
        self.registry.len().await
    }

    /// Produces the instance for a plugin under the given options.
    ///
    /// The result is memoized per (plugin, options) fingerprint. On a miss
    /// the manager ensures discovery has run, checks the dependency
    /// closure, dispatches the descriptor's loader, and validates the
    /// exports against the plugin's type, if it declares one.
    ///
    /// Returns a boxed future: instantiation re-enters itself through a
    /// plugin's declared type.
    pub fn instantiate<'a>(
        &'a self,
        id: &'a str,
        options: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<PluginInstance>>> + Send + 'a>> {
        Box::pin(async move {
            let key = fingerprint::instance_key(id, &options)?;
            let cell = {
                let mut instances = self.instances.lock().await;
                Arc::clone(
                    instances
                        .entry(key)
                        .or_insert_with(|| Arc::new(OnceCell::new())),
                )
            };
            let instance = cell
                .get_or_try_init(|| self.load_instance(id, &options))
                .await?;
            Ok(Arc::clone(instance))
        })
    }

    async fn ensure_discovered(&self) -> Result<()> {
        self.discovered
            .get_or_try_init(|| Discovery::scan_into(&self.options, &self.registry))
            .await?;
        Ok(())
    }

    async fn load_instance(&self, id: &str, options: &Value) -> Result<Arc<PluginInstance>> {
        self.ensure_discovered().await?;
        let descriptor = self.registry.require(id).await?;
        tracing::debug!(id = %descriptor.id, "Instantiating plugin");
        let exports = self.load_exports(&descriptor, options).await?;
        Ok(Arc::new(PluginInstance {
            descriptor,
            exports,
        }))
    }

    async fn load_exports(
        &self,
        descriptor: &Arc<PluginDescriptor>,
        options: &Value,
    ) -> Result<serde_json::Map<String, Value>> {
        let loader = self.create_loader(descriptor).await?;
        let context = ExportContext::new(self, descriptor);
        let raw = loader.export(&context, options).await?;
        let Value::Object(exports) = raw else {
            return Err(Error::ExportNotObject {
                plugin: descriptor.id.clone(),
            });
        };

        let Some(type_id) = &descriptor.type_id else {
            return Ok(exports);
        };

        // The type is a plugin too; its instance carries the contract.
        let type_instance = self.instantiate(type_id, Value::Null).await?;
        let contract = TypeContract::from_exports(type_id, type_instance.exports());
        contract.validate(&exports)?;
        Ok(contract.filter(exports))
    }

    /// Resolves and constructs the loader for a descriptor. The dependency
    /// closure is checked first: no loader is ever built for a plugin with
    /// unmet dependencies.
    async fn create_loader(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn PluginLoader>> {
        self.registry.check(&descriptor.id).await?;
        let factory = self.loaders.resolve(descriptor).await?;
        factory
            .create(descriptor)
            .map_err(|source| Error::LoaderCreate {
                plugin: descriptor.id.clone(),
                source: Box::new(source),
            })
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(DiscoveryOptions::default())
    }
}

/// Builds a [`PluginManager`] with its startup capability table.
pub struct PluginManagerBuilder {
    options: DiscoveryOptions,
    factories: Vec<(PathBuf, Arc<dyn LoaderFactory>)>,
}

impl PluginManagerBuilder {
    pub fn new() -> Self {
        Self {
            options: DiscoveryOptions::default(),
            factories: Vec::new(),
        }
    }

    pub fn discovery(mut self, options: DiscoveryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root_path(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.options.root_path = root_path.into();
        self
    }

    pub fn allows_contributed(mut self, allows_contributed: bool) -> Self {
        self.options.allows_contributed = allows_contributed;
        self
    }

    /// Registers a loader factory under a capability key.
    pub fn loader(mut self, key: impl Into<PathBuf>, factory: Arc<dyn LoaderFactory>) -> Self {
        self.factories.push((key.into(), factory));
        self
    }

    pub fn build(self) -> PluginManager {
        PluginManager {
            options: self.options,
            registry: DescriptorRegistry::new(),
            loaders: LoaderRegistry::from_entries(self.factories),
            discovered: OnceCell::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for PluginManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
