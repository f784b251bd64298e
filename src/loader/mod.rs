//! Loader contracts and the capability table they are dispatched through.
//!
//! A plugin's descriptor names a loader by relative path; the manager
//! resolves that path against the plugin directory into a capability key and
//! looks the key up in the [`LoaderRegistry`] populated at process startup.
//! The factory found there constructs a [`PluginLoader`], whose single
//! `export` call produces the plugin's exports as a JSON value.

mod factory;
mod type_loader;

pub use factory::{LoaderFactory, LoaderRegistry};
pub use type_loader::{PLUGINS_KEY, PROPS_KEY, PluginTypeLoader, TypeContract, TypeLoader};

use async_trait::async_trait;

use crate::descriptor::PluginDescriptor;
use crate::manager::PluginManager;

/// Everything a loader gets to see while producing exports: its own
/// descriptor and the manager that owns it. Loaders that need other plugins
/// go through the manager reference; there is no ambient registry.
pub struct ExportContext<'a> {
    pub manager: &'a PluginManager,
    pub descriptor: &'a PluginDescriptor,
}

impl<'a> ExportContext<'a> {
    pub(crate) fn new(manager: &'a PluginManager, descriptor: &'a PluginDescriptor) -> Self {
        Self {
            manager,
            descriptor,
        }
    }
}

/// Produces a plugin's exports.
///
/// Implementations are registered indirectly through a [`LoaderFactory`] and
/// invoked at most once per instance fingerprint; the manager caches the
/// result. The returned value must serialize as a JSON object or
/// instantiation fails.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    async fn export(
        &self,
        context: &ExportContext<'_>,
        options: &serde_json::Value,
    ) -> crate::Result<serde_json::Value>;
}
