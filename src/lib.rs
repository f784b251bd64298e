//! # plugkit
//!
//! Plugin discovery, composition, and instantiation for Rust.
//!
//! A plugin is a directory holding a declarative `plugkit.yml` descriptor:
//!
//! ```yaml
//! id: avocado
//! name: Avocado
//! type: fruit
//! dependencies:
//!   - mango
//! sugarLevel: low
//! ```
//!
//! The [`PluginManager`] discovers descriptors under a configured root,
//! composes decorators over the plugins they decorate, validates dependency
//! graphs, and produces plugin instances by dispatching each descriptor's
//! loader path through a capability table populated at startup. Exports are
//! plain JSON objects, optionally validated against and trimmed to the
//! property contract of the plugin's declared type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use plugkit::{ExportContext, LoaderFactory, PluginDescriptor, PluginLoader, PluginManager};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl PluginLoader for Greeter {
//!     async fn export(
//!         &self,
//!         _context: &ExportContext<'_>,
//!         options: &serde_json::Value,
//!     ) -> plugkit::Result<serde_json::Value> {
//!         let name = options.get("name").and_then(|v| v.as_str()).unwrap_or("world");
//!         Ok(serde_json::json!({ "greeting": format!("Hello, {name}!") }))
//!     }
//! }
//!
//! struct GreeterFactory;
//!
//! impl LoaderFactory for GreeterFactory {
//!     fn create(&self, _: &PluginDescriptor) -> plugkit::Result<Box<dyn PluginLoader>> {
//!         Ok(Box::new(Greeter))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), plugkit::Error> {
//!     let manager = PluginManager::builder()
//!         .root_path("./plugins")
//!         .loader("./plugins/greeter/loader", Arc::new(GreeterFactory))
//!         .build();
//!
//!     let greeter = manager
//!         .instantiate("greeter", serde_json::json!({ "name": "plugkit" }))
//!         .await?;
//!     println!("{:?}", greeter.export("greeting"));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod manager;
pub mod registry;

mod discovery;
mod fingerprint;

pub use config::DiscoveryOptions;
pub use descriptor::{DESCRIPTOR_FILE, PluginDescriptor};
pub use error::{Error, Result};
pub use loader::{
    ExportContext, LoaderFactory, LoaderRegistry, PLUGINS_KEY, PROPS_KEY, PluginLoader,
    PluginTypeLoader, TypeContract, TypeLoader,
};
pub use manager::{PluginInstance, PluginManager, PluginManagerBuilder};
pub use registry::DescriptorRegistry;
