use std::path::{Path, PathBuf};

use crate::config::DiscoveryOptions;
use crate::descriptor::{DESCRIPTOR_FILE, PluginDescriptor};
use crate::registry::DescriptorRegistry;
use crate::{Error, Result};

/// First-level directory holding vendored dependencies. Descriptors under it
/// are skipped unless contributed plugins are allowed.
const CONTRIBUTED_DIR: &str = "vendor";

pub(crate) struct Discovery;

impl Discovery {
    /// Scans the configured root for descriptor files and merges every
    /// parseable one into the registry.
    ///
    /// Malformed files are skipped with a warning. A scan that cannot run at
    /// all, an unreadable file, or a decorator whose base is missing is
    /// fatal. Every file is read before anything is registered, so a failed
    /// scan leaves the registry in its prior state. Decorators compose only
    /// after the whole batch is stored; the walk order never decides whether
    /// a base is visible. Entries left without an id or loader are dropped
    /// at the end.
    pub(crate) async fn scan_into(
        options: &DiscoveryOptions,
        registry: &DescriptorRegistry,
    ) -> Result<()> {
        let pattern = format!("{}/**/{}", options.root_path.display(), DESCRIPTOR_FILE);
        let root = options.root_path.clone();
        let allows_contributed = options.allows_contributed;

        // The glob walk is synchronous filesystem traversal; keep it off
        // the async runtime.
        let paths = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let entries = glob::glob(&pattern).map_err(|source| Error::Pattern {
                pattern: pattern.clone(),
                source,
            })?;

            let mut paths = Vec::new();
            for entry in entries {
                let path = entry.map_err(|source| Error::Scan {
                    path: root.clone(),
                    source,
                })?;
                if !allows_contributed && is_contributed(&root, &path) {
                    continue;
                }
                paths.push(path);
            }
            Ok(paths)
        })
        .await
        .map_err(|err| Error::ScanTask(err.to_string()))??;

        let mut batch = Vec::new();
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await?;
            let mut descriptor = match PluginDescriptor::parse(&content) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "Skipping malformed descriptor file"
                    );
                    continue;
                }
            };

            descriptor.plugin_path = path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .to_path_buf();

            tracing::debug!(id = %descriptor.id, path = %path.display(), "Discovered plugin");
            batch.push(descriptor);
        }

        // Uncomposed entries for the whole batch land first; decorating
        // ones are then re-registered against the complete set.
        let registered = batch.len();
        let mut decorating = Vec::new();
        for descriptor in batch {
            if descriptor.decorates.is_some() {
                decorating.push(descriptor.clone());
            }
            registry.insert_uncomposed(descriptor).await?;
        }
        for descriptor in decorating {
            registry.register(descriptor).await?;
        }

        registry.retain_valid().await;
        tracing::debug!(count = registered, "Descriptor scan complete");
        Ok(())
    }
}

fn is_contributed(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|relative| relative.components().next())
        .is_some_and(|first| first.as_os_str() == CONTRIBUTED_DIR)
}
