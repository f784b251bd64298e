use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::descriptor::{PluginDescriptor, relative_from};
use crate::{Error, Result};

/// The descriptor store: plugin id mapped to its immutable descriptor.
///
/// Registration composes decorators, re-registration replaces the previous
/// entry wholesale. Descriptors never change once stored; composition
/// produces a new value before insertion.
pub struct DescriptorRegistry {
    descriptors: RwLock<HashMap<String, Arc<PluginDescriptor>>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a descriptor, replacing any entry with the same id.
    ///
    /// The colliding entry is removed before anything else, so a failed
    /// registration still evicts it. Descriptors that decorate another
    /// plugin are composed with their base here; the base must already be
    /// registered.
    pub async fn register(&self, descriptor: PluginDescriptor) -> Result<Arc<PluginDescriptor>> {
        let mut descriptors = self.descriptors.write().await;
        store(&mut descriptors, descriptor, true)
    }

    /// Like [`register`](Self::register), but decorators are stored in raw
    /// form instead of composed. Discovery lands a whole scan through here
    /// before re-registering the decorating entries, so a base is present
    /// no matter where the walk found it.
    pub(crate) async fn insert_uncomposed(
        &self,
        descriptor: PluginDescriptor,
    ) -> Result<Arc<PluginDescriptor>> {
        let mut descriptors = self.descriptors.write().await;
        store(&mut descriptors, descriptor, false)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        self.descriptors.read().await.get(id).cloned()
    }

    /// Like [`get`](Self::get), but a miss is an error that names every
    /// registered id.
    pub async fn require(&self, id: &str) -> Result<Arc<PluginDescriptor>> {
        let descriptors = self.descriptors.read().await;
        descriptors
            .get(id)
            .cloned()
            .ok_or_else(|| Error::PluginNotFound {
                id: id.to_string(),
                available: {
                    let mut ids: Vec<&str> =
                        descriptors.keys().map(String::as_str).collect();
                    ids.sort_unstable();
                    ids.join(", ")
                },
            })
    }

    /// All registered descriptors, ordered by id.
    pub async fn all(&self) -> Vec<Arc<PluginDescriptor>> {
        let descriptors = self.descriptors.read().await;
        let mut all: Vec<Arc<PluginDescriptor>> = descriptors.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Descriptors whose `type` field names the given id, ordered by id.
    pub async fn plugins_of_type(&self, type_id: &str) -> Vec<Arc<PluginDescriptor>> {
        let descriptors = self.descriptors.read().await;
        let mut matching: Vec<Arc<PluginDescriptor>> = descriptors
            .values()
            .filter(|d| d.type_id.as_deref() == Some(type_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.descriptors.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.descriptors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.descriptors.read().await.is_empty()
    }

    /// Verifies that the full dependency closure of `id` is registered.
    ///
    /// Fails on the first gap, naming the plugin that declared the missing
    /// dependency. A dependency path that loops back on itself is reported
    /// as a cycle rather than recursed.
    pub async fn check(&self, id: &str) -> Result<()> {
        let descriptors = self.descriptors.read().await;
        let mut path = Vec::new();
        let mut checked = HashSet::new();
        check_closure(&descriptors, id, &mut path, &mut checked)
    }

    /// Drops entries that lack an id or a loader, returning how many were
    /// removed. Discovery runs this after merging a scan.
    pub(crate) async fn retain_valid(&self) -> usize {
        let mut descriptors = self.descriptors.write().await;
        let before = descriptors.len();
        descriptors.retain(|_, descriptor| {
            let valid = descriptor.is_valid();
            if !valid {
                tracing::warn!(
                    path = %descriptor.plugin_path.display(),
                    "Dropping descriptor without id or loader"
                );
            }
            valid
        });
        before - descriptors.len()
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn store(
    descriptors: &mut HashMap<String, Arc<PluginDescriptor>>,
    mut descriptor: PluginDescriptor,
    compose_decorators: bool,
) -> Result<Arc<PluginDescriptor>> {
    descriptors.remove(&descriptor.id);

    if descriptor.plugin_path.as_os_str().is_empty() {
        return Err(Error::MissingPluginPath {
            id: descriptor.id.clone(),
        });
    }

    descriptor.normalize();

    if compose_decorators {
        if let Some(decorates) = descriptor.decorates.clone() {
            let base = descriptors
                .get(&decorates)
                .ok_or_else(|| Error::DecoratedPluginNotFound {
                    id: descriptor.id.clone(),
                    decorates: decorates.clone(),
                })?;
            descriptor = compose(descriptor, base);
        }
    }

    let descriptor = Arc::new(descriptor);
    descriptors.insert(descriptor.id.clone(), Arc::clone(&descriptor));
    Ok(descriptor)
}

/// Merges a decorator over its base descriptor.
///
/// The decorator's explicit fields win; base fields the decorator is silent
/// on survive. The base id becomes a dependency of the composed plugin, and
/// the composed loader is the base's loader re-anchored at the decorator's
/// directory, so both resolve to the same capability key.
fn compose(mut decorator: PluginDescriptor, base: &PluginDescriptor) -> PluginDescriptor {
    if decorator.name.is_none() {
        decorator.name = base.name.clone();
    }
    if decorator.description.is_none() {
        decorator.description = base.description.clone();
    }
    if decorator.type_id.is_none() {
        decorator.type_id = base.type_id.clone();
    }

    for (key, value) in &base.extra {
        decorator
            .extra
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    decorator.loader = relative_from(&decorator.plugin_path, &base.plugin_path)
        .join(&base.loader)
        .to_string_lossy()
        .into_owned();

    decorator.dependencies.push(base.id.clone());
    decorator.normalize();
    decorator
}

fn check_closure(
    descriptors: &HashMap<String, Arc<PluginDescriptor>>,
    id: &str,
    path: &mut Vec<String>,
    checked: &mut HashSet<String>,
) -> Result<()> {
    if path.iter().any(|visited| visited == id) {
        let mut cycle = path.clone();
        cycle.push(id.to_string());
        return Err(Error::DependencyCycle {
            path: cycle.join(" -> "),
        });
    }
    if checked.contains(id) {
        return Ok(());
    }

    let descriptor = descriptors
        .get(id)
        .ok_or_else(|| Error::MissingPlugin { id: id.to_string() })?;

    path.push(id.to_string());
    for dependency in &descriptor.dependencies {
        if let Err(err) = check_closure(descriptors, dependency, path, checked) {
            path.pop();
            // Cycles carry their own path; everything else is wrapped so the
            // chain names the requester at every level.
            return Err(match err {
                cycle @ Error::DependencyCycle { .. } => cycle,
                other => Error::MissingDependency {
                    plugin: id.to_string(),
                    dependency: dependency.clone(),
                    source: Box::new(other),
                },
            });
        }
    }
    path.pop();

    checked.insert(id.to_string());
    Ok(())
}
