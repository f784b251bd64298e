use std::path::PathBuf;

/// Error type for plugkit operations.
///
/// Fatal conditions surface here; malformed descriptor files discovered on
/// disk are skipped with a warning instead and never produce an error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Requested plugin id is not in the registry.
    #[error("Unable to find plugin with ID '{id}'. Available plugins are: {available}")]
    PluginNotFound { id: String, available: String },

    /// Dependency check reached an id the registry does not hold.
    #[error("Check failed. Missing plugin '{id}'")]
    MissingPlugin { id: String },

    /// A declared dependency (or one of its own dependencies) is unresolvable.
    #[error("Check failed. Missing dependency '{dependency}' for plugin '{plugin}'")]
    MissingDependency {
        plugin: String,
        dependency: String,
        #[source]
        source: Box<Error>,
    },

    /// The dependency graph loops back on itself.
    #[error("Dependency cycle detected: {path}")]
    DependencyCycle { path: String },

    /// A decorator names a base plugin that is not registered.
    #[error("Unable to find the decorated plugin '{decorates}' for '{id}'")]
    DecoratedPluginNotFound { id: String, decorates: String },

    /// Registration requires a plugin path to anchor loader resolution.
    #[error("Cannot register plugin '{id}' without a plugin path")]
    MissingPluginPath { id: String },

    /// No loader factory is registered under the descriptor's loader key.
    #[error("No loader registered under '{key}' for plugin '{plugin}'")]
    LoaderNotRegistered { plugin: String, key: PathBuf },

    /// A registered factory refused to construct the loader.
    #[error("Failed to create loader for plugin '{plugin}'")]
    LoaderCreate {
        plugin: String,
        #[source]
        source: Box<Error>,
    },

    /// Loader produced something other than a JSON object.
    #[error("Plugin '{plugin}' did not return an object after loading")]
    ExportNotObject { plugin: String },

    /// Exports do not satisfy the declared type contract.
    #[error("Plugin of type '{type_id}' is missing properties: {missing}")]
    MissingProperties { type_id: String, missing: String },

    /// Loader-defined failure while producing exports.
    #[error("Loader error: {0}")]
    Loader(String),

    /// Discovery glob pattern could not be compiled.
    #[error("Invalid discovery pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Filesystem walk failed mid-scan.
    #[error("Failed to scan '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: glob::GlobError,
    },

    /// Background walk task panicked or was cancelled.
    #[error("Scan task failed: {0}")]
    ScanTask(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn loader(message: impl Into<String>) -> Self {
        Error::Loader(message.into())
    }

    /// True when the failure is a gap in the dependency graph, at any depth.
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Error::MissingPlugin { .. }
                | Error::MissingDependency { .. }
                | Error::DependencyCycle { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
