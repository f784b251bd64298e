use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

/// Where and how discovery scans for descriptor files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Directory the recursive scan starts from.
    #[serde(default = "default_root")]
    pub root_path: PathBuf,

    /// When false, descriptors contributed by vendored dependencies (any
    /// match under a first-level `vendor/` directory) are skipped.
    #[serde(default = "default_true")]
    pub allows_contributed: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            root_path: default_root(),
            allows_contributed: true,
        }
    }
}

impl DiscoveryOptions {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    pub fn with_contributed(mut self, allows_contributed: bool) -> Self {
        self.allows_contributed = allows_contributed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DiscoveryOptions::default();
        assert_eq!(options.root_path, PathBuf::from("."));
        assert!(options.allows_contributed);
    }

    #[test]
    fn test_partial_deserialize() {
        let options: DiscoveryOptions =
            serde_yaml_bw::from_str("root_path: ./plugins\n").unwrap();
        assert_eq!(options.root_path, PathBuf::from("./plugins"));
        assert!(options.allows_contributed);
    }

    #[test]
    fn test_builder() {
        let options = DiscoveryOptions::new("/srv/plugins").with_contributed(false);
        assert_eq!(options.root_path, PathBuf::from("/srv/plugins"));
        assert!(!options.allows_contributed);
    }
}
