//! Environment lookup capability
//!
//! The relay reads `SSH_AUTH_SOCK` through this trait instead of the process
//! environment directly, so tests can supply their own values.

use std::collections::HashMap;
use std::path::Path;

/// Read-only environment access
pub trait Environment: Send + Sync {
    /// Value of an environment variable, if set and valid UTF-8
    fn var(&self, key: &str) -> Option<String>;

    /// Whether a filesystem path exists (used for the agent socket)
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed variables for tests. Paths listed via [`MapEnvironment::with_path`]
/// are reported as existing regardless of the real filesystem.
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
    paths: Vec<String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| Path::new(p) == path)
    }
}
