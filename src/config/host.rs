//! Host policy resolution
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Persisted host state (`<host_backup_dir>/config.yml`), if present
//! 3. Per-invocation override (`--host-config`), which must exist when given

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use super::defaults::HostDefaults;
use super::error::ConfigError;
use super::merge::merge_layers;
use super::source::{load_layer, ConfigOrigin, ConfigSource};

/// Effective per-host policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPolicy {
    /// Directories to mirror, in execution order. Duplicates are kept.
    pub directories: Vec<String>,

    /// Paths excluded from each directory's sync, keyed by directory
    pub exclusions: BTreeMap<String, Vec<String>>,
}

impl HostPolicy {
    /// Exclusions configured for `directory`, in configured order
    pub fn exclusions_for(&self, directory: &str) -> &[String] {
        self.exclusions
            .get(directory)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exclusion keys that name no directory in `directories`.
    ///
    /// These never affect a plan.
    pub fn unreferenced_exclusions(&self) -> Vec<&str> {
        self.exclusions
            .keys()
            .filter(|key| !self.directories.iter().any(|d| d == *key))
            .map(String::as_str)
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for directory in &self.directories {
            check_contained(directory).map_err(|problem| {
                ConfigError::Validation(format!("directory {}, got '{}'", problem, directory))
            })?;
        }

        for (directory, excluded) in &self.exclusions {
            for path in excluded {
                check_contained(path).map_err(|problem| {
                    ConfigError::Validation(format!(
                        "exclusion for '{}' {}, got '{}'",
                        directory, problem, path
                    ))
                })?;
            }
        }

        Ok(())
    }
}

/// Source paths are appended verbatim under the host backup directory, so
/// they must be absolute and must not climb out of it with `..`.
fn check_contained(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("must be an absolute path");
    }
    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err("must not contain '..'");
    }
    Ok(())
}

/// A resolved host policy and the layers that produced it
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    pub policy: HostPolicy,
    pub sources: Vec<ConfigSource>,
}

/// Resolve the effective host policy.
///
/// `host_state_path` is optional on disk; `override_path`, when given, is not.
pub fn resolve_host(
    defaults: &HostDefaults,
    host_state_path: &Path,
    override_path: Option<&Path>,
) -> Result<ResolvedHost, ConfigError> {
    let mut layers = vec![defaults.to_value()];
    let mut sources = vec![ConfigSource::builtin()];

    if host_state_path.exists() {
        tracing::debug!(path = %host_state_path.display(), "loading host configuration");
        let (layer, source) = load_layer(host_state_path, ConfigOrigin::HostState)?;
        layers.push(layer);
        sources.push(source);
    }

    if let Some(path) = override_path {
        let (layer, source) = load_layer(path, ConfigOrigin::HostOverride)?;
        tracing::debug!(path = %path.display(), "loaded host override");
        layers.push(layer);
        sources.push(source);
    }

    let merged = merge_layers(layers);
    let label = override_path.unwrap_or(host_state_path).display().to_string();
    let policy: HostPolicy =
        serde_json::from_value(merged).map_err(|e| ConfigError::format(label, e))?;
    policy.validate()?;

    for key in policy.unreferenced_exclusions() {
        tracing::warn!(directory = key, "exclusions configured for a directory that is not backed up");
    }

    Ok(ResolvedHost { policy, sources })
}
