//! Global policy resolution
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Global config file (`--config`), which must exist when given
//! 3. CLI flags (`--backup-basedir`, `--admin-host`, `--uppercase-hostname`)
//!
//! The host backup directory is never configured directly. It is derived
//! from `backup_basedir` and a [`NormalizedHostname`], which can only be
//! obtained through [`GlobalPolicy::normalize_hostname`].

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::defaults::GlobalDefaults;
use super::error::ConfigError;
use super::merge::merge_layers;
use super::source::{load_layer, ConfigOrigin, ConfigSource};

/// File name of the persisted host state inside a host backup directory
pub const HOST_STATE_FILE: &str = "config.yml";

/// Mirror tool invocation settings (`mirror:` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSettings {
    pub program: String,
    pub flags: Vec<String>,
}

/// How the admin host is reached (`relay:` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    pub ssh_program: String,
    pub use_sudo: bool,
    pub forward_agent: bool,
}

/// Effective global policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPolicy {
    pub backup_basedir: PathBuf,
    pub uppercase_hostname: bool,
    pub admin_host: String,
    pub mirror: MirrorSettings,
    pub relay: RelaySettings,
}

/// A target hostname after the uppercase policy has been applied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedHostname(String);

impl NormalizedHostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The host a run is about, with its derived backup location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostTarget {
    /// Hostname as given on the command line; used as the mirror source
    pub hostname: String,
    pub normalized: NormalizedHostname,
    pub backup_dir: PathBuf,
}

impl HostTarget {
    pub fn new(policy: &GlobalPolicy, hostname: &str) -> Result<Self, ConfigError> {
        let normalized = policy.normalize_hostname(hostname)?;
        let backup_dir = policy.host_backup_dir(&normalized);
        Ok(Self {
            hostname: hostname.to_string(),
            normalized,
            backup_dir,
        })
    }

    /// Location of the persisted per-host config file
    pub fn host_state_path(&self) -> PathBuf {
        self.backup_dir.join(HOST_STATE_FILE)
    }
}

impl GlobalPolicy {
    /// Apply the uppercase policy to a raw hostname, validating it first.
    pub fn normalize_hostname(&self, hostname: &str) -> Result<NormalizedHostname, ConfigError> {
        if !is_valid_hostname(hostname) {
            return Err(ConfigError::InvalidHostname(hostname.to_string()));
        }
        let name = if self.uppercase_hostname {
            hostname.to_uppercase()
        } else {
            hostname.to_string()
        };
        Ok(NormalizedHostname(name))
    }

    /// `<backup_basedir>/<normalized hostname>`
    pub fn host_backup_dir(&self, hostname: &NormalizedHostname) -> PathBuf {
        self.backup_basedir.join(hostname.as_str())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.backup_basedir.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "backup_basedir must be an absolute path, got '{}'",
                self.backup_basedir.display()
            )));
        }

        let relay_host = match self.admin_host.split_once('@') {
            Some((user, host)) if !user.is_empty() => host,
            Some(_) => "",
            None => self.admin_host.as_str(),
        };
        if !is_valid_hostname(relay_host) {
            return Err(ConfigError::Validation(format!(
                "admin_host is not a valid hostname: '{}'",
                self.admin_host
            )));
        }

        if self.mirror.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mirror.program must not be empty".to_string(),
            ));
        }
        if self.relay.ssh_program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "relay.ssh_program must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// RFC 1123 hostname: dot-separated labels of letters, digits and inner hyphens.
pub fn is_valid_hostname(name: &str) -> bool {
    static HOSTNAME: OnceLock<Regex> = OnceLock::new();
    let re = HOSTNAME.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
        )
        .expect("hostname pattern is valid")
    });
    name.len() <= 253 && re.is_match(name)
}

/// Global settings given as command-line flags
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backup_basedir: Option<PathBuf>,
    pub admin_host: Option<String>,
    pub uppercase_hostname: Option<bool>,
}

impl CliOverrides {
    /// Build the CLI layer; `None` when no flag was passed.
    pub fn to_layer(&self) -> Option<Value> {
        let mut map = Map::new();
        if let Some(ref dir) = self.backup_basedir {
            map.insert(
                "backup_basedir".to_string(),
                Value::String(dir.to_string_lossy().into_owned()),
            );
        }
        if let Some(ref host) = self.admin_host {
            map.insert("admin_host".to_string(), Value::String(host.clone()));
        }
        if let Some(upper) = self.uppercase_hostname {
            map.insert("uppercase_hostname".to_string(), Value::Bool(upper));
        }

        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    }
}

/// A resolved global policy and the layers that produced it
#[derive(Debug, Clone)]
pub struct ResolvedGlobal {
    pub policy: GlobalPolicy,
    pub sources: Vec<ConfigSource>,
}

/// Resolve the effective global policy.
pub fn resolve_global(
    defaults: &GlobalDefaults,
    config_path: Option<&Path>,
    cli: &CliOverrides,
) -> Result<ResolvedGlobal, ConfigError> {
    let mut layers = vec![defaults.to_value()];
    let mut sources = vec![ConfigSource::builtin()];

    if let Some(path) = config_path {
        let (layer, source) = load_layer(path, ConfigOrigin::GlobalFile)?;
        tracing::debug!(path = %path.display(), "loaded global configuration");
        layers.push(layer);
        sources.push(source);
    }

    if let Some(layer) = cli.to_layer() {
        layers.push(layer);
        sources.push(ConfigSource::cli());
    }

    let merged = merge_layers(layers);
    let policy: GlobalPolicy = serde_json::from_value(merged)
        .map_err(|e| ConfigError::format(describe(config_path), e))?;
    policy.validate()?;

    Ok(ResolvedGlobal { policy, sources })
}

fn describe(path: Option<&Path>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "global configuration".to_string(),
    }
}

/// `host_backup_dir` with `source_path` appended verbatim, so `/var` under
/// `/b/HOST` becomes `/b/HOST/var`.
pub fn destination_under(host_backup_dir: &Path, source_path: &str) -> PathBuf {
    let mut joined = OsString::from(host_backup_dir.as_os_str());
    joined.push(source_path);
    PathBuf::from(joined)
}
