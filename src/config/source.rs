//! Config layer sources and provenance
//!
//! Every file that contributes to an effective policy is recorded with its
//! origin, path and the SHA-256 digest of its raw bytes, so a verbose run can
//! show exactly which files shaped the plan.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::error::ConfigError;

/// Where a config layer came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    Builtin,
    GlobalFile,
    Cli,
    HostState,
    HostOverride,
}

/// A contributing config layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    pub fn builtin() -> Self {
        Self {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }
    }

    pub fn cli() -> Self {
        Self {
            origin: ConfigOrigin::Cli,
            path: None,
            digest: None,
        }
    }
}

/// Syntax of a config file, picked from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
    /// YAML, which also covers JSON documents
    Yaml,
    Toml,
}

impl LayerFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => LayerFormat::Toml,
            _ => LayerFormat::Yaml,
        }
    }
}

/// Read a config file into a mapping layer.
///
/// Fails with [`ConfigError::NotFound`] if the file is missing and with
/// [`ConfigError::Format`] if it does not parse to a mapping.
pub fn load_layer(path: &Path, origin: ConfigOrigin) -> Result<(Value, ConfigSource), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));
    let label = path.display().to_string();

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::format(label.clone(), format!("invalid UTF-8: {}", e)))?;

    let value = parse_layer(&contents, LayerFormat::for_path(path), &label)?;

    let source = ConfigSource {
        origin,
        path: Some(label),
        digest: Some(digest),
    };

    Ok((value, source))
}

/// Parse config text into a mapping layer. `label` names the source in errors.
pub fn parse_layer(contents: &str, format: LayerFormat, label: &str) -> Result<Value, ConfigError> {
    let value = match format {
        LayerFormat::Yaml => {
            if contents.trim().is_empty() {
                Value::Null
            } else {
                serde_yaml::from_str::<Value>(contents)
                    .map_err(|e| ConfigError::format(label, format!("YAML parse error: {}", e)))?
            }
        }
        LayerFormat::Toml => {
            let table: toml::Value = toml::from_str(contents)
                .map_err(|e| ConfigError::format(label, format!("TOML parse error: {}", e)))?;
            toml_to_json(table)
        }
    };

    require_mapping(value, label)
}

/// A document that is empty or `null` counts as an empty mapping; any other
/// non-mapping top level is rejected.
fn require_mapping(value: Value, label: &str) -> Result<Value, ConfigError> {
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(ConfigError::format(
            label,
            format!("expected a mapping at top level, found {}", kind_of(&other)),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
