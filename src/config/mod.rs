//! Layered configuration
//!
//! Every source is read into an untyped layer, layers are deep-merged in
//! precedence order, and the merged tree is projected into a typed policy
//! and validated once:
//! - [`GlobalPolicy`]: defaults < `--config` file < CLI flags
//! - [`HostPolicy`]: defaults < `<host_backup_dir>/config.yml` < `--host-config`

mod defaults;
mod error;
mod global;
mod host;
mod merge;
mod source;

pub use defaults::{GlobalDefaults, HostDefaults};
pub use error::ConfigError;
pub use global::{
    destination_under, is_valid_hostname, resolve_global, CliOverrides, GlobalPolicy, HostTarget,
    MirrorSettings, NormalizedHostname, RelaySettings, ResolvedGlobal, HOST_STATE_FILE,
};
pub use host::{resolve_host, HostPolicy, ResolvedHost};
pub use merge::{deep_merge, merge_layers};
pub use source::{load_layer, parse_layer, ConfigOrigin, ConfigSource, LayerFormat};
