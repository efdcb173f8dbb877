//! hostmirror - selective per-host directory mirroring
//!
//! Mirrors a configured set of directories from a target host into
//! `<backup_basedir>/<HOSTNAME>/...` by running the mirror tool on an admin
//! (bastion) host over ssh. Configuration is layered: built-in defaults,
//! global file, CLI flags, persisted host state and per-run overrides are
//! deep-merged into typed policies, which the planner turns into one
//! ordered sync task per directory.

pub mod backup;
pub mod config;
pub mod logging;
pub mod plan;
pub mod relay;

pub use backup::{prepare, BackupError, BackupRequest, BackupRunner, BackupSummary, ExitCode, RunOptions};
pub use config::{ConfigError, GlobalPolicy, HostPolicy, HostTarget};
pub use plan::{plan, MirrorCommand, SyncTask};
pub use relay::{RemoteExecutionError, RemoteExecutor, SshRelay};
