//! Backup orchestration
//!
//! Resolves both policies for one target host, bootstraps its backup
//! directory, plans the directory tasks and runs them through a relay.

mod bootstrap;
mod runner;
mod summary;

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::{
    resolve_global, resolve_host, CliOverrides, ConfigError, ConfigSource, GlobalDefaults,
    HostDefaults, HostTarget, ResolvedGlobal, ResolvedHost,
};
use crate::plan::{plan, MirrorCommand, SyncTask};

pub use bootstrap::{ensure_host_backup_dir, Bootstrap, HOST_DIR_MODE};
pub use runner::{BackupRunner, RunOptions};
pub use summary::{BackupSummary, ExitCode, TaskOutcome, TaskStatus, SUMMARY_FILE};

/// Backup errors
#[derive(Debug, Error)]
pub enum BackupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare backup directory {}: {source}", .path.display())]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write run summary {}: {source}", .path.display())]
    Summary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl BackupError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BackupError::Config(_) => ExitCode::Config,
            BackupError::Bootstrap { .. }
            | BackupError::Summary { .. }
            | BackupError::Output(_) => ExitCode::Io,
        }
    }
}

/// Everything a single invocation needs to resolve
#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    pub hostname: String,
    /// Global config file (`--config`)
    pub config: Option<PathBuf>,
    /// Per-invocation host override (`--host-config`)
    pub host_config: Option<PathBuf>,
    pub cli: CliOverrides,
    pub dry_run: bool,
    /// Create the host backup directory when it is missing
    pub bootstrap: bool,
}

/// Resolved policies and the plan for one host
#[derive(Debug, Clone)]
pub struct PreparedBackup {
    pub global: ResolvedGlobal,
    pub target: HostTarget,
    pub host: ResolvedHost,
    pub tasks: Vec<SyncTask>,
}

/// Resolve configuration and plan the backup of `request.hostname`.
///
/// Order matters: the host state file lives in the host backup directory,
/// which is only known once the global policy has been resolved.
pub fn prepare(request: &BackupRequest, out: &mut dyn Write) -> Result<PreparedBackup, BackupError> {
    let global = resolve_global(
        &GlobalDefaults::default(),
        request.config.as_deref(),
        &request.cli,
    )?;
    tracing::debug!(policy = ?global.policy, sources = ?global.sources, "resolved global policy");

    let target = HostTarget::new(&global.policy, &request.hostname)?;

    if request.bootstrap {
        ensure_host_backup_dir(&target.backup_dir, request.dry_run, out).map_err(|source| {
            BackupError::Bootstrap {
                path: target.backup_dir.clone(),
                source,
            }
        })?;
    }

    let host = resolve_host(
        &HostDefaults::default(),
        &target.host_state_path(),
        request.host_config.as_deref(),
    )?;
    tracing::debug!(policy = ?host.policy, sources = ?host.sources, "resolved host policy");

    let tasks = plan(&target, &host.policy);

    Ok(PreparedBackup {
        global,
        target,
        host,
        tasks,
    })
}

/// One planned task with the command that would be relayed for it
#[derive(Debug, Serialize)]
pub struct PlannedTask<'a> {
    #[serde(flatten)]
    pub task: &'a SyncTask,
    pub command: MirrorCommand,
}

/// What `plan` shows: the target, every contributing config layer and the
/// tasks with their commands
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub hostname: &'a str,
    pub admin_host: &'a str,
    pub host_backup_dir: String,
    pub sources: Vec<&'a ConfigSource>,
    pub tasks: Vec<PlannedTask<'a>>,
}

impl PreparedBackup {
    pub fn report(&self) -> PlanReport<'_> {
        let policy = &self.global.policy;
        PlanReport {
            hostname: &self.target.hostname,
            admin_host: &policy.admin_host,
            host_backup_dir: self.target.backup_dir.display().to_string(),
            sources: self.global.sources.iter().chain(&self.host.sources).collect(),
            tasks: self
                .tasks
                .iter()
                .map(|task| PlannedTask {
                    task,
                    command: MirrorCommand::for_task(task, &policy.mirror),
                })
                .collect(),
        }
    }
}

/// Persist `summary` as `<host_backup_dir>/last_run.json`.
///
/// Dry runs leave the host backup directory untouched and return `None`.
pub fn record_summary(
    target: &HostTarget,
    summary: &BackupSummary,
) -> Result<Option<PathBuf>, BackupError> {
    if summary.dry_run {
        return Ok(None);
    }

    let path = target.backup_dir.join(SUMMARY_FILE);
    summary
        .write_to_file(&path)
        .map_err(|source| BackupError::Summary {
            path: path.clone(),
            source,
        })?;
    tracing::info!(path = %path.display(), "wrote run summary");
    Ok(Some(path))
}
