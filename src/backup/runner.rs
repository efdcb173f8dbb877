//! Sequential plan execution
//!
//! Tasks run one at a time in plan order. By default the first failure
//! stops the run and every remaining task is reported as skipped; with
//! `continue_on_error` each task is attempted regardless.

use std::io::Write;

use chrono::Utc;

use super::summary::{BackupSummary, ExitCode, TaskOutcome, TaskStatus};
use super::BackupError;
use crate::config::MirrorSettings;
use crate::plan::{MirrorCommand, SyncTask};
use crate::relay::{RemoteExecutionError, RemoteExecutor};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report commands without executing them
    pub dry_run: bool,
    pub continue_on_error: bool,
}

/// Drives a backup plan through a [`RemoteExecutor`]
pub struct BackupRunner<'a, X: RemoteExecutor + ?Sized> {
    executor: &'a X,
    admin_host: &'a str,
    mirror: &'a MirrorSettings,
    options: RunOptions,
}

impl<'a, X: RemoteExecutor + ?Sized> BackupRunner<'a, X> {
    pub fn new(
        executor: &'a X,
        admin_host: &'a str,
        mirror: &'a MirrorSettings,
        options: RunOptions,
    ) -> Self {
        Self {
            executor,
            admin_host,
            mirror,
            options,
        }
    }

    /// Execute `tasks` in order, writing progress lines to `out`.
    ///
    /// Task failures are recorded in the summary, not returned; the only
    /// error is failing to write to `out`.
    pub fn run(
        &self,
        hostname: &str,
        tasks: &[SyncTask],
        out: &mut dyn Write,
    ) -> Result<BackupSummary, BackupError> {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut first_failure: Option<ExitCode> = None;

        tracing::info!(
            hostname,
            admin_host = self.admin_host,
            directories = tasks.len(),
            dry_run = self.options.dry_run,
            "starting backup"
        );

        for task in tasks {
            if first_failure.is_some() && !self.options.continue_on_error {
                outcomes.push(TaskOutcome {
                    source_path: task.source_path.clone(),
                    status: TaskStatus::Skipped,
                    error: None,
                });
                continue;
            }

            writeln!(out, "Backing up {}", task.source_path).map_err(BackupError::Output)?;
            let command = MirrorCommand::for_task(task, self.mirror);
            if self.options.dry_run {
                writeln!(out, "[NO-OP] {}: {}", self.admin_host, command)
                    .map_err(BackupError::Output)?;
            }

            match self
                .executor
                .execute_remote(self.admin_host, &command, self.options.dry_run)
            {
                Ok(()) => {
                    tracing::info!(directory = %task.source_path, "directory synced");
                    outcomes.push(TaskOutcome {
                        source_path: task.source_path.clone(),
                        status: TaskStatus::Succeeded,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!(directory = %task.source_path, error = %e, "directory sync failed");
                    first_failure.get_or_insert(exit_code_for(&e));
                    outcomes.push(TaskOutcome {
                        source_path: task.source_path.clone(),
                        status: TaskStatus::Failed,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(BackupSummary {
            hostname: hostname.to_string(),
            admin_host: self.admin_host.to_string(),
            dry_run: self.options.dry_run,
            started_at,
            finished_at: Utc::now(),
            tasks: outcomes,
            exit_code: first_failure.unwrap_or(ExitCode::Success).as_i32(),
        })
    }
}

fn exit_code_for(err: &RemoteExecutionError) -> ExitCode {
    if err.is_channel_failure() {
        ExitCode::Channel
    } else {
        ExitCode::Transfer
    }
}
