//! Run outcome and stable exit codes

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the last run's summary inside a host backup directory
pub const SUMMARY_FILE: &str = "last_run.json";

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Configuration could not be found, parsed or validated
    Config = 10,
    /// The remote channel was unavailable (agent socket, ssh spawn)
    Channel = 20,
    /// The relayed mirror command exited non-zero
    Transfer = 30,
    /// Local I/O failure (backup root bootstrap, output)
    Io = 40,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// Outcome of a single directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// Not attempted because an earlier task failed
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub source_path: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one backup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSummary {
    pub hostname: String,
    pub admin_host: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskOutcome>,
    /// Exit code of the first failure, or 0
    pub exit_code: i32,
}

impl BackupSummary {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == ExitCode::Success.as_i32()
    }

    /// Wall-clock duration of the run in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }

    pub fn human_summary(&self) -> String {
        let prefix = if self.dry_run { "[NO-OP] " } else { "" };
        format!(
            "{}{}: {} succeeded, {} failed, {} skipped",
            prefix,
            self.hostname,
            self.count(TaskStatus::Succeeded),
            self.count(TaskStatus::Failed),
            self.count(TaskStatus::Skipped),
        )
    }
}
