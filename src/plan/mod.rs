//! Backup planning
//!
//! Turns a resolved host policy into an ordered list of [`SyncTask`]s, one
//! per configured directory. Planning is pure: no I/O, and the same inputs
//! always give the same tasks in the same order.

mod command;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{destination_under, HostPolicy, HostTarget};

pub use command::{shell_quote, MirrorCommand};

/// One directory's resolved sync plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    /// Host the directory is mirrored from
    pub source_host: String,

    /// Absolute directory on the source host
    pub source_path: String,

    /// Local mirror location: the host backup dir with `source_path` appended
    pub destination_path: PathBuf,

    /// Paths excluded from this directory, in configured order
    pub exclude_paths: Vec<String>,
}

impl SyncTask {
    /// `<source_host>:<source_path>`, the mirror tool's source endpoint
    pub fn source_endpoint(&self) -> String {
        format!("{}:{}", self.source_host, self.source_path)
    }
}

/// Plan one task per entry of `policy.directories`, preserving order.
///
/// Repeated directories produce repeated tasks. Execution follows the
/// returned order, so a parent directory listed first is synced first.
pub fn plan(target: &HostTarget, policy: &HostPolicy) -> Vec<SyncTask> {
    policy
        .directories
        .iter()
        .map(|directory| SyncTask {
            source_host: target.hostname.clone(),
            source_path: directory.clone(),
            destination_path: destination_under(&target.backup_dir, directory),
            exclude_paths: policy.exclusions_for(directory).to_vec(),
        })
        .collect()
}
