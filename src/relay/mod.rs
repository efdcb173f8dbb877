//! Remote execution through the admin host
//!
//! Mirror commands never run on the backup target directly. They are sent
//! to the admin (bastion) host, which pulls from the target with the mirror
//! tool:
//! - [`RemoteExecutor`]: the execution capability the backup runner uses
//! - [`SshRelay`]: real ssh, spawned from a structured argument vector
//! - [`MockRelay`]: in-process recorder with failure injection for tests

mod environment;
mod mock;
mod ssh;

use std::io;

use crate::plan::MirrorCommand;

pub use environment::{Environment, MapEnvironment, ProcessEnvironment};
pub use mock::{MockRelay, RecordedCall};
pub use ssh::{SshRelay, AGENT_SOCKET_VAR};

/// Runs a mirror command on the admin host
pub trait RemoteExecutor {
    /// Execute `command` on `admin_host`. With `dry_run` the command is only
    /// reported, but channel prerequisites are still checked.
    fn execute_remote(
        &self,
        admin_host: &str,
        command: &MirrorCommand,
        dry_run: bool,
    ) -> Result<(), RemoteExecutionError>;
}

/// Remote execution errors
#[derive(Debug, thiserror::Error)]
pub enum RemoteExecutionError {
    #[error("SSH_AUTH_SOCK is not set or points to a non-existent socket: {0}")]
    MissingAgentSocket(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("remote command on {admin_host} failed ({})", exit_description(.code))]
    NonZeroExit {
        admin_host: String,
        code: Option<i32>,
    },
}

impl RemoteExecutionError {
    /// Whether the failure happened before anything reached the admin host
    pub fn is_channel_failure(&self) -> bool {
        matches!(
            self,
            RemoteExecutionError::MissingAgentSocket(_) | RemoteExecutionError::Spawn { .. }
        )
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
