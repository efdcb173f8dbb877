//! Mock relay for tests
//!
//! Records every call and can be told to fail commands that carry a given
//! argument (usually a `<host>:<path>` source endpoint).

use std::collections::HashMap;
use std::sync::Mutex;

use super::{RemoteExecutionError, RemoteExecutor};
use crate::plan::MirrorCommand;

/// One recorded `execute_remote` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub admin_host: String,
    pub argv: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Exit(i32),
    Channel,
}

/// In-process [`RemoteExecutor`] that never touches the network
#[derive(Debug, Default)]
pub struct MockRelay {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<String, Failure>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail commands containing `arg` with a non-zero exit `code`
    pub fn fail_on(self, arg: impl Into<String>, code: i32) -> Self {
        self.lock_failures().insert(arg.into(), Failure::Exit(code));
        self
    }

    /// Fail commands containing `arg` as if the agent socket were missing
    pub fn fail_channel_on(self, arg: impl Into<String>) -> Self {
        self.lock_failures().insert(arg.into(), Failure::Channel);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashMap<String, Failure>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RemoteExecutor for MockRelay {
    fn execute_remote(
        &self,
        admin_host: &str,
        command: &MirrorCommand,
        dry_run: bool,
    ) -> Result<(), RemoteExecutionError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                admin_host: admin_host.to_string(),
                argv: command.argv().to_vec(),
                dry_run,
            });

        let failure = {
            let failures = self.lock_failures();
            command
                .argv()
                .iter()
                .find_map(|arg| failures.get(arg).copied())
        };

        match failure {
            None => Ok(()),
            Some(Failure::Exit(code)) => Err(RemoteExecutionError::NonZeroExit {
                admin_host: admin_host.to_string(),
                code: Some(code),
            }),
            Some(Failure::Channel) => Err(RemoteExecutionError::MissingAgentSocket(
                "mock".to_string(),
            )),
        }
    }
}
