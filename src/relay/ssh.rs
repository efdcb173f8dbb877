//! ssh relay to the admin host
//!
//! The local side is spawned directly from an argument vector, no local
//! shell involved:
//!
//! ```text
//! [sudo --preserve-env=SSH_AUTH_SOCK] ssh [-A] -o BatchMode=yes -- <admin_host> '<quoted mirror command>'
//! ```
//!
//! The only string that reaches a shell is the mirror command on the admin
//! host, and every argument in it is quoted.

use std::path::Path;
use std::process::Command;

use super::environment::{Environment, ProcessEnvironment};
use super::{RemoteExecutionError, RemoteExecutor};
use crate::config::RelaySettings;
use crate::plan::MirrorCommand;

/// Environment variable holding the ssh agent socket
pub const AGENT_SOCKET_VAR: &str = "SSH_AUTH_SOCK";

/// Executes mirror commands on the admin host over ssh
pub struct SshRelay<E: Environment = ProcessEnvironment> {
    settings: RelaySettings,
    env: E,
}

impl SshRelay<ProcessEnvironment> {
    pub fn new(settings: RelaySettings) -> Self {
        Self::with_environment(settings, ProcessEnvironment)
    }
}

impl<E: Environment> SshRelay<E> {
    pub fn with_environment(settings: RelaySettings, env: E) -> Self {
        Self { settings, env }
    }

    /// Full local argument vector for running `command` on `admin_host`
    pub fn build_argv(&self, admin_host: &str, command: &MirrorCommand) -> Vec<String> {
        let mut argv = Vec::new();

        if self.settings.use_sudo {
            argv.push("sudo".to_string());
            argv.push(format!("--preserve-env={}", AGENT_SOCKET_VAR));
        }

        argv.push(self.settings.ssh_program.clone());
        if self.settings.forward_agent {
            argv.push("-A".to_string());
        }
        argv.push("-o".to_string());
        argv.push("BatchMode=yes".to_string());
        argv.push("--".to_string());
        argv.push(admin_host.to_string());
        argv.push(command.to_shell_string());

        argv
    }

    /// Agent forwarding needs a live agent socket
    fn check_agent_socket(&self) -> Result<(), RemoteExecutionError> {
        if !self.settings.forward_agent {
            return Ok(());
        }

        match self.env.var(AGENT_SOCKET_VAR) {
            None => Err(RemoteExecutionError::MissingAgentSocket("not set".to_string())),
            Some(sock) if sock.is_empty() => {
                Err(RemoteExecutionError::MissingAgentSocket("empty".to_string()))
            }
            Some(sock) if !self.env.path_exists(Path::new(&sock)) => {
                Err(RemoteExecutionError::MissingAgentSocket(sock))
            }
            Some(_) => Ok(()),
        }
    }
}

impl<E: Environment> RemoteExecutor for SshRelay<E> {
    fn execute_remote(
        &self,
        admin_host: &str,
        command: &MirrorCommand,
        dry_run: bool,
    ) -> Result<(), RemoteExecutionError> {
        self.check_agent_socket()?;

        let argv = self.build_argv(admin_host, command);
        tracing::debug!(admin_host, argv = ?argv, dry_run, "relaying mirror command");

        if dry_run {
            return Ok(());
        }

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|source| RemoteExecutionError::Spawn {
                program: argv[0].clone(),
                source,
            })?;

        if !status.success() {
            return Err(RemoteExecutionError::NonZeroExit {
                admin_host: admin_host.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }
}
