//! Mirror tool command construction
//!
//! A [`MirrorCommand`] is a discrete argument vector. It only becomes a
//! string when it has to cross the ssh hop, and then every argument is
//! quoted for the admin host's shell.

use std::fmt;

use serde::Serialize;

use super::SyncTask;
use crate::config::MirrorSettings;

/// Mirror tool invocation for one task:
/// `<program> <flags...> [--exclude=<path>]... <host>:<path> <destination>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorCommand {
    argv: Vec<String>,
}

impl MirrorCommand {
    pub fn for_task(task: &SyncTask, mirror: &MirrorSettings) -> Self {
        let mut argv = Vec::with_capacity(3 + mirror.flags.len() + task.exclude_paths.len());
        argv.push(mirror.program.clone());
        argv.extend(mirror.flags.iter().cloned());
        argv.extend(
            task.exclude_paths
                .iter()
                .map(|path| format!("--exclude={}", path)),
        );
        argv.push(task.source_endpoint());
        argv.push(task.destination_path.to_string_lossy().into_owned());
        Self { argv }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Single string for a remote shell, each argument quoted as needed.
    pub fn to_shell_string(&self) -> String {
        self.argv
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for MirrorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Quote a string for a POSIX shell.
///
/// Plain path-like words pass through untouched; anything else is wrapped
/// in single quotes with embedded single quotes escaped.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.' | ':' | '=' | '@' | '+' | ',')
        })
    {
        return s.to_owned();
    }

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}
