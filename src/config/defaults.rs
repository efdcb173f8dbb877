//! Built-in defaults (lowest precedence layer)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Built-in global defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDefaults {
    /// Root under which every host gets its own backup directory
    pub backup_basedir: String,

    /// Uppercase the hostname when naming the host backup directory
    pub uppercase_hostname: bool,

    /// Relay host the mirror commands are executed on
    pub admin_host: String,

    /// Mirror tool executable on the admin host (default: "rsync")
    pub mirror_program: String,

    /// Flags passed to the mirror tool before any exclusions
    pub mirror_flags: Vec<String>,

    /// Local ssh client used to reach the admin host
    pub ssh_program: String,

    /// Wrap the ssh invocation in `sudo --preserve-env=SSH_AUTH_SOCK`
    pub use_sudo: bool,

    /// Forward the local ssh agent to the admin host (`ssh -A`)
    pub forward_agent: bool,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            backup_basedir: "/tmp/backupdir".to_string(),
            uppercase_hostname: true,
            admin_host: "admin.example.com".to_string(),
            mirror_program: "rsync".to_string(),
            mirror_flags: vec!["-avxHP".to_string()],
            ssh_program: "ssh".to_string(),
            use_sudo: true,
            forward_agent: true,
        }
    }
}

impl GlobalDefaults {
    /// Convert to a config layer, using the same key layout as config files
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "backup_basedir": self.backup_basedir,
            "uppercase_hostname": self.uppercase_hostname,
            "admin_host": self.admin_host,
            "mirror": {
                "program": self.mirror_program,
                "flags": self.mirror_flags
            },
            "relay": {
                "ssh_program": self.ssh_program,
                "use_sudo": self.use_sudo,
                "forward_agent": self.forward_agent
            }
        })
    }
}

/// Built-in per-host defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDefaults {
    pub directories: Vec<String>,
    pub exclusions: BTreeMap<String, Vec<String>>,
}

impl Default for HostDefaults {
    fn default() -> Self {
        let directories = ["/var", "/etc", "/srv", "/export", "/opt"]
            .into_iter()
            .map(String::from)
            .collect();

        let mut exclusions = BTreeMap::new();
        exclusions.insert("/var".to_string(), vec!["/var/lib/yum".to_string()]);

        Self {
            directories,
            exclusions,
        }
    }
}

impl HostDefaults {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "directories": self.directories,
            "exclusions": self.exclusions,
        })
    }
}
