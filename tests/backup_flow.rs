//! End-to-end backup flow tests
//!
//! Tests for:
//! - Layered resolution of global and host policies from real files
//! - Plan construction against a temporary backup root
//! - Mirror command construction and relaying through the mock relay

use std::fs;
use std::path::{Path, PathBuf};

use hostmirror::backup::{
    prepare, record_summary, BackupRequest, BackupRunner, RunOptions, TaskStatus, SUMMARY_FILE,
};
use hostmirror::config::{
    resolve_global, resolve_host, CliOverrides, ConfigError, ConfigOrigin, GlobalDefaults,
    HostDefaults, HostTarget, RelaySettings,
};
use hostmirror::plan::{plan, MirrorCommand};
use hostmirror::relay::{MapEnvironment, MockRelay, RemoteExecutor, SshRelay};
use hostmirror::{BackupError, ExitCode};
use tempfile::tempdir;

fn basedir_overrides(basedir: &Path) -> CliOverrides {
    CliOverrides {
        backup_basedir: Some(basedir.to_path_buf()),
        ..Default::default()
    }
}

// =============================================================================
// Resolution Tests
// =============================================================================

mod resolution_tests {
    use super::*;

    #[test]
    fn test_host_backup_dir_derivation() {
        let global = resolve_global(
            &GlobalDefaults::default(),
            None,
            &basedir_overrides(Path::new("/tmp/b")),
        )
        .unwrap()
        .policy;

        let target = HostTarget::new(&global, "testhost").unwrap();
        assert_eq!(target.backup_dir, PathBuf::from("/tmp/b/TESTHOST"));
    }

    #[test]
    fn test_global_file_then_cli_precedence() {
        let dir = tempdir().unwrap();
        let global_file = dir.path().join("global.yml");
        fs::write(
            &global_file,
            "backup_basedir: /srv/backups\nuppercase_hostname: false\nadmin_host: bastion-1\n",
        )
        .unwrap();

        let cli = CliOverrides {
            admin_host: Some("bastion-2".to_string()),
            ..Default::default()
        };
        let resolved = resolve_global(&GlobalDefaults::default(), Some(global_file.as_path()), &cli).unwrap();

        assert_eq!(resolved.policy.backup_basedir, PathBuf::from("/srv/backups"));
        assert!(!resolved.policy.uppercase_hostname);
        assert_eq!(resolved.policy.admin_host, "bastion-2");

        let target = HostTarget::new(&resolved.policy, "web01").unwrap();
        assert_eq!(target.backup_dir, PathBuf::from("/srv/backups/web01"));
    }

    #[test]
    fn test_toml_global_file() {
        let dir = tempdir().unwrap();
        let global_file = dir.path().join("global.toml");
        fs::write(
            &global_file,
            "admin_host = \"bastion\"\n[relay]\nuse_sudo = false\n",
        )
        .unwrap();

        let policy = resolve_global(
            &GlobalDefaults::default(),
            Some(global_file.as_path()),
            &CliOverrides::default(),
        )
        .unwrap()
        .policy;
        assert_eq!(policy.admin_host, "bastion");
        assert!(!policy.relay.use_sudo);
        assert!(policy.relay.forward_agent);
    }

    #[test]
    fn test_missing_override_never_falls_back() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("override.yml");

        let result = resolve_host(
            &HostDefaults::default(),
            &dir.path().join("config.yml"),
            Some(missing.as_path()),
        );
        match result {
            Err(ConfigError::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_host_layers_in_order() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("config.yml");
        fs::write(&state, "directories: [/etc, /var]\n").unwrap();
        let override_file = dir.path().join("override.json");
        fs::write(&override_file, r#"{"exclusions": {"/etc": ["/etc/ssl/private"]}}"#).unwrap();

        let resolved =
            resolve_host(&HostDefaults::default(), &state, Some(override_file.as_path())).unwrap();

        assert_eq!(resolved.policy.directories, vec!["/etc", "/var"]);
        assert_eq!(resolved.policy.exclusions_for("/etc"), ["/etc/ssl/private"]);
        assert_eq!(resolved.policy.exclusions_for("/var"), ["/var/lib/yum"]);
        assert_eq!(resolved.sources[1].origin, ConfigOrigin::HostState);
        assert_eq!(resolved.sources[2].origin, ConfigOrigin::HostOverride);
    }
}

// =============================================================================
// Planning and Command Tests
// =============================================================================

mod planning_tests {
    use super::*;

    fn test_target() -> (HostTarget, hostmirror::GlobalPolicy) {
        let global = resolve_global(
            &GlobalDefaults::default(),
            None,
            &basedir_overrides(Path::new("/tmp/test_backups")),
        )
        .unwrap()
        .policy;
        (HostTarget::new(&global, "testhost").unwrap(), global)
    }

    #[test]
    fn test_command_for_excluded_directory() {
        let (target, global) = test_target();
        let dir = tempdir().unwrap();
        let state = dir.path().join("config.yml");
        fs::write(&state, "directories: [/etc, /var]\n").unwrap();
        let host = resolve_host(&HostDefaults::default(), &state, None)
            .unwrap()
            .policy;

        let tasks = plan(&target, &host);
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].exclude_paths.is_empty());

        let command = MirrorCommand::for_task(&tasks[1], &global.mirror);
        let argv = command.argv();
        assert!(argv.contains(&"testhost:/var".to_string()));
        assert_eq!(argv.last().unwrap(), "/tmp/test_backups/TESTHOST/var");
        let excludes: Vec<_> = argv.iter().filter(|a| a.starts_with("--exclude=")).collect();
        assert_eq!(excludes, vec!["--exclude=/var/lib/yum"]);
    }

    #[test]
    fn test_relay_wraps_command_for_admin_host() {
        let (target, global) = test_target();
        let dir = tempdir().unwrap();
        let host = resolve_host(&HostDefaults::default(), &dir.path().join("config.yml"), None)
            .unwrap()
            .policy;
        let tasks = plan(&target, &host);
        let command = MirrorCommand::for_task(&tasks[0], &global.mirror);

        let relay = SshRelay::with_environment(global.relay.clone(), MapEnvironment::new());
        let argv = relay.build_argv(&global.admin_host, &command);

        // the command runs on the admin host, the target is only the rsync source
        let host_pos = argv.iter().position(|a| a == "admin.example.com").unwrap();
        assert_eq!(argv[host_pos - 1], "--");
        assert_eq!(
            argv.last().unwrap(),
            "rsync -avxHP --exclude=/var/lib/yum testhost:/var /tmp/test_backups/TESTHOST/var"
        );
    }

    #[test]
    fn test_plan_twice_identical() {
        let (target, global) = test_target();
        let dir = tempdir().unwrap();
        let policy = resolve_host(&HostDefaults::default(), &dir.path().join("config.yml"), None)
            .unwrap()
            .policy;

        let render = |tasks: &[hostmirror::SyncTask]| {
            tasks
                .iter()
                .map(|t| MirrorCommand::for_task(t, &global.mirror).to_shell_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&plan(&target, &policy)), render(&plan(&target, &policy)));
    }
}

// =============================================================================
// Full Flow Tests
// =============================================================================

mod flow_tests {
    use super::*;

    #[test]
    fn test_prepare_and_run_with_mock_relay() {
        let root = tempdir().unwrap();
        let override_file = root.path().join("host.yml");
        fs::write(&override_file, "directories: [/etc, /etc, /var]\n").unwrap();

        let request = BackupRequest {
            hostname: "testhost".to_string(),
            host_config: Some(override_file),
            cli: basedir_overrides(root.path()),
            bootstrap: true,
            ..Default::default()
        };
        let prepared = prepare(&request, &mut std::io::sink()).unwrap();
        assert!(root.path().join("TESTHOST").is_dir());

        let relay = MockRelay::new();
        let policy = &prepared.global.policy;
        let runner = BackupRunner::new(&relay, &policy.admin_host, &policy.mirror, RunOptions::default());
        let summary = runner
            .run(&prepared.target.hostname, &prepared.tasks, &mut std::io::sink())
            .unwrap();

        assert!(summary.is_success());
        let calls = relay.calls();
        // duplicate directories are synced twice
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.admin_host == "admin.example.com"));
        assert_eq!(calls[0].argv, calls[1].argv);
        assert!(calls[2].argv.contains(&"--exclude=/var/lib/yum".to_string()));
    }

    #[test]
    fn test_no_op_creates_nothing() {
        let root = tempdir().unwrap();
        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            dry_run: true,
            bootstrap: true,
            ..Default::default()
        };
        let mut out: Vec<u8> = Vec::new();
        prepare(&request, &mut out).unwrap();

        assert!(!root.path().join("TESTHOST").exists());
        assert!(String::from_utf8(out).unwrap().contains("Would create backup directory"));
    }

    #[test]
    fn test_missing_agent_socket_stops_run() {
        let root = tempdir().unwrap();
        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            ..Default::default()
        };
        let prepared = prepare(&request, &mut std::io::sink()).unwrap();
        let policy = &prepared.global.policy;

        let relay = SshRelay::with_environment(policy.relay.clone(), MapEnvironment::new());
        let runner = BackupRunner::new(&relay, &policy.admin_host, &policy.mirror, RunOptions::default());
        let summary = runner
            .run(&prepared.target.hostname, &prepared.tasks, &mut std::io::sink())
            .unwrap();

        assert_eq!(summary.exit_code, ExitCode::Channel.as_i32());
        assert_eq!(summary.count(TaskStatus::Failed), 1);
        assert_eq!(summary.count(TaskStatus::Skipped), prepared.tasks.len() - 1);
    }

    #[test]
    fn test_malformed_host_state_is_config_error() {
        let root = tempdir().unwrap();
        let host_dir = root.path().join("TESTHOST");
        fs::create_dir_all(&host_dir).unwrap();
        fs::write(host_dir.join("config.yml"), "directories: /etc\n").unwrap();

        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            ..Default::default()
        };
        let err = prepare(&request, &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, BackupError::Config(ConfigError::Format { .. })));
        assert_eq!(err.exit_code(), ExitCode::Config);
    }

    #[test]
    fn test_trait_object_executor() {
        let relay = MockRelay::new().fail_on("testhost:/etc", 1);
        let executor: &dyn RemoteExecutor = &relay;

        let root = tempdir().unwrap();
        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            ..Default::default()
        };
        let prepared = prepare(&request, &mut std::io::sink()).unwrap();
        let policy = &prepared.global.policy;

        let runner = BackupRunner::new(executor, &policy.admin_host, &policy.mirror, RunOptions::default());
        let summary = runner
            .run(&prepared.target.hostname, &prepared.tasks, &mut std::io::sink())
            .unwrap();

        // default order is /var, /etc, ...; /etc fails and the rest are skipped
        assert_eq!(summary.tasks[0].status, TaskStatus::Succeeded);
        assert_eq!(summary.tasks[1].status, TaskStatus::Failed);
        assert_eq!(summary.count(TaskStatus::Skipped), 3);
        assert_eq!(summary.exit_code, ExitCode::Transfer.as_i32());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_remote_command_is_transfer_error() {
        let root = tempdir().unwrap();
        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            ..Default::default()
        };
        let prepared = prepare(&request, &mut std::io::sink()).unwrap();
        let policy = &prepared.global.policy;

        // `false` stands in for ssh: it spawns fine and exits 1
        let relay = SshRelay::with_environment(
            RelaySettings {
                ssh_program: "false".to_string(),
                use_sudo: false,
                forward_agent: false,
            },
            MapEnvironment::new(),
        );
        let runner = BackupRunner::new(&relay, &policy.admin_host, &policy.mirror, RunOptions::default());
        let summary = runner
            .run(&prepared.target.hostname, &prepared.tasks, &mut std::io::sink())
            .unwrap();

        assert_eq!(summary.exit_code, ExitCode::Transfer.as_i32());
        assert_eq!(summary.tasks[0].status, TaskStatus::Failed);
        assert!(summary.tasks[0].error.as_deref().unwrap().contains("exit status 1"));
        assert_eq!(summary.count(TaskStatus::Skipped), prepared.tasks.len() - 1);
    }

    #[test]
    fn test_run_summary_recorded_in_host_dir() {
        let root = tempdir().unwrap();
        let request = BackupRequest {
            hostname: "testhost".to_string(),
            cli: basedir_overrides(root.path()),
            bootstrap: true,
            ..Default::default()
        };
        let prepared = prepare(&request, &mut std::io::sink()).unwrap();
        let policy = &prepared.global.policy;

        let relay = MockRelay::new().fail_on("testhost:/srv", 23);
        let runner = BackupRunner::new(&relay, &policy.admin_host, &policy.mirror, RunOptions::default());
        let summary = runner
            .run(&prepared.target.hostname, &prepared.tasks, &mut std::io::sink())
            .unwrap();

        let path = record_summary(&prepared.target, &summary).unwrap().unwrap();
        assert_eq!(path, root.path().join("TESTHOST").join(SUMMARY_FILE));

        let recorded: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(recorded["hostname"], "testhost");
        assert_eq!(recorded["exit_code"], 30);
        assert_eq!(recorded["tasks"][2]["status"], "failed");
        assert_eq!(recorded["tasks"][3]["status"], "skipped");
        assert!(recorded["started_at"].is_string());
        assert!(recorded["finished_at"].is_string());
    }
}
