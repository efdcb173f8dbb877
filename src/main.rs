//! hostmirror CLI
//!
//! Entry point for the `hostmirror` command-line tool.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use hostmirror::backup::{
    prepare, record_summary, BackupRequest, BackupRunner, ExitCode, PreparedBackup, RunOptions,
};
use hostmirror::config::CliOverrides;
use hostmirror::logging;
use hostmirror::relay::SshRelay;

#[derive(Parser)]
#[command(name = "hostmirror")]
#[command(
    about = "Back up selected directories of a remote host through an admin host using rsync",
    version
)]
struct Cli {
    /// Print verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Print actions without performing them
    #[arg(long, global = true)]
    no_op: bool,

    /// Base directory for backups (overrides config files)
    #[arg(long, global = true)]
    backup_basedir: Option<PathBuf>,

    /// Admin host to run mirror commands on (overrides config files)
    #[arg(long, global = true)]
    admin_host: Option<String>,

    /// Uppercase the hostname for the backup directory (overrides config files)
    #[arg(long, global = true)]
    uppercase_hostname: bool,

    /// Path to global configuration file (YAML, JSON or TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Path to host-specific configuration file (YAML, JSON or TOML)
    #[arg(long, global = true)]
    host_config: Option<PathBuf>,

    /// Keep going after a directory fails instead of stopping the run
    #[arg(long, global = true)]
    continue_on_error: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up the configured directories of a host
    Backup {
        /// Target hostname
        hostname: String,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a host from its backup (not implemented, reports only)
    Restore {
        /// Target hostname
        hostname: String,
    },

    /// Show the backup plan and remote commands without running anything
    Plan {
        /// Target hostname
        hostname: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose));

    let code = match cli.command {
        Commands::Backup { ref hostname, json } => run_backup(&cli, hostname, json),
        Commands::Restore { ref hostname } => run_restore(&cli, hostname),
        Commands::Plan { ref hostname, json } => run_plan(&cli, hostname, json),
    };

    process::exit(code);
}

fn request(cli: &Cli, hostname: &str, bootstrap: bool) -> BackupRequest {
    BackupRequest {
        hostname: hostname.to_string(),
        config: cli.config.clone(),
        host_config: cli.host_config.clone(),
        cli: CliOverrides {
            backup_basedir: cli.backup_basedir.clone(),
            admin_host: cli.admin_host.clone(),
            uppercase_hostname: cli.uppercase_hostname.then_some(true),
        },
        dry_run: cli.no_op,
        bootstrap,
    }
}

fn prepare_or_exit(req: &BackupRequest, out: &mut dyn Write) -> Result<PreparedBackup, i32> {
    prepare(req, out).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code().as_i32()
    })
}

fn run_backup(cli: &Cli, hostname: &str, json: bool) -> i32 {
    // --json keeps stdout for the summary document only
    let mut out: Box<dyn Write> = if json {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout().lock())
    };

    let prepared = match prepare_or_exit(&request(cli, hostname, true), &mut *out) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let policy = &prepared.global.policy;
    let relay = SshRelay::new(policy.relay.clone());
    let options = RunOptions {
        dry_run: cli.no_op,
        continue_on_error: cli.continue_on_error,
    };
    let runner = BackupRunner::new(&relay, &policy.admin_host, &policy.mirror, options);

    let summary = match runner.run(&prepared.target.hostname, &prepared.tasks, &mut *out) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code().as_i32();
        }
    };

    for task in &summary.tasks {
        if let Some(ref error) = task.error {
            eprintln!("Error: {}: {}", task.source_path, error);
        }
    }

    if json {
        match summary.to_json() {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Error serializing summary: {}", e),
        }
    } else {
        println!("{}", summary.human_summary());
    }

    if let Err(e) = record_summary(&prepared.target, &summary) {
        eprintln!("Error: {}", e);
        if summary.is_success() {
            return e.exit_code().as_i32();
        }
    }

    summary.exit_code
}

fn run_restore(cli: &Cli, hostname: &str) -> i32 {
    let prepared = match prepare_or_exit(&request(cli, hostname, false), &mut io::stdout()) {
        Ok(p) => p,
        Err(code) => return code,
    };

    tracing::info!(hostname, "restoring host");
    println!(
        "Restore is not implemented; nothing was changed for {} ({} directories under {})",
        prepared.target.hostname,
        prepared.tasks.len(),
        prepared.target.backup_dir.display()
    );
    0
}

fn run_plan(cli: &Cli, hostname: &str, json: bool) -> i32 {
    let prepared = match prepare_or_exit(&request(cli, hostname, false), &mut io::stdout()) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let report = prepared.report();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return 1;
            }
        }
        return ExitCode::Success.as_i32();
    }

    println!("Host: {} -> {}", report.hostname, report.host_backup_dir);
    println!("Admin host: {}", report.admin_host);
    for source in &report.sources {
        match (&source.path, &source.digest) {
            (Some(path), Some(digest)) => {
                println!("Config: {:?} {} (sha256 {})", source.origin, path, digest)
            }
            _ => println!("Config: {:?}", source.origin),
        }
    }
    for (i, planned) in report.tasks.iter().enumerate() {
        println!();
        println!("  [{}] {}", i + 1, planned.task.source_path);
        if !planned.task.exclude_paths.is_empty() {
            println!("      excludes: {}", planned.task.exclude_paths.join(", "));
        }
        println!("      {}", planned.command);
    }
    ExitCode::Success.as_i32()
}
