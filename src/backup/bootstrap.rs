//! Host backup directory bootstrap
//!
//! A host's backup directory is created on first use with mode `2770`
//! (group-shared, setgid) so the backup group owns everything below it.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Mode applied to newly created host backup directories
pub const HOST_DIR_MODE: u32 = 0o2770;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    AlreadyExists,
    Created,
    /// Missing, but left alone because of `--no-op`
    WouldCreate,
}

/// Make sure `dir` exists, creating it (and its parents) if needed.
pub fn ensure_host_backup_dir(dir: &Path, dry_run: bool, out: &mut dyn Write) -> io::Result<Bootstrap> {
    if dir.exists() {
        return Ok(Bootstrap::AlreadyExists);
    }

    if dry_run {
        writeln!(out, "[NO-OP] Would create backup directory {}", dir.display())?;
        return Ok(Bootstrap::WouldCreate);
    }

    fs::create_dir_all(dir)?;
    tracing::info!(path = %dir.display(), "created host backup directory");
    set_group_mode(dir)?;

    Ok(Bootstrap::Created)
}

#[cfg(unix)]
fn set_group_mode(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::symlink_metadata(dir)?.permissions().mode() & 0o7777;
    if mode != HOST_DIR_MODE {
        tracing::debug!(path = %dir.display(), from = %format!("{:o}", mode), "setting mode 2770");
        fs::set_permissions(dir, fs::Permissions::from_mode(HOST_DIR_MODE))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_group_mode(_dir: &Path) -> io::Result<()> {
    Ok(())
}
