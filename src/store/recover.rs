//! Open-time corruption recovery
//!
//! A cache database is disposable content but must never become a
//! boot-loop: if the file cannot be opened and it looks like it has
//! content, it is renamed aside and a fresh store is opened in its
//! place. The operator gets exactly one loud log line naming the backup
//! path. A second open failure is permanent.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::store::kv;

/// Open the database, recovering once from a corrupted file.
///
/// # Behavior
/// 1. Attempt a normal open behind a panic-to-error boundary.
/// 2. On failure, if the target file exists with non-zero size, assume
///    corruption: rename it to `<path>.<fresh-id>.bak`, log a single
///    operator warning, and retry the open once.
/// 3. A second failure is returned as-is.
pub fn safe_open_db(path: &Path) -> Result<Connection> {
    let attempt = catch_unwind(AssertUnwindSafe(|| open_db(path)))
        .unwrap_or_else(|panic| Err(StoreError::Corrupt(panic_message(panic))));

    match attempt {
        Ok(conn) => Ok(conn),
        Err(err) if file_has_content(path) => fallback_open_db(path, err),
        Err(err) => Err(err),
    }
}

/// Rename the damaged file aside and open a fresh database.
///
/// Called after the first open fails on a non-empty file.
fn fallback_open_db(path: &Path, open_err: StoreError) -> Result<Connection> {
    let backup_path = backup_path_for(path);
    tracing::error!(
        db = %path.display(),
        backup = %backup_path.display(),
        "failed to open cache database, resetting to empty; old database backed up to {}. \
         This usually means the process crashed or was killed while the cache was being \
         written. If earlier logs show a panic, please file a bug report. Open error: {}",
        backup_path.display(),
        open_err
    );

    fs::rename(path, &backup_path).map_err(|err| {
        StoreError::Io(format!(
            "failed to rename damaged database {} to {}: {}",
            path.display(),
            backup_path.display(),
            err
        ))
    })?;

    // This should be a new database. If it fails again, the error is
    // permanent.
    open_db(path)
}

/// Open the database file in user-only read/write mode and prepare it
/// for use: non-sync commits, schema init, structural probe.
fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    restrict_permissions(path)?;

    // Non-sync commit: a crash may lose recent writes, never structure.
    conn.pragma_update(None, "synchronous", "OFF")?;

    kv::init_schema(&conn)?;
    integrity_probe(&conn)?;
    Ok(conn)
}

/// Fail the open when the file is structurally damaged.
///
/// `quick_check` walks the b-tree pages; a pre-existing valid file that
/// was torn mid-write fails here rather than on some later read.
fn integrity_probe(conn: &Connection) -> Result<()> {
    let verdict: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if verdict != "ok" {
        return Err(StoreError::Corrupt(format!(
            "integrity check failed: {}",
            verdict
        )));
    }
    Ok(())
}

/// Backup destination: `<path>.<timestamp>-<pid>.bak`.
fn backup_path_for(path: &Path) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}-{}.bak", timestamp, process::id()));
    PathBuf::from(name)
}

/// Check if we have access to the file and it has a non-zero size.
fn file_has_content(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic during database open: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic during database open: {}", msg)
    } else {
        "panic during database open".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path_shape() {
        let backup = backup_path_for(Path::new("/tmp/cache.db"));
        let name = backup.to_string_lossy();
        assert!(name.starts_with("/tmp/cache.db."));
        assert!(name.ends_with(".bak"));
    }

    #[test]
    fn test_file_has_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("probe");

        assert!(!file_has_content(&path));
        fs::write(&path, b"").unwrap();
        assert!(!file_has_content(&path));
        fs::write(&path, b"x").unwrap();
        assert!(file_has_content(&path));
    }
}
