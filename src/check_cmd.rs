//! Check command implementation
//!
//! Runs the structural invariant checks and reports findings. The
//! process exits non-zero when any error-level finding exists, so the
//! command can gate CI jobs and operator scripts.

use anyhow::Result;
use lodestone::CacheStore;
use std::path::PathBuf;

/// Run the check command
///
/// # Arguments
/// * `db_path` - Path to the cache database
/// * `json` - Emit the full report as JSON
///
/// # Returns
/// `true` when validation passed (warnings allowed)
pub fn run_check(db_path: PathBuf, json: bool) -> Result<bool> {
    let store = CacheStore::open(&db_path)?;
    let report = store.validate()?;
    store.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.passed);
    }

    for issue in &report.errors {
        println!("error [{}]: {}", issue.code, issue.message);
    }
    for issue in &report.warnings {
        println!("warning [{}]: {}", issue.code, issue.message);
    }
    if report.passed {
        println!("ok ({} warnings)", report.warnings.len());
    } else {
        println!(
            "FAILED: {} errors, {} warnings",
            report.errors.len(),
            report.warnings.len()
        );
    }

    Ok(report.passed)
}
