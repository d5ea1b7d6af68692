//! Release command implementation
//!
//! Manually releases one result id, reclaiming every node that becomes
//! unreachable. This is the operator-facing entry to the same sweep the
//! solver triggers when it drops a result.

use anyhow::Result;
use lodestone::{CacheStore, StoreError};
use std::path::PathBuf;

/// Run the release command
///
/// # Arguments
/// * `db_path` - Path to the cache database
/// * `result_id` - Result id to release
pub fn run_release(db_path: PathBuf, result_id: &str) -> Result<()> {
    let store = CacheStore::open(&db_path)?;

    match store.release(result_id) {
        Ok(()) => {
            println!("released {}", result_id);
        }
        Err(StoreError::NotFound) => {
            store.close()?;
            return Err(anyhow::anyhow!("result {} is not in the store", result_id));
        }
        Err(err) => {
            store.close()?;
            return Err(err.into());
        }
    }

    store.close()?;
    Ok(())
}
