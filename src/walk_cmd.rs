//! Walk command implementation
//!
//! Lists every cache-key node id, one per line, in stable order.

use anyhow::Result;
use lodestone::CacheStore;
use std::path::PathBuf;

/// Run the walk command
pub fn run_walk(db_path: PathBuf) -> Result<()> {
    let store = CacheStore::open(&db_path)?;
    store.walk(|id| {
        println!("{}", id);
        Ok(())
    })?;
    store.close()?;
    Ok(())
}
