//! Results command implementation
//!
//! Lists the results stored for one cache-key node. An unknown node
//! prints nothing; node existence is a separate question (`walk`).

use anyhow::Result;
use lodestone::CacheStore;
use std::path::PathBuf;

/// Run the results command
///
/// # Arguments
/// * `db_path` - Path to the cache database
/// * `id` - Cache-key node id to list results for
pub fn run_results(db_path: PathBuf, id: &str) -> Result<()> {
    let store = CacheStore::open(&db_path)?;
    store.walk_results(id, |res| {
        if res.created_at > 0 {
            println!("{}\tcreated_at={}", res.id, res.created_at);
        } else {
            println!("{}", res.id);
        }
        Ok(())
    })?;
    store.close()?;
    Ok(())
}
