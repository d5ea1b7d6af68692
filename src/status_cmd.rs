//! Status command implementation
//!
//! Prints entity counts for a cache database.

use anyhow::Result;
use lodestone::CacheStore;
use std::path::PathBuf;

/// Run the status command
///
/// # Arguments
/// * `db_path` - Path to the cache database
/// * `json` - Emit JSON instead of aligned human output
pub fn run_status(db_path: PathBuf, json: bool) -> Result<()> {
    let store = CacheStore::open(&db_path)?;
    let stats = store.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Database: {}", db_path.display());
        println!("  nodes:     {}", stats.nodes);
        println!("  results:   {}", stats.results);
        println!("  links:     {}", stats.links);
        println!("  backlinks: {}", stats.backlinks);
    }

    store.close()?;
    Ok(())
}
