//! Links command implementation
//!
//! Lists the outgoing link edges of one cache-key node.

use anyhow::Result;
use lodestone::CacheStore;
use std::path::PathBuf;

/// Run the links command
///
/// # Arguments
/// * `db_path` - Path to the cache database
/// * `id` - Cache-key node id to list outgoing links for
pub fn run_links(db_path: PathBuf, id: &str) -> Result<()> {
    let store = CacheStore::open(&db_path)?;
    store.walk_links_all(id, |target, link| {
        let mut line = format!("{}\tdigest={} output={}", target, link.digest, link.output);
        if link.input != 0 {
            line.push_str(&format!(" input={}", link.input));
        }
        if !link.selector.is_empty() {
            line.push_str(&format!(" selector={}", link.selector));
        }
        println!("{}", line);
        Ok(())
    })?;
    store.close()?;
    Ok(())
}
