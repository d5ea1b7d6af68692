//! Lodestone: crash-safe persistent storage for build-cache graphs
//!
//! Lodestone remembers, for each cache-key node of an incremental build,
//! which result identifiers were observed as its materializations and
//! how the node is reached from other nodes through labelled link
//! edges. It answers existence and reachability queries, looks up
//! key→result and result→keys, and transitively reclaims storage when
//! results are released.
//!
//! # Guarantees
//!
//! - Every mutation is atomic: all index updates of one operation are
//!   visible together or not at all, including the whole transitive
//!   sweep of a [`CacheStore::release`].
//! - Enumeration order is unspecified but stable across calls over
//!   unchanged state.
//! - A corrupted database file is detected at open, moved aside to a
//!   `.bak` file, and replaced by a fresh store; cache content is
//!   reconstructible by definition, cache structure is never silently
//!   wrong.
//!
//! # Example
//!
//! ```ignore
//! let store = lodestone::CacheStore::open("/var/lib/build/cache.db")?;
//! store.add_result("key-a", &lodestone::CacheResult::new("res-1"))?;
//! store.walk(|id| {
//!     println!("{id}");
//!     Ok(())
//! })?;
//! store.release("res-1")?;
//! ```

pub mod error;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use store::{
    CacheInfoLink, CacheResult, CacheStore, StoreStats, ValidationIssue, ValidationReport,
};
