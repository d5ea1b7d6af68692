//! Persistent cache graph storage
//!
//! Stores, for each cache-key node, the result identifiers observed as
//! its materializations and the labelled link edges through which the
//! node is reached, backed by a single SQLite file. Releasing a result
//! reclaims every node that becomes unreachable as a consequence.

mod encoding;
mod kv;
mod ops;
mod reclaim;
mod recover;
mod validation;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Result, StoreError};

pub use schema::{CacheInfoLink, CacheResult};
pub use validation::{ValidationIssue, ValidationReport};

/// Counts of persisted entities, as reported by [`CacheStore::stats`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    /// Number of live cache-key nodes.
    pub nodes: usize,
    /// Number of stored results across all nodes.
    pub results: usize,
    /// Number of link edges across all nodes.
    pub links: usize,
    /// Number of back-link entries across all nodes.
    pub backlinks: usize,
}

/// Persistent store for the build-cache graph.
///
/// One instance exclusively owns its database file. The store is safe to
/// share across threads; operations serialize on an internal writer lock
/// and each writer runs inside a single transaction, so every mutation
/// is all-or-nothing. Enumeration callbacks never run while the lock or
/// a transaction is held and may therefore re-enter the store.
#[derive(Debug)]
pub struct CacheStore {
    db: Mutex<Option<Connection>>,
}

impl CacheStore {
    /// Open (or create) a cache store at the given path.
    ///
    /// A corrupted existing file is renamed to `<path>.<id>.bak` and
    /// replaced by a fresh store; the recovery module documents the
    /// exact procedure. The file is created user read/write only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = recover::safe_open_db(path.as_ref())?;
        Ok(CacheStore {
            db: Mutex::new(Some(conn)),
        })
    }

    /// Release the underlying database handle.
    ///
    /// Subsequent operations fail with [`StoreError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        let conn = guard.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, err)| StoreError::from(err))
    }

    /// Check whether a cache-key node exists.
    ///
    /// A node exists from its first `add_result` or `add_link` as source
    /// until reclamation removes it. No error surface; a failed read
    /// reports the node as absent.
    pub fn exists(&self, id: &str) -> bool {
        self.read(|conn| ops::exists(conn, id)).unwrap_or(false)
    }

    /// Visit every existing node id exactly once.
    ///
    /// Order is unspecified but stable across calls when no mutation
    /// happens in between.
    pub fn walk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let ids = self.read(ops::collect_ids)?;
        for id in &ids {
            f(id)?;
        }
        Ok(())
    }

    /// Visit every result stored for `id`.
    ///
    /// An unknown id acts as empty and is not an error.
    pub fn walk_results<F>(&self, id: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&CacheResult) -> Result<()>,
    {
        let results = self.read(|conn| ops::collect_results(conn, id))?;
        for res in &results {
            f(res)?;
        }
        Ok(())
    }

    /// Load one result record.
    ///
    /// Fails with [`StoreError::NotFound`] when the node or the result
    /// is absent.
    pub fn load(&self, id: &str, result_id: &str) -> Result<CacheResult> {
        self.read(|conn| ops::load(conn, id, result_id))
    }

    /// Record a result for `id`, creating the node if needed.
    ///
    /// Idempotent. The result record, the reverse index entry, and the
    /// node-liveness marker are written in one transaction.
    pub fn add_result(&self, id: &str, res: &CacheResult) -> Result<()> {
        self.write(|tx| ops::add_result(tx, id, res))
    }

    /// Record a labelled link edge from `id` to `target`.
    ///
    /// Idempotent. Creates the source node if needed; the target is
    /// known by reference only and gets no node of its own.
    pub fn add_link(&self, id: &str, link: &CacheInfoLink, target: &str) -> Result<()> {
        self.write(|tx| ops::add_link(tx, id, link, target))
    }

    /// Visit every target reached from `id` through an edge carrying
    /// exactly this `link` label.
    pub fn walk_links<F>(&self, id: &str, link: &CacheInfoLink, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let targets = self.read(|conn| ops::collect_link_targets(conn, id, link))?;
        for target in &targets {
            f(target)?;
        }
        Ok(())
    }

    /// Visit every `(target, link)` edge outgoing from `id`.
    pub fn walk_links_all<F>(&self, id: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &CacheInfoLink) -> Result<()>,
    {
        let edges = self.read(|conn| ops::collect_all_links(conn, id))?;
        for (target, link) in &edges {
            f(target, link)?;
        }
        Ok(())
    }

    /// Point membership query for one edge. A failed read reports the
    /// edge as absent.
    pub fn has_link(&self, id: &str, link: &CacheInfoLink, target: &str) -> bool {
        self.read(|conn| ops::has_link(conn, id, link, target))
            .unwrap_or(false)
    }

    /// Visit every `(source, link)` pair with an edge into `id`.
    ///
    /// Delivered links are normalized: the digest fuses the original
    /// digest with the output index, and the output is zeroed, giving
    /// callers a canonical merged identity to hash uniformly.
    pub fn walk_backlinks<F>(&self, id: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &CacheInfoLink) -> Result<()>,
    {
        let edges = self.read(|conn| ops::collect_backlinks(conn, id))?;
        for (source, link) in &edges {
            f(source, link)?;
        }
        Ok(())
    }

    /// Visit every node id currently claiming `result_id`. The empty
    /// set is a valid, non-error outcome.
    pub fn walk_ids_by_result<F>(&self, result_id: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let ids = self.read(|conn| ops::collect_ids_by_result(conn, result_id))?;
        for id in &ids {
            f(id)?;
        }
        Ok(())
    }

    /// Release a result and reclaim every node that becomes
    /// unreachable as a consequence.
    ///
    /// Fails with [`StoreError::NotFound`] for an unknown result id.
    /// The whole reclamation runs in one transaction: either all
    /// consequences are visible or none.
    pub fn release(&self, result_id: &str) -> Result<()> {
        self.write(|tx| reclaim::release(tx, result_id))
    }

    /// Count persisted entities.
    pub fn stats(&self) -> Result<StoreStats> {
        self.read(ops::stats)
    }

    /// Check the store's structural invariants.
    ///
    /// Reports errors for broken index symmetry, unreachable nodes, and
    /// malformed link keys; stale back-link entries are warnings (they
    /// are tolerated by the read path, which re-derives labels from the
    /// forward index).
    pub fn validate(&self) -> Result<ValidationReport> {
        self.read(validation::validate)
    }

    /// Run a reader against the live connection.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Run a writer inside a single immediate transaction. Dropping the
    /// transaction on error rolls back every write.
    fn write<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A poisoned lock only means another thread panicked mid-read;
        // the connection itself stays consistent (transactions roll
        // back on drop), so recover the guard.
        self.db
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
