//! Transitive reclamation of released results
//!
//! Releasing a result removes it from every node that claimed it, then
//! prunes each node that became a sink (no results, no outgoing links)
//! and propagates the pruning to predecessors that become sinks in
//! turn. The whole sweep runs inside the caller's transaction, so a
//! failure anywhere leaves the store exactly as it was.
//!
//! Termination: each level of the recursion either stops at a live node
//! or removes at least one `_links` bucket, and a node never recurses
//! into itself, so the set of existing buckets strictly shrinks along
//! every recursion path. Self-loop edges are treated as weight-less:
//! they neither keep a node alive nor get followed.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::store::encoding::{id_from_bytes, split_composite_key};
use crate::store::kv;
use crate::store::schema::{BACKLINKS_NS, BY_RESULT_NS, LINKS_NS, RESULTS_NS};

/// Release `result_id` from every node claiming it.
///
/// Fails with [`StoreError::NotFound`] when no node claims the result.
pub fn release(conn: &Connection, result_id: &str) -> Result<()> {
    if !kv::bucket_exists(conn, BY_RESULT_NS, result_id.as_bytes())? {
        return Err(StoreError::NotFound);
    }
    // Collect before mutating: release_helper edits the bucket being
    // iterated.
    let ids = kv::list_keys(conn, BY_RESULT_NS, result_id.as_bytes())?;
    for id in ids {
        let id = id_from_bytes(id)?;
        release_helper(conn, &id, result_id)?;
    }
    Ok(())
}

/// Drop one `(id, result_id)` claim and prune the node if it became a
/// sink.
///
/// # Behavior
/// 1. Delete `results[id][result_id]`. A node with no results bucket
///    has nothing to release; return.
/// 2. Delete `by_result[result_id][id]`; drop the `by_result` bucket
///    itself once it is empty.
/// 3. Sweep the node through [`empty_branch_with_parents`].
fn release_helper(conn: &Connection, id: &str, result_id: &str) -> Result<()> {
    if !kv::bucket_exists(conn, RESULTS_NS, id.as_bytes())? {
        return Ok(());
    }
    kv::delete(conn, RESULTS_NS, id.as_bytes(), result_id.as_bytes())?;

    if kv::bucket_exists(conn, BY_RESULT_NS, result_id.as_bytes())? {
        kv::delete(conn, BY_RESULT_NS, result_id.as_bytes(), id.as_bytes())?;
        if kv::bucket_is_empty(conn, BY_RESULT_NS, result_id.as_bytes())? {
            kv::delete_bucket(conn, BY_RESULT_NS, result_id.as_bytes())?;
        }
    }

    empty_branch_with_parents(conn, id)
}

/// Remove a sink node and propagate removal to predecessors that become
/// sinks as a consequence.
///
/// A node is a sink when it has no results and no outgoing links;
/// absent buckets count as empty, and self-loop edges do not count as
/// outgoing. A node that is not a sink is left untouched.
fn empty_branch_with_parents(conn: &Connection, id: &str) -> Result<()> {
    if !kv::bucket_is_empty(conn, RESULTS_NS, id.as_bytes())? {
        return Ok(());
    }
    if !links_empty_ignoring_self(conn, id)? {
        return Ok(());
    }

    let sources = kv::list_keys(conn, BACKLINKS_NS, id.as_bytes())?;
    for source in sources {
        let source = id_from_bytes(source)?;
        // A predecessor already pruned by a sibling branch of this
        // sweep has no links bucket anymore; skip it.
        if kv::bucket_exists(conn, LINKS_NS, source.as_bytes())? {
            // Collect matching keys first; deleting while iterating the
            // same bucket is not allowed.
            let mut to_delete = Vec::new();
            for key in kv::list_keys(conn, LINKS_NS, source.as_bytes())? {
                let (_, target) = split_composite_key(&key)?;
                if target == id.as_bytes() {
                    to_delete.push(key);
                }
            }
            for key in &to_delete {
                kv::delete(conn, LINKS_NS, source.as_bytes(), key)?;
            }

            if kv::bucket_is_empty(conn, LINKS_NS, source.as_bytes())?
                && kv::bucket_is_empty(conn, RESULTS_NS, source.as_bytes())?
            {
                kv::delete_bucket(conn, LINKS_NS, source.as_bytes())?;
            }
        }

        // The enclosing call is already pruning `id`; recursing into it
        // would revisit the node forever.
        if source != id {
            empty_branch_with_parents(conn, &source)?;
        }
    }
    kv::delete_bucket(conn, BACKLINKS_NS, id.as_bytes())?;

    // May already be absent; bucket deletion is a no-op then.
    kv::delete_bucket(conn, LINKS_NS, id.as_bytes())?;
    kv::delete_bucket(conn, RESULTS_NS, id.as_bytes())?;

    Ok(())
}

/// True iff `links[id]` holds no edge to another node. Self-loops are
/// ignored: an edge from a node to itself cannot make the node
/// reachable.
fn links_empty_ignoring_self(conn: &Connection, id: &str) -> Result<bool> {
    for key in kv::list_keys(conn, LINKS_NS, id.as_bytes())? {
        let (_, target) = split_composite_key(&key)?;
        if target != id.as_bytes() {
            return Ok(false);
        }
    }
    Ok(true)
}
