//! Reader and writer operations over the cache graph indices
//!
//! Writers take the caller's open transaction so that every index a
//! mutation touches moves in one atomic step: `add_result` maintains the
//! result record, the reverse index, and the node-liveness marker
//! together; `add_link` maintains the forward edge and its back-link
//! together. Readers collect into owned buffers; callback delivery is
//! the facade's job, after the lock is gone.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::store::encoding::{
    composite_key, decode_link, decode_result, encode_result, fuse_backlink, id_from_bytes,
    link_prefix, split_composite_key,
};
use crate::store::kv;
use crate::store::schema::{
    CacheInfoLink, CacheResult, BACKLINKS_NS, BY_RESULT_NS, LINKS_NS, RESULTS_NS,
};
use crate::store::StoreStats;

/// Node liveness: the `_links` bucket is the canonical marker.
pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    kv::bucket_exists(conn, LINKS_NS, id.as_bytes())
}

/// All existing node ids, in stable order.
pub fn collect_ids(conn: &Connection) -> Result<Vec<String>> {
    kv::list_buckets(conn, LINKS_NS)?
        .into_iter()
        .map(id_from_bytes)
        .collect()
}

/// All results stored for `id`. An unknown id yields the empty vector.
pub fn collect_results(conn: &Connection, id: &str) -> Result<Vec<CacheResult>> {
    let entries = kv::list_entries(conn, RESULTS_NS, id.as_bytes())?;
    entries
        .into_iter()
        .map(|(_, value)| decode_result(&value))
        .collect()
}

/// Load one result record, or `NotFound`.
pub fn load(conn: &Connection, id: &str, result_id: &str) -> Result<CacheResult> {
    let value = kv::get(conn, RESULTS_NS, id.as_bytes(), result_id.as_bytes())?
        .ok_or(StoreError::NotFound)?;
    decode_result(&value)
}

/// Record a result for `id`.
///
/// # Behavior
/// 1. Ensure the node's `_links` bucket exists (node liveness).
/// 2. Write `results[id][res.id] <- encode(res)`.
/// 3. Write `by_result[res.id][id] <- ()`.
pub fn add_result(conn: &Connection, id: &str, res: &CacheResult) -> Result<()> {
    kv::create_bucket_if_not_exists(conn, LINKS_NS, id.as_bytes())?;
    let blob = encode_result(res)?;
    kv::put(conn, RESULTS_NS, id.as_bytes(), res.id.as_bytes(), &blob)?;
    kv::put(conn, BY_RESULT_NS, res.id.as_bytes(), id.as_bytes(), &[])?;
    Ok(())
}

/// Record a link edge `id --link--> target`.
///
/// Creates the source node if needed. The target is NOT materialized:
/// the back-link may reference a node that does not exist yet.
pub fn add_link(conn: &Connection, id: &str, link: &CacheInfoLink, target: &str) -> Result<()> {
    kv::create_bucket_if_not_exists(conn, LINKS_NS, id.as_bytes())?;
    let key = composite_key(link, target)?;
    kv::put(conn, LINKS_NS, id.as_bytes(), &key, &[])?;
    kv::put(conn, BACKLINKS_NS, target.as_bytes(), id.as_bytes(), &[])?;
    Ok(())
}

/// All targets reached from `id` through exactly this `link` label.
///
/// Seeks on the `enc(link) "@"` prefix; the key remainder after the
/// prefix is the target id.
pub fn collect_link_targets(
    conn: &Connection,
    id: &str,
    link: &CacheInfoLink,
) -> Result<Vec<String>> {
    let prefix = link_prefix(link)?;
    let keys = kv::scan_prefix(conn, LINKS_NS, id.as_bytes(), &prefix)?;
    keys.into_iter()
        .map(|key| id_from_bytes(key[prefix.len()..].to_vec()))
        .collect()
}

/// All `(target, link)` edges outgoing from `id`.
pub fn collect_all_links(conn: &Connection, id: &str) -> Result<Vec<(String, CacheInfoLink)>> {
    let keys = kv::list_keys(conn, LINKS_NS, id.as_bytes())?;
    let mut edges = Vec::with_capacity(keys.len());
    for key in keys {
        let (enc, target) = split_composite_key(&key)?;
        let link = decode_link(enc)?;
        edges.push((id_from_bytes(target.to_vec())?, link));
    }
    Ok(edges)
}

/// Point membership query for one edge. No enumeration, no allocation
/// beyond the composite key itself.
pub fn has_link(conn: &Connection, id: &str, link: &CacheInfoLink, target: &str) -> Result<bool> {
    let key = composite_key(link, target)?;
    Ok(kv::get(conn, LINKS_NS, id.as_bytes(), &key)?.is_some())
}

/// All `(source, link)` pairs with an edge into `id`.
///
/// The back-link index stores sources without labels, so each source's
/// forward bucket is re-scanned and filtered down to edges whose target
/// is `id`. Delivered links are normalized via [`fuse_backlink`].
pub fn collect_backlinks(conn: &Connection, id: &str) -> Result<Vec<(String, CacheInfoLink)>> {
    let mut out = Vec::new();
    for source in kv::list_keys(conn, BACKLINKS_NS, id.as_bytes())? {
        for key in kv::list_keys(conn, LINKS_NS, &source)? {
            let (enc, target) = split_composite_key(&key)?;
            if target != id.as_bytes() {
                continue;
            }
            let link = decode_link(enc)?;
            out.push((id_from_bytes(source.clone())?, fuse_backlink(link)));
        }
    }
    Ok(out)
}

/// All node ids currently claiming `result_id`.
pub fn collect_ids_by_result(conn: &Connection, result_id: &str) -> Result<Vec<String>> {
    kv::list_keys(conn, BY_RESULT_NS, result_id.as_bytes())?
        .into_iter()
        .map(id_from_bytes)
        .collect()
}

/// Count persisted entities per index.
pub fn stats(conn: &Connection) -> Result<StoreStats> {
    Ok(StoreStats {
        nodes: kv::count_buckets(conn, LINKS_NS)?,
        results: kv::count_entries(conn, RESULTS_NS)?,
        links: kv::count_entries(conn, LINKS_NS)?,
        backlinks: kv::count_entries(conn, BACKLINKS_NS)?,
    })
}
