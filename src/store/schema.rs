//! Record schema for the cache store
//!
//! Defines the persisted record payloads and the fixed namespace names.
//! Namespace names are on-disk ABI: files written by earlier releases
//! must keep reading, so they never change.

use serde::{Deserialize, Serialize};

/// Namespace holding `results[id][result_id] -> CacheResult` blobs.
pub const RESULTS_NS: &str = "_result";

/// Namespace holding `links[id][enc(link) "@" target] -> ()` edges.
///
/// A node's bucket in this namespace is the canonical "node lives"
/// predicate, even when the bucket holds no edges.
pub const LINKS_NS: &str = "_links";

/// Namespace holding the reverse index `by_result[result_id][id] -> ()`.
pub const BY_RESULT_NS: &str = "_byresult";

/// Namespace holding `backlinks[target][source] -> ()`.
///
/// Records only the existence of an incoming edge; the edge label is
/// recovered by scanning `links[source]` when needed.
pub const BACKLINKS_NS: &str = "_backlinks";

/// A materialized result observed for a cache-key node.
///
/// The store treats the payload as opaque beyond the `id` field: it is
/// serialized as a self-describing record blob, and decoding tolerates
/// unknown fields so future writers can extend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheResult {
    /// Opaque result identifier (snapshot/blob reference).
    pub id: String,

    /// Unix timestamp (seconds since epoch) when the result was created.
    #[serde(default)]
    pub created_at: i64,
}

impl CacheResult {
    /// Convenience constructor for a result with no creation time.
    pub fn new(id: impl Into<String>) -> Self {
        CacheResult {
            id: id.into(),
            created_at: 0,
        }
    }
}

/// Label of a directed edge between two cache-key nodes.
///
/// Two links are equal iff their canonical encoded forms are byte-equal;
/// see [`crate::store::encoding`]. Field order here IS the canonical
/// encoding order, so reordering fields is an on-disk format break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfoLink {
    /// Input slot index on the consuming operation.
    #[serde(default)]
    pub input: i64,

    /// Output index on the producing operation.
    #[serde(default)]
    pub output: i64,

    /// Content digest of the edge, `algo:hex` form.
    pub digest: String,

    /// Optional selector digest; empty when unused.
    #[serde(default)]
    pub selector: String,
}
