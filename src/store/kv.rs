//! Nested-bucket emulation over SQLite
//!
//! The store's data model is bucket-of-buckets: four top-level
//! namespaces, each holding nested buckets keyed by node or result id,
//! each holding ordered key/value entries. SQLite has no such primitive,
//! so this module emulates it with two tables:
//!
//! - `kv_entries (ns, bucket, key, value)`: the entries themselves,
//!   primary-key ordered so enumeration is stable and prefix scans are
//!   range queries.
//! - `kv_buckets (ns, bucket)`: the bucket registry. Bucket existence
//!   is semantically meaningful (an EMPTY `_links` bucket is what makes
//!   a node exist), so it cannot be derived from entry rows.
//!
//! A `put` registers its bucket; `create_bucket_if_not_exists` registers
//! a bucket without writing entries. `delete_bucket` removes both the
//! entries and the registry row. All writers must run inside the
//! caller's transaction; `rusqlite::Transaction` derefs to `Connection`,
//! so every helper takes `&Connection`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Create the backing tables if absent.
///
/// This is the only schema-upgrade step; it stands in for creating the
/// four top-level namespaces at open time.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_entries (
            ns     TEXT NOT NULL,
            bucket BLOB NOT NULL,
            key    BLOB NOT NULL,
            value  BLOB NOT NULL,
            PRIMARY KEY (ns, bucket, key)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS kv_buckets (
            ns     TEXT NOT NULL,
            bucket BLOB NOT NULL,
            PRIMARY KEY (ns, bucket)
        ) WITHOUT ROWID;",
    )?;
    Ok(())
}

/// Register a bucket without writing any entry.
pub fn create_bucket_if_not_exists(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO kv_buckets (ns, bucket) VALUES (?1, ?2)",
        params![ns, bucket],
    )?;
    Ok(())
}

/// True iff the bucket is registered.
pub fn bucket_exists(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM kv_buckets WHERE ns = ?1 AND bucket = ?2",
            params![ns, bucket],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// True iff the bucket holds no entries. A missing bucket is empty.
pub fn bucket_is_empty(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM kv_entries WHERE ns = ?1 AND bucket = ?2 LIMIT 1",
            params![ns, bucket],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_none())
}

/// Remove a bucket: all its entries plus the registry row.
///
/// Removing an unregistered bucket is a no-op, which is what the
/// best-effort deletes in reclamation rely on.
pub fn delete_bucket(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<()> {
    conn.execute(
        "DELETE FROM kv_entries WHERE ns = ?1 AND bucket = ?2",
        params![ns, bucket],
    )?;
    conn.execute(
        "DELETE FROM kv_buckets WHERE ns = ?1 AND bucket = ?2",
        params![ns, bucket],
    )?;
    Ok(())
}

/// Write an entry, replacing any previous value, and register the
/// bucket. Registration keeps the registry authoritative even for
/// buckets that were never explicitly created.
pub fn put(conn: &Connection, ns: &str, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
    create_bucket_if_not_exists(conn, ns, bucket)?;
    conn.execute(
        "INSERT OR REPLACE INTO kv_entries (ns, bucket, key, value) VALUES (?1, ?2, ?3, ?4)",
        params![ns, bucket, key, value],
    )?;
    Ok(())
}

/// Point lookup of one entry.
pub fn get(conn: &Connection, ns: &str, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_entries WHERE ns = ?1 AND bucket = ?2 AND key = ?3",
            params![ns, bucket, key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Delete one entry. Deleting a missing entry is a no-op.
pub fn delete(conn: &Connection, ns: &str, bucket: &[u8], key: &[u8]) -> Result<()> {
    conn.execute(
        "DELETE FROM kv_entries WHERE ns = ?1 AND bucket = ?2 AND key = ?3",
        params![ns, bucket, key],
    )?;
    Ok(())
}

/// All keys of a bucket, in key order.
pub fn list_keys(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut stmt = conn.prepare(
        "SELECT key FROM kv_entries WHERE ns = ?1 AND bucket = ?2 ORDER BY key",
    )?;
    let rows = stmt.query_map(params![ns, bucket], |row| row.get::<_, Vec<u8>>(0))?;
    let mut keys = Vec::new();
    for row in rows {
        keys.push(row?);
    }
    Ok(keys)
}

/// All `(key, value)` entries of a bucket, in key order.
pub fn list_entries(conn: &Connection, ns: &str, bucket: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut stmt = conn.prepare(
        "SELECT key, value FROM kv_entries WHERE ns = ?1 AND bucket = ?2 ORDER BY key",
    )?;
    let rows = stmt.query_map(params![ns, bucket], |row| {
        Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// All registered buckets of a namespace, in bucket order.
pub fn list_buckets(conn: &Connection, ns: &str) -> Result<Vec<Vec<u8>>> {
    let mut stmt = conn.prepare("SELECT bucket FROM kv_buckets WHERE ns = ?1 ORDER BY bucket")?;
    let rows = stmt.query_map(params![ns], |row| row.get::<_, Vec<u8>>(0))?;
    let mut buckets = Vec::new();
    for row in rows {
        buckets.push(row?);
    }
    Ok(buckets)
}

/// Number of registered buckets in a namespace.
pub fn count_buckets(conn: &Connection, ns: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM kv_buckets WHERE ns = ?1",
        params![ns],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Number of entries across all buckets of a namespace.
pub fn count_entries(conn: &Connection, ns: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM kv_entries WHERE ns = ?1",
        params![ns],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Keys of a bucket starting with `prefix`, in key order.
///
/// Implemented as a range query: `key >= prefix AND key < upper` where
/// `upper` is the prefix with its last byte incremented. An all-0xFF
/// prefix has no upper bound and degrades to a tail scan.
pub fn scan_prefix(conn: &Connection, ns: &str, bucket: &[u8], prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    match prefix_upper_bound(prefix) {
        Some(upper) => {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_entries
                 WHERE ns = ?1 AND bucket = ?2 AND key >= ?3 AND key < ?4
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![ns, bucket, prefix, upper], |row| {
                row.get::<_, Vec<u8>>(0)
            })?;
            for row in rows {
                keys.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_entries
                 WHERE ns = ?1 AND bucket = ?2 AND key >= ?3
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![ns, bucket, prefix], |row| {
                row.get::<_, Vec<u8>>(0)
            })?;
            for row in rows {
                keys.push(row?);
            }
        }
    }
    // The range catches keys >= prefix; keep only true prefix matches
    // (a key shorter than the prefix cannot match).
    keys.retain(|k| k.starts_with(prefix));
    Ok(keys)
}

/// Smallest byte string strictly greater than every string with the
/// given prefix, or `None` when no such bound exists.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(upper);
        }
        upper.pop();
    }
    None
}
