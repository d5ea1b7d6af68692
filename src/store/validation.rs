//! Structural invariant checks for the cache graph
//!
//! Walks the four indices and reports every violation of the store's
//! cross-index invariants. Used by the `check` CLI command and by tests
//! after reclamation to prove nothing was orphaned.
//!
//! Errors mean persisted state no writer should have produced:
//! - a forward edge without its back-link entry,
//! - a result record without its reverse-index entry (or vice versa),
//! - a live node with neither results nor links (reclamation should
//!   have removed it),
//! - a link key that does not parse.
//!
//! A back-link entry whose source no longer carries a matching forward
//! edge is a warning, not an error: the read path tolerates it by
//! re-deriving labels from the forward index.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::store::encoding::{id_from_bytes, split_composite_key};
use crate::store::kv;
use crate::store::schema::{BACKLINKS_NS, BY_RESULT_NS, LINKS_NS, RESULTS_NS};

/// One validation finding with a stable machine-readable code.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    /// Machine-readable code (SCREAMING_SNAKE_CASE), stable across
    /// releases.
    pub code: &'static str,
    /// Human-readable description naming the entities involved.
    pub message: String,
}

/// Report of validation results.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Whether validation passed (no errors; warnings allowed).
    pub passed: bool,
    /// Invariant violations.
    pub errors: Vec<ValidationIssue>,
    /// Tolerated inconsistencies.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Total number of findings (errors + warnings).
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }
}

/// Check every structural invariant of the store.
pub fn validate(conn: &Connection) -> Result<ValidationReport> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_nodes(conn, &mut errors)?;
    check_link_symmetry(conn, &mut errors)?;
    check_result_symmetry(conn, &mut errors)?;
    check_backlinks(conn, &mut warnings)?;

    Ok(ValidationReport {
        passed: errors.is_empty(),
        errors,
        warnings,
    })
}

/// Every live node must hold at least one result or one link; an empty
/// node is a reclamation leak.
fn check_nodes(conn: &Connection, errors: &mut Vec<ValidationIssue>) -> Result<()> {
    for bucket in kv::list_buckets(conn, LINKS_NS)? {
        let id = id_from_bytes(bucket)?;
        let no_links = kv::bucket_is_empty(conn, LINKS_NS, id.as_bytes())?;
        let no_results = kv::bucket_is_empty(conn, RESULTS_NS, id.as_bytes())?;
        if no_links && no_results {
            errors.push(ValidationIssue {
                code: "EMPTY_NODE",
                message: format!("node {} has no results and no links", id),
            });
        }
    }
    Ok(())
}

/// Every forward edge must parse and must have a back-link entry.
fn check_link_symmetry(conn: &Connection, errors: &mut Vec<ValidationIssue>) -> Result<()> {
    for bucket in kv::list_buckets(conn, LINKS_NS)? {
        let source = id_from_bytes(bucket)?;
        for key in kv::list_keys(conn, LINKS_NS, source.as_bytes())? {
            let target = match split_composite_key(&key) {
                Ok((_, target)) => target.to_vec(),
                Err(_) => {
                    errors.push(ValidationIssue {
                        code: "INVALID_LINK_KEY",
                        message: format!(
                            "node {} has unparseable link key {:?}",
                            source,
                            String::from_utf8_lossy(&key)
                        ),
                    });
                    continue;
                }
            };
            if kv::get(conn, BACKLINKS_NS, &target, source.as_bytes())?.is_none() {
                errors.push(ValidationIssue {
                    code: "MISSING_BACKLINK",
                    message: format!(
                        "edge {} -> {} has no back-link entry",
                        source,
                        String::from_utf8_lossy(&target)
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Results and the by-result reverse index must mirror each other.
fn check_result_symmetry(conn: &Connection, errors: &mut Vec<ValidationIssue>) -> Result<()> {
    for bucket in kv::list_buckets(conn, RESULTS_NS)? {
        let id = id_from_bytes(bucket)?;
        for result_id in kv::list_keys(conn, RESULTS_NS, id.as_bytes())? {
            if kv::get(conn, BY_RESULT_NS, &result_id, id.as_bytes())?.is_none() {
                errors.push(ValidationIssue {
                    code: "MISSING_REVERSE_INDEX",
                    message: format!(
                        "result {} of node {} is missing from the reverse index",
                        String::from_utf8_lossy(&result_id),
                        id
                    ),
                });
            }
        }
    }
    for bucket in kv::list_buckets(conn, BY_RESULT_NS)? {
        let result_id = id_from_bytes(bucket)?;
        for id in kv::list_keys(conn, BY_RESULT_NS, result_id.as_bytes())? {
            if kv::get(conn, RESULTS_NS, &id, result_id.as_bytes())?.is_none() {
                errors.push(ValidationIssue {
                    code: "DANGLING_REVERSE_INDEX",
                    message: format!(
                        "reverse index claims node {} holds result {}, but it does not",
                        String::from_utf8_lossy(&id),
                        result_id
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Back-link entries whose source carries no matching forward edge.
fn check_backlinks(conn: &Connection, warnings: &mut Vec<ValidationIssue>) -> Result<()> {
    for bucket in kv::list_buckets(conn, BACKLINKS_NS)? {
        let target = id_from_bytes(bucket)?;
        for source in kv::list_keys(conn, BACKLINKS_NS, target.as_bytes())? {
            let mut found = false;
            for key in kv::list_keys(conn, LINKS_NS, &source)? {
                if let Ok((_, t)) = split_composite_key(&key) {
                    if t == target.as_bytes() {
                        found = true;
                        break;
                    }
                }
            }
            if !found {
                warnings.push(ValidationIssue {
                    code: "STALE_BACKLINK",
                    message: format!(
                        "back-link {} <- {} has no matching forward edge",
                        target,
                        String::from_utf8_lossy(&source)
                    ),
                });
            }
        }
    }
    Ok(())
}
