//! Core store operation tests.
//!
//! These tests cover the basic contract of the cache store: node
//! existence, result storage and lookup, link edges, the reverse
//! indices behind them, and the callback walk operations.
//!
//! Test scenarios:
//! 1. Empty store behavior (exists / walk / load)
//! 2. Result storage, lookup, and the by-result reverse index
//! 3. Link edges, label-targeted walks, and point membership
//! 4. Back-link walks with digest fusion
//! 5. Idempotence of add operations
//! 6. Close semantics

use lodestone::{CacheInfoLink, CacheResult, CacheStore, StoreError};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> CacheStore {
    CacheStore::open(dir.path().join("cache.db")).unwrap()
}

fn link(digest: &str, output: i64) -> CacheInfoLink {
    CacheInfoLink {
        input: 0,
        output,
        digest: digest.to_string(),
        selector: String::new(),
    }
}

fn all_ids(store: &CacheStore) -> Vec<String> {
    let mut ids = Vec::new();
    store
        .walk(|id| {
            ids.push(id.to_string());
            Ok(())
        })
        .unwrap();
    ids
}

fn results_of(store: &CacheStore, id: &str) -> Vec<String> {
    let mut out = Vec::new();
    store
        .walk_results(id, |res| {
            out.push(res.id.clone());
            Ok(())
        })
        .unwrap();
    out
}

fn ids_by_result(store: &CacheStore, result_id: &str) -> Vec<String> {
    let mut out = Vec::new();
    store
        .walk_ids_by_result(result_id, |id| {
            out.push(id.to_string());
            Ok(())
        })
        .unwrap();
    out
}

// ============================================================================
// Test 1: Empty store
// ============================================================================

#[test]
fn test_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    assert!(!store.exists("x"));

    let mut visits = 0;
    store
        .walk(|_| {
            visits += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(visits, 0);

    let err = store.load("x", "y").unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    // Walking results of an unknown id is silent, not an error
    assert!(results_of(&store, "x").is_empty());
    assert!(ids_by_result(&store, "y").is_empty());
}

// ============================================================================
// Test 2: Results and the reverse index
// ============================================================================

#[test]
fn test_add_and_load_results() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_result("A", &CacheResult::new("R1")).unwrap();
    store
        .add_result(
            "A",
            &CacheResult {
                id: "R2".to_string(),
                created_at: 1712000000,
            },
        )
        .unwrap();

    assert!(store.exists("A"));
    assert!(!store.exists("B"));

    let mut results = results_of(&store, "A");
    results.sort();
    assert_eq!(results, vec!["R1", "R2"]);

    assert_eq!(ids_by_result(&store, "R1"), vec!["A"]);
    assert_eq!(ids_by_result(&store, "R2"), vec!["A"]);

    let loaded = store.load("A", "R2").unwrap();
    assert_eq!(loaded.id, "R2");
    assert_eq!(loaded.created_at, 1712000000);

    let err = store.load("A", "R3").unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
    let err = store.load("B", "R1").unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[test]
fn test_result_shared_by_two_nodes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_result("A", &CacheResult::new("R1")).unwrap();
    store.add_result("B", &CacheResult::new("R1")).unwrap();

    let mut ids = ids_by_result(&store, "R1");
    ids.sort();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn test_add_result_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let res = CacheResult::new("R1");
    store.add_result("A", &res).unwrap();
    store.add_result("A", &res).unwrap();

    assert_eq!(results_of(&store, "A"), vec!["R1"]);
    assert_eq!(ids_by_result(&store, "R1"), vec!["A"]);
    assert_eq!(all_ids(&store), vec!["A"]);
}

// ============================================================================
// Test 3: Link edges
// ============================================================================

#[test]
fn test_walk_links_by_label() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let l1 = link("sha256:l1", 0);
    let l2 = link("sha256:l2", 0);

    store.add_link("A", &l1, "B").unwrap();
    store.add_link("A", &l1, "C").unwrap();
    store.add_link("A", &l2, "B").unwrap();

    let mut targets = Vec::new();
    store
        .walk_links("A", &l1, |target| {
            targets.push(target.to_string());
            Ok(())
        })
        .unwrap();
    targets.sort();
    assert_eq!(targets, vec!["B", "C"]);

    let mut targets = Vec::new();
    store
        .walk_links("A", &l2, |target| {
            targets.push(target.to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(targets, vec!["B"]);

    assert!(store.has_link("A", &l1, "B"));
    assert!(store.has_link("A", &l2, "B"));
    assert!(!store.has_link("A", &l2, "C"));
    assert!(!store.has_link("B", &l1, "A"));
}

#[test]
fn test_links_with_same_digest_different_output_are_distinct() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let out0 = link("sha256:op", 0);
    let out1 = link("sha256:op", 1);

    store.add_link("A", &out0, "B").unwrap();

    assert!(store.has_link("A", &out0, "B"));
    assert!(!store.has_link("A", &out1, "B"));
}

#[test]
fn test_walk_links_all() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let l1 = link("sha256:l1", 0);
    let l2 = link("sha256:l2", 1);

    store.add_link("A", &l1, "B").unwrap();
    store.add_link("A", &l2, "C").unwrap();

    let mut edges = Vec::new();
    store
        .walk_links_all("A", |target, l| {
            edges.push((target.to_string(), l.clone()));
            Ok(())
        })
        .unwrap();
    edges.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].0, "B");
    assert_eq!(edges[0].1, l1);
    assert_eq!(edges[1].0, "C");
    assert_eq!(edges[1].1, l2);
}

#[test]
fn test_add_link_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let l = link("sha256:l", 0);
    store.add_link("A", &l, "B").unwrap();
    store.add_link("A", &l, "B").unwrap();

    let mut count = 0;
    store
        .walk_links_all("A", |_, _| {
            count += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_add_link_does_not_materialize_target() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_link("A", &link("sha256:l", 0), "B").unwrap();

    // The source node exists; the target is known by reference only
    assert!(store.exists("A"));
    assert!(!store.exists("B"));
    assert_eq!(all_ids(&store), vec!["A"]);
}

// ============================================================================
// Test 4: Back-link walks
// ============================================================================

#[test]
fn test_walk_backlinks_fuses_digest() {
    use sha2::{Digest, Sha256};

    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let l = link("sha256:orig", 3);
    store.add_link("A", &l, "B").unwrap();

    let mut seen = Vec::new();
    store
        .walk_backlinks("B", |source, fused| {
            seen.push((source.to_string(), fused.clone()));
            Ok(())
        })
        .unwrap();

    assert_eq!(seen.len(), 1);
    let (source, fused) = &seen[0];
    assert_eq!(source, "A");
    assert_eq!(fused.output, 0);

    let mut hasher = Sha256::new();
    hasher.update(b"sha256:orig@3");
    let expected = format!("sha256:{}", hex::encode(hasher.finalize()));
    assert_eq!(fused.digest, expected);
}

#[test]
fn test_walk_backlinks_filters_other_targets() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let l = link("sha256:l", 0);
    store.add_link("A", &l, "B").unwrap();
    store.add_link("A", &l, "C").unwrap();
    store.add_link("X", &l, "B").unwrap();

    let mut sources = Vec::new();
    store
        .walk_backlinks("B", |source, _| {
            sources.push(source.to_string());
            Ok(())
        })
        .unwrap();
    sources.sort();
    assert_eq!(sources, vec!["A", "X"]);
}

// ============================================================================
// Test 5: Walk order stability
// ============================================================================

#[test]
fn test_walk_order_is_stable() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for id in ["zeta", "alpha", "mid", "beta"] {
        store.add_result(id, &CacheResult::new(format!("res-{id}"))).unwrap();
    }

    let first = all_ids(&store);
    let second = all_ids(&store);
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

// ============================================================================
// Test 6: Close semantics
// ============================================================================

#[test]
fn test_close_then_operate() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_result("A", &CacheResult::new("R1")).unwrap();
    store.close().unwrap();

    let err = store.load("A", "R1").unwrap_err();
    assert!(matches!(err, StoreError::Closed));
    let err = store.add_result("A", &CacheResult::new("R2")).unwrap_err();
    assert!(matches!(err, StoreError::Closed));
    let err = store.release("R1").unwrap_err();
    assert!(matches!(err, StoreError::Closed));

    // Existence has no error surface; a closed store reports absent
    assert!(!store.exists("A"));

    let err = store.close().unwrap_err();
    assert!(matches!(err, StoreError::Closed));
}

#[test]
fn test_callbacks_may_reenter_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_result("A", &CacheResult::new("R1")).unwrap();
    store.add_result("B", &CacheResult::new("R2")).unwrap();

    // Callbacks run outside the lock, so calling back in must not
    // deadlock
    let mut pairs = Vec::new();
    store
        .walk(|id| {
            let results = {
                let mut out = Vec::new();
                store.walk_results(id, |res| {
                    out.push(res.id.clone());
                    Ok(())
                })?;
                out
            };
            pairs.push((id.to_string(), results));
            Ok(())
        })
        .unwrap();

    assert_eq!(pairs.len(), 2);
}

#[test]
fn test_callback_error_aborts_walk() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.add_result("A", &CacheResult::new("R1")).unwrap();
    store.add_result("B", &CacheResult::new("R2")).unwrap();

    let mut visits = 0;
    let err = store
        .walk(|_| {
            visits += 1;
            Err(StoreError::Corrupt("stop".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
    assert_eq!(visits, 1);
}
