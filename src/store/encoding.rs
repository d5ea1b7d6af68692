//! Canonical byte encodings for persisted records
//!
//! Link descriptors and result records are stored as canonical JSON:
//! field order is fixed by struct declaration order and no insignificant
//! whitespace is emitted, so byte-equality of encodings equals semantic
//! equality of links. That property is what makes composite-key point
//! lookups and prefix scans work.
//!
//! Composite keys have the shape `enc(link) "@" target`. The encoder
//! refuses to build a key whose link encoding contains the separator
//! byte, so parsing can split at the first `'@'` unambiguously. Targets
//! after the separator may contain `'@'`.

use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};
use crate::store::schema::{CacheInfoLink, CacheResult};

/// Separator between the encoded link and the target id in a composite
/// link key. On-disk ABI; never change.
pub const LINK_SEPARATOR: u8 = b'@';

/// Encode a result record as a self-describing blob.
pub fn encode_result(res: &CacheResult) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(res)?)
}

/// Decode a result record blob.
///
/// Unknown fields are tolerated so blobs written by newer releases keep
/// decoding.
pub fn decode_result(data: &[u8]) -> Result<CacheResult> {
    Ok(serde_json::from_slice(data)?)
}

/// Encode a link descriptor in canonical form.
///
/// Fails with [`StoreError::Corrupt`] if the encoding would contain the
/// composite-key separator byte; such a link could never be parsed back
/// out of a composite key.
pub fn encode_link(link: &CacheInfoLink) -> Result<Vec<u8>> {
    let enc = serde_json::to_vec(link)?;
    if enc.contains(&LINK_SEPARATOR) {
        return Err(StoreError::Corrupt(format!(
            "link encoding contains reserved separator byte: {}",
            String::from_utf8_lossy(&enc)
        )));
    }
    Ok(enc)
}

/// Decode a canonical link descriptor.
pub fn decode_link(data: &[u8]) -> Result<CacheInfoLink> {
    Ok(serde_json::from_slice(data)?)
}

/// Build the composite key `enc(link) "@" target`.
pub fn composite_key(link: &CacheInfoLink, target: &str) -> Result<Vec<u8>> {
    let mut key = encode_link(link)?;
    key.push(LINK_SEPARATOR);
    key.extend_from_slice(target.as_bytes());
    Ok(key)
}

/// Build the scan prefix `enc(link) "@"` matching every target of one
/// link label.
pub fn link_prefix(link: &CacheInfoLink) -> Result<Vec<u8>> {
    let mut prefix = encode_link(link)?;
    prefix.push(LINK_SEPARATOR);
    Ok(prefix)
}

/// Split a composite key at the first separator.
///
/// Returns `(encoded_link, target)`. A key with no separator is corrupt
/// and aborts the enclosing operation.
pub fn split_composite_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
    let sep = key
        .iter()
        .position(|&b| b == LINK_SEPARATOR)
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "invalid link key {:?}: missing separator",
                String::from_utf8_lossy(key)
            ))
        })?;
    Ok((&key[..sep], &key[sep + 1..]))
}

/// Decode a stored node or result id back to a string.
///
/// Ids are caller-chosen UTF-8; a non-UTF-8 id in the file is corrupt.
pub fn id_from_bytes(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|err| StoreError::Corrupt(format!("non-utf8 id in store: {}", err)))
}

/// Compute the canonical digest of a byte string, `sha256:hex` form.
pub fn digest_of_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Normalize a link delivered by a back-link walk.
///
/// Back-link walkers want a canonical merged identity fusing the edge
/// label with the output index: the digest becomes
/// `digest("<orig-digest>@<orig-output>")` and the output is zeroed, so
/// downstream callers can hash the link uniformly.
pub fn fuse_backlink(mut link: CacheInfoLink) -> CacheInfoLink {
    let fused = format!("{}@{}", link.digest, link.output);
    link.digest = digest_of_bytes(fused.as_bytes());
    link.output = 0;
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link() -> CacheInfoLink {
        CacheInfoLink {
            input: 1,
            output: 2,
            digest: "sha256:abc123".to_string(),
            selector: String::new(),
        }
    }

    #[test]
    fn test_result_roundtrip() {
        let res = CacheResult {
            id: "res-1".to_string(),
            created_at: 1712000000,
        };
        let encoded = encode_result(&res).unwrap();
        let decoded = decode_result(&encoded).unwrap();
        assert_eq!(decoded, res);
    }

    #[test]
    fn test_result_decode_tolerates_unknown_fields() {
        let blob = br#"{"id":"res-1","created_at":7,"worker":"w0"}"#;
        let decoded = decode_result(blob).unwrap();
        assert_eq!(decoded.id, "res-1");
        assert_eq!(decoded.created_at, 7);
    }

    #[test]
    fn test_result_decode_defaults_created_at() {
        // Blobs written before the field existed
        let blob = br#"{"id":"res-1"}"#;
        let decoded = decode_result(blob).unwrap();
        assert_eq!(decoded.created_at, 0);
    }

    #[test]
    fn test_link_encoding_is_canonical() {
        let a = encode_link(&sample_link()).unwrap();
        let b = encode_link(&sample_link()).unwrap();
        assert_eq!(a, b);

        // No whitespace in the canonical form
        assert!(!a.contains(&b' '));
    }

    #[test]
    fn test_link_roundtrip() {
        let link = sample_link();
        let encoded = encode_link(&link).unwrap();
        let decoded = decode_link(&encoded).unwrap();
        assert_eq!(decoded, link);
    }

    #[test]
    fn test_link_encoding_rejects_separator() {
        let mut link = sample_link();
        link.digest = "sha256:abc@def".to_string();
        let err = encode_link(&link).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_composite_key_splits_back() {
        let link = sample_link();
        let key = composite_key(&link, "target-node").unwrap();
        let (enc, target) = split_composite_key(&key).unwrap();
        assert_eq!(enc, encode_link(&link).unwrap().as_slice());
        assert_eq!(target, b"target-node");
    }

    #[test]
    fn test_composite_key_target_may_contain_separator() {
        let link = sample_link();
        let key = composite_key(&link, "odd@target").unwrap();
        let (_, target) = split_composite_key(&key).unwrap();
        assert_eq!(target, b"odd@target");
    }

    #[test]
    fn test_split_rejects_key_without_separator() {
        let err = split_composite_key(b"no-separator-here").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_link_prefix_matches_composite_key() {
        let link = sample_link();
        let prefix = link_prefix(&link).unwrap();
        let key = composite_key(&link, "t").unwrap();
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn test_fuse_backlink_zeroes_output() {
        let fused = fuse_backlink(sample_link());
        assert_eq!(fused.output, 0);
        assert_eq!(
            fused.digest,
            digest_of_bytes("sha256:abc123@2".as_bytes())
        );
        // Untouched fields survive
        assert_eq!(fused.input, 1);
    }

    #[test]
    fn test_digest_of_bytes_shape() {
        let d = digest_of_bytes(b"hello");
        assert!(d.starts_with("sha256:"));
        // sha256 hex is 64 characters
        assert_eq!(d.len(), "sha256:".len() + 64);
    }
}
