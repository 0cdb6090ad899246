//! Record identity fingerprints.
//!
//! A fingerprint is a surrogate key for a `(record type, record id)` pair.
//! It is persisted alongside snapshots and items as an index column, so it
//! must stay stable across process restarts and across deletion of the
//! record it names.
//!
//! ## Fingerprint Specification
//!
//! ```text
//! fingerprint(type, id) = hex(SHA256(UTF-8("{type}:{id}")))
//! ```
//!
//! The result is always 64 lowercase hex characters.

use sha2::{Digest, Sha256};

use crate::types::{RecordId, RecordRef};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Build the canonical byte string hashed into a fingerprint.
fn canonical_identity(record_type: &str, id: RecordId) -> Vec<u8> {
    format!("{}:{}", record_type, id).into_bytes()
}

/// Compute the fingerprint of a `(record type, record id)` pair.
///
/// Pure and total: equal inputs always produce equal outputs.
///
/// # Example
///
/// ```rust
/// use versioned_snapshots::fingerprint::fingerprint;
///
/// let hash = fingerprint("Article", 42);
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, fingerprint("Article", 42));
/// ```
pub fn fingerprint(record_type: &str, id: RecordId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_identity(record_type, id));
    hex::encode(hasher.finalize())
}

/// Fingerprint a record reference.
pub fn fingerprint_ref(record: &RecordRef) -> String {
    fingerprint(&record.record_type, record.id)
}

/// Check whether two references name the same record.
pub fn fingerprints_match(a: &RecordRef, b: &RecordRef) -> bool {
    fingerprint_ref(a) == fingerprint_ref(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_determinism() {
        assert_eq!(fingerprint("Article", 42), fingerprint("Article", 42));
    }

    #[test]
    fn test_lowercase_hex_output() {
        let hash = fingerprint("Article", 42);
        assert_eq!(hash.len(), FINGERPRINT_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_type_and_id_both_matter() {
        assert_ne!(fingerprint("Article", 42), fingerprint("Article", 43));
        assert_ne!(fingerprint("Article", 42), fingerprint("Page", 42));
    }

    #[test]
    fn test_separator_prevents_ambiguity() {
        // "Page1" + 23 vs "Page" + 123
        assert_ne!(fingerprint("Page1", 23), fingerprint("Page", 123));
    }

    #[test]
    fn test_fingerprints_match() {
        let a = RecordRef::new("Article", 7);
        let b = RecordRef::new("Article", 7);
        let c = RecordRef::new("Article", 8);
        assert!(fingerprints_match(&a, &b));
        assert!(!fingerprints_match(&a, &c));
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(t in "[A-Za-z]{1,16}", id in any::<u64>()) {
            prop_assert_eq!(fingerprint(&t, id), fingerprint(&t, id));
        }

        #[test]
        fn prop_distinct_ids_distinct_fingerprints(
            t in "[A-Za-z]{1,16}",
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(fingerprint(&t, a), fingerprint(&t, b));
        }

        #[test]
        fn prop_fingerprint_len(t in "[A-Za-z_]{1,32}", id in any::<u64>()) {
            prop_assert_eq!(fingerprint(&t, id).len(), FINGERPRINT_LEN);
        }
    }
}
