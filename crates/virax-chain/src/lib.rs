//! # virax-chain
//!
//! Canonical encoding and hash-chain construction for ViraxLog records.
//!
//! ## Overview
//!
//! Every record links to its predecessor through `prev_hash`, and its own
//! `hash` commits to its content and that link. Changing any hashed byte of a
//! stored record, or splicing records out of order, breaks the chain at that
//! record, which [`verify_chain`] reports.
//!
//! Everything here is a pure function. The ingestion pipeline uses
//! [`canonicalize`] and [`Unsealed::seal`] to build records; the auditor uses
//! [`verify_chain`] to replay them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virax_chain::{canonicalize, verify_chain, Unsealed};
//! use virax_contracts::{HashAlgorithm, GENESIS};
//!
//! let record = Unsealed {
//!     timestamp: "2024-01-01T00:00:00+00:00".into(),
//!     session_id: "S1".into(),
//!     level: "INFO".into(),
//!     category: "AUTH".into(),
//!     source: "main.rs:10".into(),
//!     payload: canonicalize(&serde_json::json!({"user": "ana"})),
//! }
//! .seal(GENESIS, HashAlgorithm::Sha256);
//!
//! assert_eq!(verify_chain(&[record], GENESIS, HashAlgorithm::Sha256), Ok(1));
//! ```

pub mod canonical;
pub mod chain;

pub use canonical::canonicalize;
pub use chain::{compute_hash, hash_of, verify_chain, verify_single, ChainBreak, Unsealed};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use serde::Serialize;
    use serde_json::json;

    use virax_contracts::{EventRecord, HashAlgorithm, Payload, GENESIS};

    use super::*;

    const TS: &str = "2024-01-01T00:00:00+00:00";

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn unsealed(payload: &str) -> Unsealed {
        Unsealed {
            timestamp: TS.to_string(),
            session_id: "S1".to_string(),
            level: "INFO".to_string(),
            category: "CAT".to_string(),
            source: "src".to_string(),
            payload: payload.to_string(),
        }
    }

    /// Build a valid chain of `n` records with distinct payloads.
    fn build_chain(n: usize, algorithm: HashAlgorithm) -> Vec<EventRecord> {
        let mut prev = GENESIS.to_string();
        let mut chain = Vec::with_capacity(n);
        for i in 0..n {
            let record = unsealed(&canonicalize(&json!({ "step": i }))).seal(&prev, algorithm);
            prev = record.hash.clone();
            chain.push(record);
        }
        chain
    }

    // ── Canonicalization ──────────────────────────────────────────────────────

    #[test]
    fn canonical_form_sorts_keys_and_keeps_utf8() {
        let value = json!({"b": 1, "a": {"z": "é", "y": [1, null]}});
        assert_eq!(canonicalize(&value), r#"{"a":{"y":[1,null],"z":"é"},"b":1}"#);
    }

    #[test]
    fn canonical_form_ignores_key_insertion_order() {
        let first = Payload::mapping([("user", "ana"), ("action", "login"), ("ip", "10.0.0.1")]);
        let second = Payload::mapping([("ip", "10.0.0.1"), ("user", "ana"), ("action", "login")]);
        assert_eq!(canonicalize(&first), canonicalize(&second));

        let mut hashed = HashMap::new();
        hashed.insert("user", "ana");
        hashed.insert("action", "login");
        hashed.insert("ip", "10.0.0.1");
        assert_eq!(canonicalize(&hashed), canonicalize(&first));
    }

    #[test]
    fn canonical_form_orders_struct_fields_by_name() {
        #[derive(Debug, Serialize)]
        struct Login {
            user: &'static str,
            attempt: u32,
        }
        assert_eq!(canonicalize(&Login { user: "ana", attempt: 2 }), r#"{"attempt":2,"user":"ana"}"#);
    }

    #[test]
    fn canonicalization_is_idempotent_on_reparse() {
        let once = canonicalize(&json!({"k": [3, 2, 1], "a": "x y"}));
        let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
        assert_eq!(canonicalize(&reparsed), once);
    }

    #[test]
    fn canonical_string_payload_is_quoted() {
        assert_eq!(canonicalize("data"), r#""data""#);
        assert_eq!(canonicalize(&Payload::Null), "null");
    }

    #[test]
    fn serialization_failure_falls_back_to_error_document() {
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");

        let canonical = canonicalize(&bad);
        let parsed: serde_json::Value = serde_json::from_str(&canonical).unwrap();

        assert_eq!(parsed["error"], "serialization_failed");
        assert!(parsed["details"].as_str().unwrap().contains("key must be a string"));
        assert!(parsed["raw"].as_str().unwrap().contains("tuple keys"));
        assert!(canonical.starts_with(r#"{"details":"#), "error document must itself be canonical");
    }

    // ── Hashing ───────────────────────────────────────────────────────────────

    #[test]
    fn hash_is_plain_concatenation_of_fields() {
        let payload = canonicalize("data");
        assert_eq!(
            compute_hash(TS, "INFO", "CAT", &payload, GENESIS, HashAlgorithm::Sha256),
            "500c959e37dd14b339467ac5e76f4d3b8a07eb4ffd0e06d62d8e2f18a6d36149"
        );
        assert_eq!(
            compute_hash(TS, "INFO", "CAT", &payload, GENESIS, HashAlgorithm::Sha3_256),
            "330030de80f4005f98d0af3044e29f90d37627aeb272b23d037a0bd86666b7fe"
        );
        assert_eq!(
            compute_hash(TS, "INFO", "CAT", &payload, GENESIS, HashAlgorithm::Blake2b256),
            "ce9655ddf489582d6cb62cffc644a45dbab1b7c11038e9569ae68c054ee32e4c"
        );
    }

    #[test]
    fn moving_bytes_between_fields_changes_the_hash() {
        let a = compute_hash(TS, "INFO", "CAT", "x", GENESIS, HashAlgorithm::Sha256);
        let b = compute_hash(TS, "INFO", "CA", "Tx", GENESIS, HashAlgorithm::Sha256);
        // Same concatenation, same digest: the layout is a raw concatenation.
        assert_eq!(a, b);
        let c = compute_hash(TS, "INFO", "CAT", "x", "GENESIS2", HashAlgorithm::Sha256);
        assert_ne!(a, c);
    }

    #[test]
    fn seal_links_to_given_predecessor() {
        let record = unsealed(r#""data""#).seal(GENESIS, HashAlgorithm::Sha256);
        assert_eq!(record.prev_hash, GENESIS);
        assert!(record.is_genesis());
        assert_eq!(record.hash, hash_of(&record, HashAlgorithm::Sha256));
        assert_ne!(record.hash, record.prev_hash);
    }

    // ── Verification ──────────────────────────────────────────────────────────

    #[test]
    fn valid_chain_verifies_with_count() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Sha3_256, HashAlgorithm::Blake2b256] {
            let chain = build_chain(5, algorithm);
            assert_eq!(verify_chain(&chain, GENESIS, algorithm), Ok(5));
        }
    }

    #[test]
    fn empty_chain_is_valid() {
        assert_eq!(verify_chain(&[], GENESIS, HashAlgorithm::Sha256), Ok(0));
    }

    #[test]
    fn wrong_prev_hash_fails_at_second_record() {
        let payload = r#""data""#;
        let h1 = compute_hash(TS, "INFO", "CAT", payload, GENESIS, HashAlgorithm::Sha256);
        let r1 = EventRecord {
            hash: h1,
            ..unsealed(payload).seal(GENESIS, HashAlgorithm::Sha256)
        };
        let r2 = EventRecord {
            prev_hash: "WRONG_HASH".to_string(),
            hash: "hash2".to_string(),
            ..r1.clone()
        };

        let err = verify_chain(&[r1.clone(), r2], GENESIS, HashAlgorithm::Sha256).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.expected_prev_hash, r1.hash);
        assert_eq!(err.found_prev_hash, "WRONG_HASH");
        assert!(err.is_link_break());
    }

    #[test]
    fn altered_payload_is_a_content_break() {
        let mut chain = build_chain(4, HashAlgorithm::Sha256);
        chain[2].payload = r#""HACKED_CONTENT""#.to_string();

        let err = verify_chain(&chain, GENESIS, HashAlgorithm::Sha256).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(err.is_content_break());
        assert!(!err.is_link_break());
        assert_eq!(err.found_hash, chain[2].hash);
    }

    #[test]
    fn wrong_algorithm_fails_at_first_record() {
        let chain = build_chain(3, HashAlgorithm::Sha256);
        let err = verify_chain(&chain, GENESIS, HashAlgorithm::Sha3_256).unwrap_err();
        assert_eq!(err.index, 0);
    }

    #[test]
    fn partial_slice_verifies_from_its_own_start() {
        let chain = build_chain(6, HashAlgorithm::Sha256);
        let tail = &chain[3..];
        assert_eq!(verify_chain(tail, &tail[0].prev_hash, HashAlgorithm::Sha256), Ok(3));
        assert!(verify_chain(tail, GENESIS, HashAlgorithm::Sha256).is_err());
    }

    #[test]
    fn verify_single_requires_link_and_content() {
        let chain = build_chain(2, HashAlgorithm::Sha256);
        assert!(verify_single(&chain[1], &chain[0].hash, HashAlgorithm::Sha256));
        assert!(!verify_single(&chain[1], GENESIS, HashAlgorithm::Sha256));

        let mut altered = chain[1].clone();
        altered.level = "ERROR".to_string();
        assert!(!verify_single(&altered, &chain[0].hash, HashAlgorithm::Sha256));
    }
}
