//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (UTF-8 bytes, in order, no separators):
//!   1. timestamp
//!   2. level
//!   3. category
//!   4. canonical payload
//!   5. prev_hash
//!
//! The layout is part of the on-disk contract. Reordering or delimiting the
//! fields produces digests that no existing store will verify against.

use blake2::{digest::consts::U32, Blake2b};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use virax_contracts::{EventRecord, HashAlgorithm, SCHEMA_VERSION};

type Blake2b256 = Blake2b<U32>;

/// Compute the digest for one record's content and link.
///
/// Returns a lowercase hex string (64 characters for every supported
/// algorithm).
pub fn compute_hash(
    timestamp: &str,
    level: &str,
    category: &str,
    payload: &str,
    prev_hash: &str,
    algorithm: HashAlgorithm,
) -> String {
    let fields = [timestamp, level, category, payload, prev_hash];
    match algorithm {
        HashAlgorithm::Sha256 => digest_hex::<Sha256>(&fields),
        HashAlgorithm::Sha3_256 => digest_hex::<Sha3_256>(&fields),
        HashAlgorithm::Blake2b256 => digest_hex::<Blake2b256>(&fields),
    }
}

/// Recompute the digest of an existing record from its own fields.
pub fn hash_of(entry: &EventRecord, algorithm: HashAlgorithm) -> String {
    compute_hash(
        &entry.timestamp,
        &entry.level,
        &entry.category,
        &entry.payload,
        &entry.prev_hash,
        algorithm,
    )
}

/// The fields of a record that exist before it is linked into the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsealed {
    pub timestamp: String,
    pub session_id: String,
    pub level: String,
    pub category: String,
    pub source: String,
    pub payload: String,
}

impl Unsealed {
    /// Link these fields to `prev_hash` and compute the record's digest.
    pub fn seal(self, prev_hash: &str, algorithm: HashAlgorithm) -> EventRecord {
        let hash = compute_hash(
            &self.timestamp,
            &self.level,
            &self.category,
            &self.payload,
            prev_hash,
            algorithm,
        );
        EventRecord {
            timestamp: self.timestamp,
            session_id: self.session_id,
            level: self.level,
            category: self.category,
            source: self.source,
            payload: self.payload,
            hash,
            prev_hash: prev_hash.to_string(),
            schema_version: SCHEMA_VERSION,
        }
    }
}

fn digest_hex<D: Digest>(fields: &[&str]) -> String {
    let mut hasher = D::new();
    for field in fields {
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn ct_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Check one record against the hash its predecessor is expected to have.
///
/// Both the link (`entry.prev_hash == expected_prev_hash`) and the content
/// (`entry.hash` equals the recomputed digest) are compared in constant time,
/// and both comparisons always run.
pub fn verify_single(entry: &EventRecord, expected_prev_hash: &str, algorithm: HashAlgorithm) -> bool {
    let link_ok = ct_eq(&entry.prev_hash, expected_prev_hash);
    let content_ok = ct_eq(&entry.hash, &hash_of(entry, algorithm));
    link_ok & content_ok
}

/// The first record that failed verification, with the values needed to
/// tell a broken link from altered content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain broken at index {index}")]
pub struct ChainBreak {
    /// Zero-based position in the verified slice.
    pub index: usize,
    pub expected_prev_hash: String,
    pub found_prev_hash: String,
    pub expected_hash: String,
    pub found_hash: String,
}

impl ChainBreak {
    pub fn is_link_break(&self) -> bool {
        self.expected_prev_hash != self.found_prev_hash
    }

    pub fn is_content_break(&self) -> bool {
        self.expected_hash != self.found_hash
    }
}

/// Verify a sequence of records in order.
///
/// The expected predecessor starts at `initial_prev_hash` and advances to each
/// verified record's hash. Returns the number of records verified, or the
/// first break. Records after a break are not examined. An empty slice is
/// valid.
pub fn verify_chain(
    entries: &[EventRecord],
    initial_prev_hash: &str,
    algorithm: HashAlgorithm,
) -> Result<usize, ChainBreak> {
    let mut expected_prev = initial_prev_hash;

    for (index, entry) in entries.iter().enumerate() {
        if !verify_single(entry, expected_prev, algorithm) {
            return Err(ChainBreak {
                index,
                expected_prev_hash: expected_prev.to_string(),
                found_prev_hash: entry.prev_hash.clone(),
                expected_hash: hash_of(entry, algorithm),
                found_hash: entry.hash.clone(),
            });
        }
        expected_prev = &entry.hash;
    }

    Ok(entries.len())
}
