//! Canonical payload encoding.
//!
//! The canonical form is what gets hashed and what gets stored, byte for
//! byte. It is compact JSON with object keys in lexicographic order and
//! non-ASCII text left unescaped.
//!
//! Key ordering comes from routing every value through `serde_json::Value`,
//! whose object map is ordered by key. Do not enable serde_json's
//! `preserve_order` feature anywhere in the dependency graph: it would turn
//! that map into an insertion-ordered one and silently change every hash.

use std::fmt;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Render `payload` in canonical form.
///
/// Never fails: a value that cannot be represented as JSON (a map with
/// non-string keys, a `Serialize` impl that errors) is replaced by the
/// canonical error document
/// `{"details":"<reason>","error":"serialization_failed","raw":"<Debug of value>"}`.
pub fn canonicalize<T>(payload: &T) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    match serde_json::to_value(payload).and_then(|value| serde_json::to_string(&value)) {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!(error = %e, "payload serialization failed; storing error document");
            serialization_failure(&e.to_string(), &format!("{:?}", payload))
        }
    }
}

fn serialization_failure(details: &str, raw: &str) -> String {
    json!({
        "error": "serialization_failed",
        "details": details,
        "raw": raw,
    })
    .to_string()
}
