//! # virax-store
//!
//! Durable persistence for the ViraxLog chain.
//!
//! [`SqliteStore`] keeps chain records in an append-only `registry` table
//! and liveness rows in a separate `heartbeat` table. Batches are written in
//! a single transaction, so a batch is either fully stored or not at all.

pub mod sqlite;

pub use sqlite::{SqliteStore, MEMORY_PATH};

// ── Tests ─────────────────────────────────────────────────────────────────────
