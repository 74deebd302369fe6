//! # virax-core
//!
//! The concurrent ingestion runtime for ViraxLog.
//!
//! This crate provides:
//! - The two collaborator traits (`EventStore`, `RecordObserver`)
//! - The `IngestionPipeline` that owns the chain head and batches commits
//! - The `HeartbeatEmitter` liveness writer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use virax_core::IngestionPipeline;
//!
//! let pipeline = IngestionPipeline::launch(config, store, Some(watchers))?;
//! pipeline.submit("info", "AUTH", "login.rs:42", &serde_json::json!({"user": "ana"}));
//! pipeline.shutdown(Duration::from_secs(5))?;
//! ```

pub mod heartbeat;
pub mod pipeline;
pub mod traits;

pub use heartbeat::HeartbeatEmitter;
pub use pipeline::{IngestionPipeline, PipelineState, PipelineStats};
pub use traits::{EventStore, RecordObserver};

// ── Tests ─────────────────────────────────────────────────────────────────────
