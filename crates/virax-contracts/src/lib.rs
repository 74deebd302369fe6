//! # virax-contracts
//!
//! Shared types for the ViraxLog event chain.
//!
//! All crates in the workspace import from here. No chain or storage logic
//! lives in this crate, only data definitions and errors.

pub mod config;
pub mod error;
pub mod payload;
pub mod record;
pub mod report;

pub use config::{HashAlgorithm, PipelineConfig};
pub use error::{ViraxError, ViraxResult};
pub use payload::Payload;
pub use record::{EventRecord, StoredEvent, GENESIS, SCHEMA_VERSION};
pub use report::{AuditReport, CorruptionDetails, QueryFilter};
