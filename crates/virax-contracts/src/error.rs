//! Error types for the ViraxLog runtime.
//!
//! Only construction-time and query-time operations surface these errors.
//! The ingestion path absorbs every failure at its boundary and logs it, so a
//! producer never receives a `ViraxError` from `submit`.

use thiserror::Error;

/// The unified error type for the ViraxLog crates.
#[derive(Debug, Error)]
pub enum ViraxError {
    /// The durable store rejected or failed an operation.
    #[error("store error: {reason}")]
    Store { reason: String },

    /// The store was used after `close()`.
    #[error("store is closed")]
    StoreClosed,

    /// A watcher pattern could not be compiled.
    #[error("invalid watcher pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A digest algorithm name is not one of the supported algorithms.
    #[error("unsupported hash algorithm '{name}'")]
    UnsupportedAlgorithm { name: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A background worker could not be started or stopped.
    #[error("lifecycle error: {reason}")]
    Lifecycle { reason: String },

    /// A mutex guarding shared state was poisoned by a panicking thread.
    #[error("lock poisoned: {what}")]
    LockPoisoned { what: String },
}

/// Convenience alias used throughout the ViraxLog crates.
pub type ViraxResult<T> = Result<T, ViraxError>;
