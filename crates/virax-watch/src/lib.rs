//! # virax-watch
//!
//! Category watchers for ViraxLog.
//!
//! A watcher pairs a category pattern with a callback. [`WatcherDispatch`]
//! implements [`RecordObserver`](virax_core::RecordObserver), so the ingestion
//! pipeline hands it every accepted record; matching callbacks then run on a
//! fixed-size worker pool, ordered by priority, isolated from each other and
//! from the producer.
//!
//! ## Matching
//!
//! - Literal patterns match the whole category exactly: `"SECURITY"` does not
//!   match `"SECURITY_EXTRA"`.
//! - `"*"` matches every category.
//! - With [`WatchOptions::regex`], the pattern is a regular expression and
//!   matches if found anywhere in the category.
//!
//! ```rust,ignore
//! let dispatch = WatcherDispatch::new(4)?;
//! dispatch.register("SEC.*", |record| { alert(record); Ok(()) }, WatchOptions::default().regex())?;
//! ```

pub mod dispatch;
pub mod pool;
pub mod rule;

pub use dispatch::WatcherDispatch;
pub use rule::{CallbackResult, WatchOptions, WatcherId, WatcherInfo, DEFAULT_PRIORITY, WILDCARD};

// ── Tests ─────────────────────────────────────────────────────────────────────
