//! Watcher rules: a category matcher, a callback and its bookkeeping.
//!
//! A literal pattern matches one category exactly. `"*"` matches every
//! category, whether or not the regex flag is set. A regular-expression
//! pattern matches any category it is found in, so anchor it (`^...$`) for
//! whole-category matching.

use std::{error::Error, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use virax_contracts::{
    error::{ViraxError, ViraxResult},
    record::format_timestamp,
    EventRecord,
};

/// Pattern that matches every category.
pub const WILDCARD: &str = "*";

/// Default priority; lower values run earlier.
pub const DEFAULT_PRIORITY: i32 = 100;

/// What a callback returns. Errors are logged and never propagated.
pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A watcher callback. Runs on a worker-pool thread.
pub type Callback = Arc<dyn Fn(&EventRecord) -> CallbackResult + Send + Sync>;

/// Opaque handle returned by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WatcherId(Uuid);

impl WatcherId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registration options.
///
/// ```rust,ignore
/// dispatch.register("SEC.*", cb, WatchOptions::default().regex().priority(10))?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub use_regex: bool,
    pub priority: i32,
    pub enabled: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            use_regex: false,
            priority: DEFAULT_PRIORITY,
            enabled: true,
        }
    }
}

impl WatchOptions {
    /// Treat the pattern as a regular expression.
    pub fn regex(mut self) -> Self {
        self.use_regex = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Register the rule switched off.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Compiled category matcher.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    use_regex: bool,
    regex: Regex,
}

impl Matcher {
    /// Compile `pattern`. `"*"` matches everything, with or without the
    /// regex flag; other literal patterns are escaped and anchored.
    pub fn compile(pattern: &str, use_regex: bool) -> ViraxResult<Self> {
        let source = if pattern == WILDCARD {
            String::from("^")
        } else if use_regex {
            pattern.to_string()
        } else {
            format!("^{}$", regex::escape(pattern))
        };
        let regex = Regex::new(&source).map_err(|e| ViraxError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            use_regex,
            regex,
        })
    }

    pub fn matches(&self, category: &str) -> bool {
        self.regex.is_match(category)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_regex(&self) -> bool {
        self.use_regex
    }
}

/// One registered watcher. Owned by the dispatch registry.
pub struct WatcherRule {
    pub id: WatcherId,
    pub matcher: Matcher,
    pub callback: Callback,
    pub enabled: bool,
    pub priority: i32,
    /// Dispatches routed to this rule. Never decreases.
    pub hits: u64,
    pub created_at: DateTime<Utc>,
}

impl WatcherRule {
    pub fn new(matcher: Matcher, callback: Callback, options: WatchOptions) -> Self {
        Self {
            id: WatcherId::new(),
            matcher,
            callback,
            enabled: options.enabled,
            priority: options.priority,
            hits: 0,
            created_at: Utc::now(),
        }
    }

    /// Enabled and matching `category`.
    pub fn accepts(&self, category: &str) -> bool {
        self.enabled && self.matcher.matches(category)
    }

    pub fn info(&self, now: DateTime<Utc>) -> WatcherInfo {
        WatcherInfo {
            id: self.id,
            pattern: self.matcher.pattern().to_string(),
            use_regex: self.matcher.is_regex(),
            enabled: self.enabled,
            priority: self.priority,
            hits: self.hits,
            created_at: format_timestamp(self.created_at),
            uptime_secs: (now - self.created_at).num_seconds().max(0),
        }
    }
}

impl fmt::Debug for WatcherRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherRule")
            .field("id", &self.id)
            .field("matcher", &self.matcher)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .field("hits", &self.hits)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a rule for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherInfo {
    pub id: WatcherId,
    pub pattern: String,
    pub use_regex: bool,
    pub enabled: bool,
    pub priority: i32,
    pub hits: u64,
    pub created_at: String,
    pub uptime_secs: i64,
}
