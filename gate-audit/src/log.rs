//! In-memory, append-only audit log with an optional retention cap.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use crate::entry::{AuditEntry, AuditStatus};
use crate::error::AuditResult;
use crate::export::export_jsonl;
use crate::stats::AuditSummary;

/// Number of entries retained when no cap is configured explicitly.
pub const DEFAULT_RETENTION: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();

/// Query over the audit log. `None` fields match everything.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditFilter {
    /// Only entries for this tool.
    pub tool_name: Option<String>,
    /// Only entries with this status.
    pub status: Option<AuditStatus>,
    /// Only the most recent `limit` matching entries.
    pub limit: Option<usize>,
}

impl AuditFilter {
    /// Restricts the filter to one tool.
    #[must_use]
    pub fn for_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    /// Restricts the filter to one status.
    #[must_use]
    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Keeps only the most recent `limit` matches.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.tool_name
            .as_deref()
            .is_none_or(|name| entry.tool_name() == name)
            && self
                .status
                .is_none_or(|status| entry.result_status() == status)
    }
}

#[derive(Debug, Default)]
struct LogInner {
    entries: VecDeque<AuditEntry>,
    evicted: u64,
}

/// Append-only audit log shared by concurrent calls.
///
/// Appends stamp the entry under the log lock, which fixes completion order
/// and keeps timestamps non-decreasing. Reads return copies.
#[derive(Debug)]
pub struct AuditLog {
    retention: Option<NonZeroUsize>,
    inner: Mutex<LogInner>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(Some(DEFAULT_RETENTION))
    }
}

impl AuditLog {
    /// Creates a log keeping at most `retention` entries, oldest evicted first.
    #[must_use]
    pub fn new(retention: Option<NonZeroUsize>) -> Self {
        Self {
            retention,
            inner: Mutex::new(LogInner::default()),
        }
    }

    /// Creates a log without a retention cap.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Returns the retention cap.
    #[must_use]
    pub fn retention(&self) -> Option<NonZeroUsize> {
        self.retention
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an entry, returning it as stored.
    pub fn append(&self, mut entry: AuditEntry) -> AuditEntry {
        let mut inner = self.lock();
        let now = Utc::now();
        let timestamp = inner
            .entries
            .back()
            .map_or(now, |last| last.timestamp().max(now));
        entry.stamp(timestamp);
        inner.entries.push_back(entry.clone());

        if let Some(cap) = self.retention {
            while inner.entries.len() > cap.get() {
                inner.entries.pop_front();
                inner.evicted += 1;
            }
        }

        debug!(
            tool = entry.tool_name(),
            status = %entry.result_status(),
            trust_level = %entry.trust_level(),
            error_code = entry.error_code(),
            duration_ms = entry.duration_ms(),
            "audit entry appended"
        );
        entry
    }

    /// Returns matching entries, oldest first.
    #[must_use]
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let inner = self.lock();
        let mut matches: Vec<AuditEntry> = inner
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            let excess = matches.len().saturating_sub(limit);
            matches.drain(..excess);
        }
        matches
    }

    /// Returns entries filtered by tool and status, oldest first.
    #[must_use]
    pub fn get(&self, tool_name: Option<&str>, status: Option<AuditStatus>) -> Vec<AuditEntry> {
        self.query(&AuditFilter {
            tool_name: tool_name.map(str::to_owned),
            status,
            limit: None,
        })
    }

    /// Returns every retained entry, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` when no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns how many entries the retention cap has evicted.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Removes every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        removed
    }

    /// Summarises the retained entries.
    #[must_use]
    pub fn summary(&self) -> AuditSummary {
        AuditSummary::from_entries(self.lock().entries.iter())
    }

    /// Writes the retained entries to `path` as JSON lines, in log order.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization failures.
    pub async fn export(&self, path: impl AsRef<Path>) -> AuditResult<usize> {
        let entries = self.snapshot();
        export_jsonl(path, &entries).await
    }
}
