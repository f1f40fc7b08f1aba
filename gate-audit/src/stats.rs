//! Aggregate counts over audit entries.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entry::{AuditEntry, AuditStatus};

/// Per-status and per-tool totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Total entries considered.
    pub total: usize,
    /// Successful executions.
    pub success: usize,
    /// Failed executions.
    pub failure: usize,
    /// Calls refused by policy.
    pub blocked: usize,
    /// Confirmation tokens minted.
    pub pending_confirmation: usize,
    /// Entries per tool name.
    pub per_tool: BTreeMap<String, usize>,
}

impl AuditSummary {
    /// Builds a summary from entries.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a AuditEntry>,
    {
        let mut summary = Self::default();
        for entry in entries {
            summary.total += 1;
            match entry.result_status() {
                AuditStatus::Success => summary.success += 1,
                AuditStatus::Failure => summary.failure += 1,
                AuditStatus::Blocked => summary.blocked += 1,
                AuditStatus::PendingConfirmation => summary.pending_confirmation += 1,
            }
            *summary
                .per_tool
                .entry(entry.tool_name().to_owned())
                .or_default() += 1;
        }
        summary
    }

    /// Returns the count for one status.
    #[must_use]
    pub fn count(&self, status: AuditStatus) -> usize {
        match status {
            AuditStatus::Success => self.success,
            AuditStatus::Failure => self.failure,
            AuditStatus::Blocked => self.blocked,
            AuditStatus::PendingConfirmation => self.pending_confirmation,
        }
    }

    /// Returns the number of terminal entries.
    #[must_use]
    pub fn terminal(&self) -> usize {
        self.success + self.failure + self.blocked
    }
}
