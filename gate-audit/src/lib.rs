//! Audit trail for gateway calls.
//!
//! Every dispatched call leaves exactly one terminal entry, plus at most one
//! `pending_confirmation` entry when a token is minted. The log is held in
//! memory and exported as newline-delimited JSON on demand.

#![warn(missing_docs, clippy::pedantic)]

mod entry;
mod error;
mod export;
mod log;
mod stats;

pub use entry::{AuditEntry, AuditStatus};
pub use error::{AuditError, AuditResult};
pub use export::{export_jsonl, read_jsonl};
pub use log::{AuditFilter, AuditLog, DEFAULT_RETENTION};
pub use stats::AuditSummary;
