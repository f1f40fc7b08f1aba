//! Newline-delimited JSON export of audit entries.

use std::path::Path;

use tokio::fs;

use crate::entry::AuditEntry;
use crate::error::AuditResult;

/// Writes `entries` to `path`, one JSON object per line, replacing any
/// existing file. Returns the number of lines written.
///
/// # Errors
///
/// Propagates I/O and serialization failures.
pub async fn export_jsonl(path: impl AsRef<Path>, entries: &[AuditEntry]) -> AuditResult<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut buffer = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buffer, entry)?;
        buffer.push(b'\n');
    }

    fs::write(path, buffer).await?;
    Ok(entries.len())
}

/// Reads entries previously written by [`export_jsonl`].
///
/// # Errors
///
/// Propagates I/O and deserialization failures.
pub async fn read_jsonl(path: impl AsRef<Path>) -> AuditResult<Vec<AuditEntry>> {
    let data = fs::read(path.as_ref()).await?;
    let mut entries = Vec::new();
    for line in data
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.is_empty())
    {
        entries.push(serde_json::from_slice(line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use gate_primitives::TrustLevel;
    use uuid::Uuid;

    use crate::entry::AuditStatus;
    use crate::log::AuditLog;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("trustgate-audit-{}", Uuid::new_v4()));
        path.push("audit.jsonl");
        path
    }

    #[tokio::test]
    async fn export_writes_one_line_per_entry_in_order() {
        let path = temp_path();
        let log = AuditLog::default();
        log.append(AuditEntry::new("first", TrustLevel::Trusted, AuditStatus::Success));
        log.append(
            AuditEntry::new("second", TrustLevel::Untrusted, AuditStatus::Blocked)
                .with_error_code("PolicyBlocked"),
        );

        assert_eq!(log.export(&path).await.unwrap(), 2);

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["tool_name"], "first");

        let entries = read_jsonl(&path).await.unwrap();
        assert_eq!(entries, log.snapshot());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn export_of_empty_log_creates_empty_file() {
        let path = temp_path();
        assert_eq!(AuditLog::default().export(&path).await.unwrap(), 0);
        assert!(tokio::fs::read(&path).await.unwrap().is_empty());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
