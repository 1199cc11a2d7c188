//! Newline-delimited JSON audit store
//!
//! Writes one JSON object per line to a file opened in append mode. The file
//! is never truncated or rewritten.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::AuditStore;
use crate::audit::event::AuditEntry;
use crate::error::{Error, Result};

/// Append-only JSONL audit trail
pub struct JsonlAuditStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditStore {
    /// Open (or create) the trail at `path`
    ///
    /// Parent directories are created if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Audit(format!(
                    "Failed to create audit directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                Error::Audit(format!(
                    "Failed to open audit file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        tracing::info!(path = %path.display(), "Audit trail opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the trail file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            Error::Audit(format!(
                "Failed to write audit file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        file.flush().await.map_err(|e| {
            Error::Audit(format!(
                "Failed to flush audit file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use chrono::Utc;

    #[tokio::test]
    async fn test_append_writes_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("trail.jsonl");
        let store = JsonlAuditStore::open(&path).await.unwrap();

        let first = AuditEntry::new("alice", AuditAction::FailedLogin, Utc::now());
        let second = AuditEntry::new("alice", AuditAction::AccountLocked, Utc::now())
            .with_detail("threshold");
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, second);
        assert!(lines[0].contains("\"failed_login\""));
    }

    #[tokio::test]
    async fn test_reopen_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");

        {
            let store = JsonlAuditStore::open(&path).await.unwrap();
            store
                .append(&AuditEntry::new("alice", AuditAction::FailedLogin, Utc::now()))
                .await
                .unwrap();
        }

        let store = JsonlAuditStore::open(&path).await.unwrap();
        assert_eq!(store.path(), path.as_path());
        store
            .append(&AuditEntry::new("alice", AuditAction::SuccessfulLogin, Utc::now()))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
