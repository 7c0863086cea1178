// Audit Trail
// One JSON line per completed action, appended to audit_trail.jsonl

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use crate::services::config_store::ConfigStore;

pub const AUDIT_FILE_NAME: &str = "audit_trail.jsonl";
pub const ANALYSIS_COMPLETE: &str = "Analysis Complete";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: String,
    pub user_id: String,
    pub action: String,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, details: serde_json::Value, user_id: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            user_id: user_id.into(),
            action: action.into(),
            details,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Appends events to a JSON Lines file.
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// `CONTRACT_LENS_AUDIT_FILE`, else `<data_dir>/logs/audit_trail.jsonl`.
    pub fn default_location() -> Self {
        let path = match std::env::var("CONTRACT_LENS_AUDIT_FILE") {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => ConfigStore::default_data_dir().join("logs").join(AUDIT_FILE_NAME),
        };
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let line = serde_json::to_string(event)?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Emits events through tracing only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        info!(
            target: "audit",
            user_id = %event.user_id,
            action = %event.action,
            details = %event.details,
            "audit.event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_audit_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("contract_lens_audit_{}", uuid::Uuid::new_v4()))
            .join("logs")
            .join(AUDIT_FILE_NAME)
    }

    #[test]
    fn test_jsonl_sink_appends_one_line_per_event() {
        let path = temp_audit_path();
        let sink = JsonlAuditSink::new(path.clone());

        sink.record(&AuditEvent::new(ANALYSIS_COMPLETE, json!({"filename": "a.txt"}), "local_user"))
            .unwrap();
        sink.record(&AuditEvent::new(ANALYSIS_COMPLETE, json!({"filename": "b.txt"}), "local_user"))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.action, ANALYSIS_COMPLETE);
        assert_eq!(second.user_id, "local_user");
        assert_eq!(second.details["filename"], "b.txt");

        let raw: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert!(raw.get("userId").is_some());
        assert!(raw.get("timestamp").is_some());

        let _ = fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let event = AuditEvent::new("Export", json!({}), "tester");
        assert!(TracingAuditSink.record(&event).is_ok());
    }
}
