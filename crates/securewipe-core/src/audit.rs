/// Audit trail for wipe sessions
///
/// Every destructive step is appended to a JSONL file (one JSON object per
/// line, flushed per entry) so an operator can reconstruct what was erased,
/// when, and with which method. Writing the trail is best effort: a failure
/// to record an event is logged and never fails the wipe itself.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, WipeError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    SessionStart,
    SessionEnd,
    /// File overwritten, unlinked and confirmed gone
    FileWiped,
    FileFailed,
    /// Not attempted because the operation was cancelled
    FileSkipped,
    EmergencyStop,
    ValidationRejected,
    CertificateIssued,
    CertificateVerified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub session_id: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    pub severity: AuditSeverity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Audit event builder
#[derive(Debug, Clone)]
pub struct AuditEvent {
    event_type: AuditEventType,
    message: String,
    metadata: HashMap<String, String>,
    severity: AuditSeverity,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, message: impl Into<String>) -> Self {
        let severity = match event_type {
            AuditEventType::FileFailed => AuditSeverity::Error,
            AuditEventType::EmergencyStop => AuditSeverity::Critical,
            AuditEventType::FileSkipped | AuditEventType::ValidationRejected => {
                AuditSeverity::Warning
            }
            _ => AuditSeverity::Info,
        };

        Self {
            event_type,
            message: message.into(),
            metadata: HashMap::new(),
            severity,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Append-only JSONL audit log with an in-memory copy for queries
pub struct AuditLog {
    session_id: String,
    log_path: PathBuf,
    state: Mutex<LogState>,
}

struct LogState {
    entries: Vec<AuditEntry>,
    next_id: u64,
    file: File,
}

impl AuditLog {
    /// Create `audit_<session>_<timestamp>.jsonl` under `log_dir`
    pub fn new(session_id: impl Into<String>, log_dir: impl AsRef<Path>) -> Result<Self> {
        let session_id = session_id.into();
        let log_dir = log_dir.as_ref();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("audit_{}_{}.jsonl", session_id, timestamp));

        std::fs::create_dir_all(log_dir).map_err(|e| WipeError::io(log_dir, e))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| WipeError::io(&log_path, e))?;

        Ok(Self {
            session_id,
            log_path,
            state: Mutex::new(LogState {
                entries: Vec::new(),
                next_id: 1,
                file,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an event; returns its entry id
    pub fn log(&self, event: AuditEvent) -> Result<u64> {
        let mut state = self.lock();
        let id = state.next_id;

        let entry = AuditEntry {
            id,
            timestamp: Utc::now(),
            event_type: event.event_type,
            session_id: self.session_id.clone(),
            message: event.message,
            metadata: event.metadata,
            severity: event.severity,
        };

        let json = serde_json::to_string(&entry)?;
        writeln!(state.file, "{}", json).map_err(|e| WipeError::io(&self.log_path, e))?;
        state
            .file
            .flush()
            .map_err(|e| WipeError::io(&self.log_path, e))?;

        state.next_id += 1;
        state.entries.push(entry);
        Ok(id)
    }

    pub fn get_entries(&self) -> Vec<AuditEntry> {
        self.lock().entries.clone()
    }

    pub fn get_entries_by_type(&self, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn get_entries_by_severity(&self, severity: AuditSeverity) -> Vec<AuditEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Write all entries as a pretty JSON array
    pub fn export_json(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        let json = serde_json::to_string_pretty(&self.get_entries())?;
        std::fs::write(output_path, json).map_err(|e| WipeError::io(output_path, e))
    }

    pub fn get_statistics(&self) -> AuditStatistics {
        let state = self.lock();

        let mut event_type_counts = HashMap::new();
        let mut severity_counts = HashMap::new();
        for entry in &state.entries {
            *event_type_counts.entry(entry.event_type.clone()).or_insert(0) += 1;
            *severity_counts.entry(entry.severity).or_insert(0) += 1;
        }

        AuditStatistics {
            total_entries: state.entries.len(),
            event_type_counts,
            severity_counts,
            first_entry_time: state.entries.first().map(|e| e.timestamp),
            last_entry_time: state.entries.last().map(|e| e.timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditStatistics {
    pub total_entries: usize,
    pub event_type_counts: HashMap<AuditEventType, usize>,
    pub severity_counts: HashMap<AuditSeverity, usize>,
    pub first_entry_time: Option<DateTime<Utc>>,
    pub last_entry_time: Option<DateTime<Utc>>,
}

/// Wipe-specific convenience wrapper. Write failures are logged, not returned.
#[derive(Clone)]
pub struct AuditLogger {
    log: Arc<AuditLog>,
}

impl AuditLogger {
    pub fn new(log: Arc<AuditLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<AuditLog> {
        &self.log
    }

    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log.log(event) {
            tracing::warn!("Failed to write audit entry to {}: {}", self.log.log_path().display(), e);
        }
    }

    pub fn session_start(&self, target: &str, method: &str, total_files: usize) {
        self.record(
            AuditEvent::new(AuditEventType::SessionStart, "Wipe session started")
                .with_metadata("target", target)
                .with_metadata("method", method)
                .with_metadata("total_files", total_files.to_string()),
        );
    }

    pub fn session_end(&self, successful: usize, failed: usize, skipped: usize) {
        let status = if failed == 0 && skipped == 0 {
            "completed"
        } else if skipped > 0 {
            "cancelled"
        } else {
            "partial"
        };
        self.record(
            AuditEvent::new(AuditEventType::SessionEnd, "Wipe session ended")
                .with_metadata("status", status)
                .with_metadata("successful", successful.to_string())
                .with_metadata("failed", failed.to_string())
                .with_metadata("skipped", skipped.to_string()),
        );
    }

    pub fn file_wiped(&self, path: &Path, method: &str, passes: u32, bytes: u64) {
        self.record(
            AuditEvent::new(
                AuditEventType::FileWiped,
                format!("File wiped: {}", path.display()),
            )
            .with_metadata("method", method)
            .with_metadata("passes", passes.to_string())
            .with_metadata("bytes_written", bytes.to_string()),
        );
    }

    pub fn file_failed(&self, path: &Path, error: &str) {
        self.record(
            AuditEvent::new(
                AuditEventType::FileFailed,
                format!("Wipe failed: {}", path.display()),
            )
            .with_metadata("error", error),
        );
    }

    pub fn file_skipped(&self, path: &Path) {
        self.record(AuditEvent::new(
            AuditEventType::FileSkipped,
            format!("File skipped: {}", path.display()),
        ));
    }

    pub fn emergency_stop(&self) {
        self.record(AuditEvent::new(
            AuditEventType::EmergencyStop,
            "Emergency stop requested",
        ));
    }

    pub fn validation_rejected(&self, path: &Path, reason: &str) {
        self.record(
            AuditEvent::new(
                AuditEventType::ValidationRejected,
                format!("Target rejected: {}", path.display()),
            )
            .with_metadata("reason", reason),
        );
    }

    pub fn certificate_issued(&self, certificate_id: &str, total_files: usize) {
        self.record(
            AuditEvent::new(AuditEventType::CertificateIssued, "Wipe certificate issued")
                .with_metadata("certificate_id", certificate_id)
                .with_metadata("total_files", total_files.to_string()),
        );
    }

    pub fn certificate_verified(&self, certificate_id: &str, valid: bool) {
        let event = AuditEvent::new(
            AuditEventType::CertificateVerified,
            "Wipe certificate verified",
        )
        .with_metadata("certificate_id", certificate_id)
        .with_metadata("valid", valid.to_string());

        self.record(if valid {
            event
        } else {
            event.with_severity(AuditSeverity::Warning)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_audit_log_creation() {
        let temp_dir = TempDir::new().unwrap();
        let log = AuditLog::new("session-1", temp_dir.path().join("audit")).unwrap();

        assert_eq!(log.session_id(), "session-1");
        assert!(log.log_path().exists());
    }

    #[test]
    fn test_entries_are_appended_as_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let log = AuditLog::new("session-1", temp_dir.path()).unwrap();

        let id = log
            .log(
                AuditEvent::new(AuditEventType::FileWiped, "File wiped: /tmp/a")
                    .with_metadata("method", "purge"),
            )
            .unwrap();
        assert_eq!(id, 1);
        log.log(AuditEvent::new(AuditEventType::FileFailed, "boom"))
            .unwrap();

        let content = std::fs::read_to_string(log.log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, AuditEventType::FileWiped);
        assert_eq!(first.metadata.get("method"), Some(&"purge".to_string()));

        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.severity, AuditSeverity::Error);
    }

    #[test]
    fn test_audit_logger_wipe_events() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(AuditLog::new("session-1", temp_dir.path()).unwrap());
        let logger = AuditLogger::new(log.clone());

        logger.session_start("/data", "clear", 2);
        logger.file_wiped(Path::new("/data/a"), "clear", 1, 10);
        logger.file_skipped(Path::new("/data/b"));
        logger.emergency_stop();
        logger.session_end(1, 0, 1);

        assert_eq!(log.get_entries().len(), 5);
        assert_eq!(log.get_entries_by_severity(AuditSeverity::Critical).len(), 1);

        let end = &log.get_entries_by_type(AuditEventType::SessionEnd)[0];
        assert_eq!(end.metadata.get("status"), Some(&"cancelled".to_string()));
    }

    #[test]
    fn test_every_logger_event_has_a_type_and_severity() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(AuditLog::new("session-2", temp_dir.path()).unwrap());
        let logger = AuditLogger::new(log.clone());

        logger.session_start("selection", "purge", 1);
        logger.file_wiped(Path::new("/data/a"), "purge", 7, 70);
        logger.file_failed(Path::new("/data/b"), "I/O failure");
        logger.file_skipped(Path::new("/data/c"));
        logger.emergency_stop();
        logger.validation_rejected(Path::new("/etc/passwd"), "system file");
        logger.certificate_issued("ABCDEF0123456789", 3);
        logger.certificate_verified("ABCDEF0123456789", false);
        logger.session_end(1, 1, 1);

        let expected = [
            (AuditEventType::SessionStart, AuditSeverity::Info),
            (AuditEventType::FileWiped, AuditSeverity::Info),
            (AuditEventType::FileFailed, AuditSeverity::Error),
            (AuditEventType::FileSkipped, AuditSeverity::Warning),
            (AuditEventType::EmergencyStop, AuditSeverity::Critical),
            (AuditEventType::ValidationRejected, AuditSeverity::Warning),
            (AuditEventType::CertificateIssued, AuditSeverity::Info),
            (AuditEventType::CertificateVerified, AuditSeverity::Warning),
            (AuditEventType::SessionEnd, AuditSeverity::Info),
        ];
        let entries = log.get_entries();
        assert_eq!(entries.len(), expected.len());
        for (entry, (event_type, severity)) in entries.iter().zip(expected) {
            assert_eq!(entry.event_type, event_type);
            assert_eq!(entry.severity, severity, "{:?}", event_type);
        }

        // No optional fields beyond metadata end up in the trail
        let trail = std::fs::read_to_string(log.log_path()).unwrap();
        let first: serde_json::Value =
            serde_json::from_str(trail.lines().next().unwrap()).unwrap();
        let keys: Vec<&str> = first.as_object().unwrap().keys().map(String::as_str).collect();
        for key in &keys {
            assert!(
                ["id", "timestamp", "event_type", "session_id", "message", "metadata", "severity"]
                    .contains(key),
                "unexpected key {}",
                key
            );
        }
    }

    #[test]
    fn test_audit_export_and_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let log = AuditLog::new("session-1", temp_dir.path()).unwrap();

        log.log(AuditEvent::new(AuditEventType::FileWiped, "a")).unwrap();
        log.log(AuditEvent::new(AuditEventType::FileWiped, "b")).unwrap();
        log.log(AuditEvent::new(AuditEventType::ValidationRejected, "c"))
            .unwrap();

        let stats = log.get_statistics();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.event_type_counts.get(&AuditEventType::FileWiped), Some(&2));
        assert_eq!(stats.severity_counts.get(&AuditSeverity::Warning), Some(&1));

        let json_path = temp_dir.path().join("audit.json");
        log.export_json(&json_path).unwrap();
        let exported: Vec<AuditEntry> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(exported.len(), 3);
    }
}
