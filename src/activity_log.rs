use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;

use crate::events::{
    EventBus, ServerEvent, ANNOUNCEMENT_CREATED, FILE_UPLOADED, GRADE_UPDATED, KNOWN_EVENT_TYPES,
    STUDENT_ADDED,
};

/// Append-only textual audit trail. Grows monotonically; never rewritten or
/// compacted.
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ActivityLog {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open activity log {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line. The write happens under the file mutex so concurrent
    /// publishes never interleave partial lines.
    pub fn append(&self, line: &str) -> anyhow::Result<()> {
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{}", line).context("Failed to append activity log line")?;
        Ok(())
    }
}

/// Subscribes the audit logger to every known event type. Installed once at
/// startup; the subscriptions live for the rest of the process, so the log is
/// a complete record of all known-type events published while it ran.
///
/// Append failures are reported and dropped. The log is best-effort auxiliary
/// state and must never fail the request that triggered the publish.
pub fn attach_logger(bus: &EventBus, log: Arc<ActivityLog>) {
    for name in KNOWN_EVENT_TYPES {
        let log = log.clone();
        bus.subscribe(
            name,
            Arc::new(move |event: &ServerEvent| {
                let line = format!("{} {}", Utc::now().to_rfc3339(), summarize(event));
                if let Err(err) = log.append(&line) {
                    tracing::error!("Failed to write activity log entry: {:#}", err);
                }
                Ok(())
            }),
        );
    }
}

/// Human summary for one event. Missing payload fields render as a
/// placeholder instead of failing the append.
fn summarize(event: &ServerEvent) -> String {
    let payload = &event.payload;
    match event.name.as_str() {
        STUDENT_ADDED => format!(
            "Student Added: {} (id {})",
            field(payload, "name"),
            field(payload, "id")
        ),
        GRADE_UPDATED => format!(
            "Grade Updated: student {} {} -> {}",
            field(payload, "studentId"),
            field(payload, "subject"),
            field(payload, "score")
        ),
        ANNOUNCEMENT_CREATED => {
            format!("Announcement Created: {}", field(payload, "title"))
        }
        FILE_UPLOADED => format!(
            "File Uploaded: {} ({} bytes)",
            field(payload, "fileName"),
            field(payload, "size")
        ),
        other => format!("Event: {}", other),
    }
}

fn field(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => "unknown".to_string(),
    }
}
