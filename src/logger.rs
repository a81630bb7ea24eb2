use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_values;

/// How much of each poll response the wire log keeps.
pub enum MessageLogMode {
    Full,
    /// First document in full, then only field-level changes.
    Diffed,
}

/// NDJSON log of outbound requests, poll responses, and commands. Header
/// material (signatures, tokens) never reaches the log.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_state: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_state: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, device_id: &str, patch: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "device": device_id,
            "patch": patch,
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, device_id: &str, status: u16, body: &Value) {
        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "device": device_id,
                    "status": status,
                    "body": body,
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                if let Some(prev) = self.previous_state.take() {
                    let mut changes = Vec::new();
                    diff_values(&prev, body, "", &mut changes);

                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();

                    let entry = json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "device": device_id,
                        "status": status,
                        "changes": change_entries,
                    });
                    self.write_line(&entry);
                } else {
                    let entry = json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "device": device_id,
                        "status": status,
                        "full": true,
                        "body": body,
                    });
                    self.write_line(&entry);
                }
                self.previous_state = Some(body.clone());
            }
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("GET", "/things/ac-1/shadow");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert_eq!(lines[0]["path"], "/things/ac-1/shadow");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll("ac-1", 200, &json!({ "state": { "reported": { "powerSwitch": 0 } } }));
        logger.log_poll("ac-1", 200, &json!({ "state": { "reported": { "powerSwitch": 1 } } }));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["path"], "state.reported.powerSwitch");
    }

    #[test]
    fn diffed_mode_no_changes_logs_empty_array() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        let body = json!({ "state": { "reported": { "powerSwitch": 1 } } });
        logger.log_poll("ac-1", 200, &body);
        logger.log_poll("ac-1", 200, &body);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn log_command_captures_patch() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_command("ac-1", &json!({ "targetTemperature": 22.0 }));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["device"], "ac-1");
        assert_eq!(lines[0]["patch"]["targetTemperature"], 22.0);
    }
}
