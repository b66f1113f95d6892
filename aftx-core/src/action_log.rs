//! Append-only action records.
//!
//! The orchestrator pushes one record per flash attempt plus the run's terminal event. A sink
//! failure is never fatal: callers log it as a warning via [`record_or_warn`] and continue.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait ActionLogger: Send + Sync {
    fn record(&self, device_label: &str, action: &str, outcome: &str) -> Result<()>;
}

/// Record through `logger`, downgrading a failure to a warning.
pub fn record_or_warn(logger: &dyn ActionLogger, device_label: &str, action: &str, outcome: &str) {
    if let Err(err) = logger.record(device_label, action, outcome) {
        log::warn!(
            "action log write failed ({} {} {}): {:#}",
            device_label,
            action,
            outcome,
            err
        );
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp_ms: u64,
    pub device: String,
    pub action: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Ok => "OK",
            AttemptOutcome::Fail => "FAIL",
        }
    }
}

/// One flash invocation against one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashAttempt {
    pub serial: String,
    pub partition: String,
    pub image: PathBuf,
    pub outcome: AttemptOutcome,
    pub timestamp_ms: u64,
}

impl FlashAttempt {
    /// `flash:<partition>:<file name>`
    pub fn action(&self) -> String {
        let file = self
            .image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("flash:{}:{}", self.partition, file)
    }

    pub fn log_to(&self, logger: &dyn ActionLogger) {
        record_or_warn(logger, &self.serial, &self.action(), self.outcome.as_str());
    }
}

/// JSON-lines file sink.
#[derive(Debug)]
pub struct JsonlActionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(path: &Path) -> Result<Vec<ActionRecord>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read action log {}", path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("malformed action log line"))
            .collect()
    }
}

impl ActionLogger for JsonlActionLog {
    fn record(&self, device_label: &str, action: &str, outcome: &str) -> Result<()> {
        let record = ActionRecord {
            timestamp_ms: now_ms(),
            device: device_label.to_string(),
            action: action.to_string(),
            outcome: outcome.to_string(),
        };
        let line = serde_json::to_string(&record)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("action log lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open action log {}", self.path.display()))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process sink.
#[derive(Debug, Default)]
pub struct MemoryActionLog {
    records: Mutex<Vec<ActionRecord>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// `(action, outcome)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.records()
            .into_iter()
            .map(|r| (r.action, r.outcome))
            .collect()
    }
}

impl ActionLogger for MemoryActionLog {
    fn record(&self, device_label: &str, action: &str, outcome: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("action log lock poisoned"))?;
        records.push(ActionRecord {
            timestamp_ms: now_ms(),
            device: device_label.to_string(),
            action: action.to_string(),
            outcome: outcome.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullActionLog;

impl ActionLogger for NullActionLog {
    fn record(&self, _device_label: &str, _action: &str, _outcome: &str) -> Result<()> {
        Ok(())
    }
}

/// Fans records out to several sinks; every sink is attempted.
pub struct TeeActionLog {
    sinks: Vec<std::sync::Arc<dyn ActionLogger>>,
}

impl TeeActionLog {
    pub fn new(sinks: Vec<std::sync::Arc<dyn ActionLogger>>) -> Self {
        Self { sinks }
    }
}

impl ActionLogger for TeeActionLog {
    fn record(&self, device_label: &str, action: &str, outcome: &str) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.record(device_label, action, outcome) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
