use std::fmt;
use std::io::{stderr, stdout, Write};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use humantime::format_rfc3339;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const CAPTURE_LIMIT: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Maps a `console.<method>` name onto a level.
    pub fn from_console(method: &str) -> Level {
        match method {
            "error" => Level::Error,
            "warn" => Level::Warn,
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            _ => Level::Info,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(anyhow!("unsupported log level: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            tags: Map::new(),
            data: None,
            timestamp: current_timestamp(),
        }
    }

    /// Only scalar tag values are kept; nested values belong in `data`.
    pub fn tag(mut self, key: &str, value: impl Into<Value>) -> Self {
        match value.into() {
            scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
                self.tags.insert(key.to_string(), scalar);
            }
            _ => {}
        }
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

pub trait LogSink: Send + Sync {
    fn emit(&self, entry: LogEntry);
}

fn current_timestamp() -> String {
    format_rfc3339(SystemTime::now()).to_string()
}

/// JSON lines on stdout, `error` and `fatal` on stderr.
pub struct StdioLogSink {
    min_level: Level,
}

impl StdioLogSink {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl Default for StdioLogSink {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl LogSink for StdioLogSink {
    fn emit(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let Ok(serialized) = serde_json::to_string(&entry) else {
            return;
        };
        if entry.level >= Level::Error {
            let _ = writeln!(stderr(), "{serialized}");
        } else {
            let _ = writeln!(stdout(), "{serialized}");
        }
    }
}

#[derive(Default)]
struct Captured {
    entries: Vec<LogEntry>,
    truncated: bool,
}

/// Keeps entries in memory, mostly for tests. Stops recording after a fixed
/// number of entries and appends a single truncation notice.
#[derive(Default)]
pub struct MemoryLogSink {
    captured: Mutex<Captured>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.captured
            .lock()
            .map(|captured| captured.entries.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.message).collect()
    }

    pub fn is_truncated(&self) -> bool {
        self.captured
            .lock()
            .map(|captured| captured.truncated)
            .unwrap_or(false)
    }
}

impl LogSink for MemoryLogSink {
    fn emit(&self, entry: LogEntry) {
        let Ok(mut captured) = self.captured.lock() else {
            return;
        };
        if captured.entries.len() >= CAPTURE_LIMIT {
            if !captured.truncated {
                let notice = LogEntry::new(Level::Warn, "log buffer truncated")
                    .tag("component", "kernel")
                    .tag("reason", "log-overflow")
                    .data(json!({ "limit": CAPTURE_LIMIT }));
                captured.entries.push(notice);
                captured.truncated = true;
            }
            return;
        }
        captured.entries.push(entry);
    }
}

/// Shorthand for emitting a message tagged with the emitting component.
pub fn log(sink: &dyn LogSink, level: Level, component: &str, message: impl Into<String>) {
    sink.emit(LogEntry::new(level, message).tag("component", component));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("loud".parse::<Level>().is_err());
        assert!(Level::Error > Level::Info);
    }

    #[test]
    fn drops_non_scalar_tags() {
        let entry = LogEntry::new(Level::Info, "hi")
            .tag("component", "engine")
            .tag("nested", json!({ "a": 1 }));
        assert_eq!(entry.tags.len(), 1);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["level"], "info");
        assert_eq!(value["tags"]["component"], "engine");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn memory_sink_truncates_once() {
        let sink = MemoryLogSink::new();
        for i in 0..CAPTURE_LIMIT + 10 {
            log(&sink, Level::Debug, "test", format!("entry {i}"));
        }
        let entries = sink.entries();
        assert_eq!(entries.len(), CAPTURE_LIMIT + 1);
        assert_eq!(entries.last().unwrap().message, "log buffer truncated");
        assert!(sink.is_truncated());
    }
}
