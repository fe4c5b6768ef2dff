use std::io::Write;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::logger::{CaptureScope, LogEntry};

/// Destination of captured calls.
pub trait CaptureSink: Send + Sync {
    /// Writes one entry. Called from the consumer thread (or inline from the producer).
    fn write(&self, entry: &LogEntry);

    /// Flushes buffered output, if any.
    fn flush(&self) {}
}

/// Emits every entry as a `tracing` event with the scope as fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CaptureSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        let scope = &entry.scope;
        info!(
            target: "callscope::capture",
            timestamp = %scope.timestamp_iso8601(),
            module = %scope.module_name,
            declaring_type = %scope.type_name,
            method = %scope.method_name,
            trace_id = scope.trace_id.as_deref(),
            trace_format = scope.trace_format,
            "{}",
            entry.message()
        );
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    message: String,
    #[serde(flatten)]
    scope: &'a CaptureScope,
}

/// Writes every entry as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> CaptureSink for JsonLinesSink<W> {
    fn write(&self, entry: &LogEntry) {
        let line = JsonLine {
            message: entry.message(),
            scope: &entry.scope,
        };

        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        if let Err(error) = result {
            warn!(target: "callscope::logger", %error, "failed to write capture entry");
        }
    }

    fn flush(&self) {
        if let Err(error) = self.writer.lock().flush() {
            warn!(target: "callscope::logger", %error, "failed to flush capture sink");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.write(&LogEntry::diagnostic("first"));
        sink.write(&LogEntry::diagnostic("second"));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["message"], "second");
        assert!(lines[0]["timestamp"].is_string());
        assert!(lines[0].get("traceId").is_none());
    }
}
