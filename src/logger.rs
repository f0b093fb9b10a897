//! The sink and the cheap-clone logger handle bound to it.
//!
//! A [`Sink`] owns the output destination and the minimum severity; a
//! [`Logger`] is a handle over a shared sink plus a frozen set of structured
//! fields. Binding more fields produces a new handle and never mutates an
//! existing one, so a per-request logger can be cloned into handler code
//! freely.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tracing::error;

use crate::error::Error;
use crate::formatter::JsonFormatter;
use crate::types::{Level, LogRecord};

/// Configuration accepted by [`Sink::new`].
#[derive(Default)]
pub struct SinkOptions {
    /// Minimum severity as a lowercase level name. Entries below it are
    /// dropped before formatting. Defaults to `info` when empty.
    pub level: String,
    /// Output destination. Defaults to stdout.
    pub writer: Option<Box<dyn Write + Send>>,
}

/// Accepts formatted entries and writes each one atomically to its
/// destination.
///
/// The writer is guarded by a mutex and every record goes out as a single
/// `write_all` of one full line, so concurrent requests never interleave
/// bytes within one JSON object.
pub struct Sink {
    level: Level,
    formatter: JsonFormatter,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Sink {
    /// Creates a sink from `options`.
    ///
    /// Fails only when the level name is present but unrecognized.
    pub fn new(options: SinkOptions) -> Result<Self, Error> {
        let level = if options.level.is_empty() {
            Level::Info
        } else {
            options.level.parse()?
        };
        let writer = options
            .writer
            .unwrap_or_else(|| Box::new(io::stdout()) as Box<dyn Write + Send>);

        Ok(Self {
            level,
            formatter: JsonFormatter,
            writer: Mutex::new(writer),
        })
    }

    fn emit(&self, record: &LogRecord) {
        if record.level < self.level {
            return;
        }

        // A logging failure must never reach the request path, so both
        // formatting and write errors end here.
        let line = match self.formatter.format(record) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "failed to format log record");
                return;
            }
        };

        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writer.write_all(&line) {
            error!(error = %err, "failed to write log record to sink");
            return;
        }
        if let Err(err) = writer.flush() {
            error!(error = %err, "failed to flush log sink");
        }
    }
}

/// A logging handle bound to a [`Sink`] and a frozen field set.
///
/// Every entry emitted through the handle carries its bound fields. The
/// handle is `Clone` and cheap to pass around; [`Logger::discard`] yields a
/// handle whose entries go nowhere, which is what context lookup hands out
/// when no logger was bound.
#[derive(Clone)]
pub struct Logger {
    sink: Option<Arc<Sink>>,
    fields: Arc<Map<String, Value>>,
}

impl Logger {
    /// Creates a root logger with no bound fields.
    pub fn new(sink: Sink) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
            fields: Arc::new(Map::new()),
        }
    }

    /// Convenience for `Logger::new(Sink::new(options)?)`.
    pub fn init(options: SinkOptions) -> Result<Self, Error> {
        Ok(Self::new(Sink::new(options)?))
    }

    /// A logger that drops every entry. Never fails, never panics.
    pub fn discard() -> Self {
        Self {
            sink: None,
            fields: Arc::new(Map::new()),
        }
    }

    /// Returns a new handle carrying this handle's fields plus `fields`.
    ///
    /// The receiver is untouched; later entries on either handle see only
    /// the fields that handle was built with.
    pub fn with_fields(&self, fields: Map<String, Value>) -> Self {
        let mut merged = Map::clone(&self.fields);
        merged.extend(fields);
        Self {
            sink: self.sink.clone(),
            fields: Arc::new(merged),
        }
    }

    /// Emits one record at `level` with the bound fields plus `extra`.
    pub fn log(&self, level: Level, message: &str, extra: Map<String, Value>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut record = LogRecord::new(level, message, unix_seconds());
        record.fields = Map::clone(&self.fields);
        record.fields.extend(extra);
        sink.emit(&record);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::Trace, message, Map::new());
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message, Map::new());
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message, Map::new());
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message, Map::new());
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message, Map::new());
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("bound", &self.sink.is_some())
            .field("fields", &self.fields)
            .finish()
    }
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Write half of an in-memory buffer shared with the test body.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8(bytes.clone())
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logger(level: &str) -> (Logger, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let logger = Logger::init(SinkOptions {
            level: level.to_string(),
            writer: Some(Box::new(buffer.clone())),
        })
        .unwrap();
        (logger, buffer)
    }

    #[test]
    fn entries_below_minimum_severity_are_dropped() {
        let (logger, buffer) = capture_logger("warn");

        logger.trace("dropped");
        logger.info("dropped");
        logger.warn("kept");
        logger.error("kept");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[1]["level"], "error");
    }

    #[test]
    fn bound_fields_appear_on_every_entry() {
        let (logger, buffer) = capture_logger("trace");
        let mut fields = Map::new();
        fields.insert("reqId".into(), json!("abc-123"));
        let bound = logger.with_fields(fields);

        bound.info("first");
        bound.info("second");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["reqId"], "abc-123");
        }
    }

    #[test]
    fn with_fields_leaves_the_receiver_untouched() {
        let (logger, buffer) = capture_logger("trace");
        let mut fields = Map::new();
        fields.insert("scope".into(), json!("request"));
        let _bound = logger.with_fields(fields);

        logger.info("unscoped");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].get("scope").is_none());
    }

    #[test]
    fn discard_logger_swallows_everything() {
        // Nothing to assert against a destination; the contract is that no
        // call panics or fails.
        let logger = Logger::discard();
        logger.trace("into the void");
        logger.error("into the void");
        logger.with_fields(Map::new()).info("still nothing");
    }

    #[test]
    fn invalid_level_is_a_construction_error() {
        let result = Logger::init(SinkOptions {
            level: "loud".into(),
            writer: None,
        });
        assert!(matches!(result, Err(Error::InvalidLevel(_))));
    }

    #[test]
    fn default_minimum_severity_is_info() {
        let buffer = SharedBuffer::default();
        let logger = Logger::init(SinkOptions {
            level: String::new(),
            writer: Some(Box::new(buffer.clone())),
        })
        .unwrap();

        logger.debug("dropped");
        logger.info("kept");

        assert_eq!(buffer.lines().len(), 1);
    }
}
