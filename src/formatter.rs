//! Newline-delimited JSON entry formatter.

use serde_json::{Map, Value};

use crate::error::Error;
use crate::types::LogRecord;

/// Serializes a [`LogRecord`] into one compact JSON object per record,
/// terminated by a single newline.
///
/// Keys are emitted as `level`, `message`, `time`, then every structured
/// field unioned into the top level in insertion order. The output for
/// identical input is deterministic within one process, so the minimal
/// no-fields case can be compared as a whole string.
///
/// The formatter produces bytes only; writing them somewhere is the sink's
/// job.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Formats `record` as `{"level":..,"message":..,"time":..,<fields>}\n`.
    ///
    /// Fails only when a field value cannot be represented in JSON; absent
    /// optional fields are never an error.
    pub fn format(&self, record: &LogRecord) -> Result<Vec<u8>, Error> {
        let mut object = Map::with_capacity(3 + record.fields.len());
        object.insert("level".into(), Value::from(record.level.as_str()));
        object.insert("message".into(), Value::from(record.message.as_str()));
        object.insert("time".into(), Value::from(record.time));
        for (key, value) in &record.fields {
            object.insert(key.clone(), value.clone());
        }

        let mut line = serde_json::to_vec(&object)?;
        line.push(b'\n');
        Ok(line)
    }
}
