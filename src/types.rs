//! Data types for structured log records and request/response snapshots.
//!
//! This module contains the severity enum, the abstract log record handed to
//! the formatter, and the immutable snapshots of request, response and host
//! attributes that make up the two lifecycle entries.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// Log severity, ordered from most to least verbose.
///
/// Parses from and displays as the lowercase level name (`"trace"`,
/// `"debug"`, `"info"`, `"warn"`, `"error"`), which is also the value
/// emitted under the `level` key of every serialized entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(Error::InvalidLevel(other.to_string())),
        }
    }
}

/// An abstract log record: severity, message, unix-seconds timestamp and a
/// flat map of structured fields.
///
/// Records are built by [`Logger`](crate::Logger) methods and consumed once
/// by the formatter; they are never mutated after construction.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    /// Unix timestamp in whole seconds.
    pub time: i64,
    /// Structured fields, unioned into the top level of the serialized
    /// object. Insertion order is the emission order.
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, time: i64) -> Self {
        Self {
            level,
            message: message.into(),
            time,
            fields: Map::new(),
        }
    }
}

/// Attributes captured from the inbound request, once, at entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    /// Request path, including the query string after `?` when one is present.
    pub path: String,
    pub method: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// Raw query string without the leading `?`; empty when the request has none.
    pub query: String,
    pub scheme: String,
    /// Protocol version string, e.g. `HTTP/1.1`.
    pub protocol: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

/// Attributes captured from the response after the inner service returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseInfo {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Elapsed wall-clock milliseconds measured on a monotonic clock.
    #[serde(rename = "responseTime")]
    pub response_time: f64,
}

/// The `http` field of a lifecycle entry. `response` serializes as a literal
/// `null` on the incoming entry and as a [`ResponseInfo`] on the completed one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpInfo {
    pub request: RequestInfo,
    pub response: Option<ResponseInfo>,
}

/// Host and peer attributes, identical on both lifecycle entries.
///
/// Absent forwarding headers yield empty strings, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub ip: String,
    #[serde(rename = "forwardedHostname")]
    pub forwarded_hostname: String,
}
