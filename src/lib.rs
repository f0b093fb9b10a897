//! # Reqlog
//!
//! An Axum middleware that wraps each inbound request with a per-request
//! structured logger, emits an "Incoming Request" entry when the request
//! arrives and a completed entry (carrying status code and elapsed time)
//! after the handler returns, and serializes every entry as one line of
//! compact JSON handed to a pluggable sink.
//!
//! ## Features
//!
//! - **Correlation ids**: taken verbatim from `x-request-id` when present,
//!   freshly generated otherwise; both lifecycle entries of a request carry
//!   the same id
//! - **Context-carried logger**: the per-request logger rides in the
//!   request's extensions, so handler code can emit entries that inherit the
//!   correlation id without any global state
//! - **Best-effort by construction**: a formatting or sink failure never
//!   changes the response and never prevents the inner handler from running
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Extension, Router};
//! use reqlog::{Logger, RequestLogLayer, SinkOptions};
//!
//! // The bound logger is an extension, so handlers can just extract it.
//! async fn hello(Extension(logger): Extension<Logger>) -> &'static str {
//!     logger.info("saying hello");
//!     "Hello, World!"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let logger = Logger::init(SinkOptions {
//!         level: "trace".into(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let app = Router::new()
//!         .route("/hello", get(hello))
//!         .layer(RequestLogLayer::new(logger));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! Handlers that sit behind more middleware can reach the logger through the
//! request's extensions instead:
//!
//! ```rust
//! use axum::extract::Request;
//! use reqlog::context;
//!
//! fn inspect(request: &Request) {
//!     // Yields a discard logger when the middleware is not installed.
//!     context::get(request.extensions()).debug("inspecting request");
//! }
//! ```

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, Version};
use axum::response::Response;
use serde_json::{Map, Value};
use tower::{Layer, Service};
use tracing::{debug, error, instrument};
use uuid::Uuid;

pub mod context;
pub mod error;
pub mod formatter;
pub mod logger;
pub mod types;

pub use error::Error;
pub use formatter::JsonFormatter;
pub use logger::{Logger, Sink, SinkOptions};
pub use types::{HostInfo, HttpInfo, Level, LogRecord, RequestInfo, ResponseInfo};

/// Header consulted for an inbound correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Message carried by both lifecycle entries.
const LIFECYCLE_MESSAGE: &str = "Incoming Request";

/// Returns the inbound `x-request-id` value when present and non-empty,
/// otherwise a freshly generated UUID. Uniqueness is the only contract for
/// generated ids.
fn resolve_correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Returns a header value as a string, or empty when the header is missing
/// or not valid UTF-8. Malformed headers are "field absent", never an error.
fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Drops a trailing `:port` from a host string. Bare IPv6 addresses pass
/// through unchanged; bracketed ones lose the brackets along with the port.
fn strip_port(host: &str) -> &str {
    if let Some(bracketed) = host.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or(host);
    }
    match host.rsplit_once(':') {
        // A colon in the head means a bare IPv6 address, not host:port.
        Some((head, _)) if !head.contains(':') => head,
        _ => host,
    }
}

fn protocol_string(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9".to_string(),
        Version::HTTP_10 => "HTTP/1.0".to_string(),
        Version::HTTP_11 => "HTTP/1.1".to_string(),
        Version::HTTP_2 => "HTTP/2.0".to_string(),
        Version::HTTP_3 => "HTTP/3.0".to_string(),
        other => format!("{other:?}"),
    }
}

/// Captures the host-side attributes shared by both lifecycle entries.
///
/// The client ip prefers the first `x-forwarded-for` element, then the
/// connection's remote address when the server was started with connect
/// info. Every field degrades to an empty string, never an error.
fn extract_host_info(request: &Request) -> HostInfo {
    let headers = request.headers();

    let hostname = strip_port(&header_str(headers, header::HOST)).to_string();

    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let ip = forwarded_for.unwrap_or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default()
    });

    let forwarded_hostname = headers
        .get("x-forwarded-host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    HostInfo {
        hostname,
        ip,
        forwarded_hostname,
    }
}

/// Snapshots the inbound request once, at entry. The path keeps its query
/// string after `?`, and the query is also captured separately without it.
///
/// Origin-form requests carry no scheme in the URI, so the snapshot falls
/// back to the first `x-forwarded-proto` element before assuming `http`;
/// that keeps the field honest behind a TLS-terminating proxy.
fn snapshot_request(request: &Request) -> RequestInfo {
    let uri = request.uri();
    let query = uri.query().unwrap_or_default().to_string();
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let scheme = uri
        .scheme_str()
        .map(str::to_owned)
        .or_else(|| {
            request
                .headers()
                .get("x-forwarded-proto")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        })
        .unwrap_or_else(|| "http".to_string());

    RequestInfo {
        path,
        method: request.method().to_string(),
        content_type: header_str(request.headers(), header::CONTENT_TYPE),
        query,
        scheme,
        protocol: protocol_string(request.version()),
        user_agent: header_str(request.headers(), header::USER_AGENT),
    }
}

/// Builds the `{http, host}` field pair of a lifecycle entry.
///
/// An unrepresentable value loses its field but never aborts the request;
/// the failure lands on the crate's own diagnostic channel instead.
fn lifecycle_fields(
    request: &RequestInfo,
    response: Option<ResponseInfo>,
    host: &HostInfo,
) -> Map<String, Value> {
    let http = HttpInfo {
        request: request.clone(),
        response,
    };

    let mut fields = Map::with_capacity(2);
    match serde_json::to_value(&http) {
        Ok(value) => {
            fields.insert("http".to_string(), value);
        }
        Err(err) => error!(error = %err, "failed to encode http lifecycle fields"),
    }
    match serde_json::to_value(host) {
        Ok(value) => {
            fields.insert("host".to_string(), value);
        }
        Err(err) => error!(error = %err, "failed to encode host lifecycle fields"),
    }
    fields
}

/// Tower layer for the request lifecycle logging middleware.
///
/// This is the main entry point. Wrapping a service with it yields a
/// [`RequestLogService`] that emits exactly two lifecycle entries per
/// request through the given root logger.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{routing::get, Router};
/// use reqlog::{Logger, RequestLogLayer, SinkOptions};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let logger = Logger::init(SinkOptions::default()).unwrap();
///
/// let app = Router::new()
///     .route("/hello", get(hello))
///     .layer(RequestLogLayer::new(logger));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct RequestLogLayer {
    logger: Logger,
}

impl RequestLogLayer {
    /// Creates a layer whose per-request loggers derive from `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Tower service implementation for the request lifecycle logging
/// middleware.
///
/// Users typically don't interact with this type directly - it's created by
/// [`RequestLogLayer`].
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    logger: Logger,
}

impl<S> Service<Request> for RequestLogService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request) -> Self::Future {
        let correlation_id = resolve_correlation_id(request.headers());
        let host = extract_host_info(&request);
        let request_info = snapshot_request(&request);

        debug!(
            correlation_id = %correlation_id,
            method = %request_info.method,
            path = %request_info.path,
            "starting request lifecycle"
        );

        // The correlation id and host fields are frozen into the handle, so
        // entries emitted by downstream handler code carry both.
        let mut bound = Map::with_capacity(2);
        bound.insert("reqId".to_string(), Value::from(correlation_id));
        match serde_json::to_value(&host) {
            Ok(value) => {
                bound.insert("host".to_string(), value);
            }
            Err(err) => error!(error = %err, "failed to encode bound host fields"),
        }
        let request_logger = self.logger.with_fields(bound);
        context::bind(request.extensions_mut(), request_logger.clone());

        // The clock starts just before the incoming emission so the
        // completed entry measures the whole delegated call. Instant is
        // monotonic, unlike wall-clock time.
        let start = Instant::now();
        request_logger.log(
            Level::Trace,
            LIFECYCLE_MESSAGE,
            lifecycle_fields(&request_info, None, &host),
        );

        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;

            // Axum responses always carry a status; handlers that never set
            // one get the builder default of 200.
            let response_info = ResponseInfo {
                status_code: response.status().as_u16(),
                response_time: start.elapsed().as_secs_f64() * 1000.0,
            };
            request_logger.log(
                Level::Trace,
                LIFECYCLE_MESSAGE,
                lifecycle_fields(&request_info, Some(response_info), &host),
            );

            Ok(response)
        })
    }
}
