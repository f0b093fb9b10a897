//! Attaching the per-request logger to the request's extensions.
//!
//! The request context here is [`Extensions`]: request-scoped, carried by the
//! request itself through every tower service, and gone when the request is.
//! There is no process-global logger; handler code reaches the bound logger
//! only through the request it was bound to.
//!
//! Handlers can call [`get`] directly, or let axum extract the logger with
//! `Extension<Logger>` since [`bind`] stores the handle under its own type.

use axum::http::Extensions;

use crate::logger::Logger;

/// Stores `logger` in `extensions` so downstream code can retrieve it.
///
/// Entries emitted through the retrieved handle inherit every field the
/// logger was bound with, the correlation id included.
pub fn bind(extensions: &mut Extensions, logger: Logger) {
    extensions.insert(logger);
}

/// Retrieves the logger bound by [`bind`].
///
/// Returns a discard logger when none is bound, so callers can log
/// unconditionally.
pub fn get(extensions: &Extensions) -> Logger {
    extensions
        .get::<Logger>()
        .cloned()
        .unwrap_or_else(Logger::discard)
}
