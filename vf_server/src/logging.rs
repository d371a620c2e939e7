//! Structured logging configuration.
//!
//! This module provides structured logging with request correlation
//! and security event tracking.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use vf_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `caller_id` - Staff or player id, when the session resolved
/// * `venue_id` - Venue of the session, when known
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use vf_server::logging::log_security_event;
///
/// log_security_event("rejected_token", None, None, "Invalid session token");
/// ```
pub fn log_security_event(
    event_type: &str,
    caller_id: Option<i64>,
    venue_id: Option<i64>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        caller_id = caller_id,
        venue_id = venue_id,
        "SECURITY: {}",
        message
    );
}

/// Log a floor operation that ran slowly
pub fn log_performance(operation: &str, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            "Performance metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("insufficient_role", Some(1), Some(2), "Test message");
    }

    #[test]
    fn test_log_performance() {
        log_performance("waitlist.call_next", 5);
        log_performance("comps.redeem", 2000);
    }
}
