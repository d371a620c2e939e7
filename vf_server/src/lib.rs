//! HTTP server for venue floor operations.
//!
//! Exposes the [`venue_floor`] components over an HTTP+JSON API. See
//! [`api`] for the route table.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod notify;
