//! # Venue Floor
//!
//! The floor-operations core of a card room: live tables and games, waitlists
//! that feed seats, must-move links between overflow games, tournament
//! registration under capacity and compliance limits, and a comp ledger.
//!
//! ## Architecture
//!
//! Each component is a manager over a repository trait. A repository method
//! is one atomic unit: the Postgres store runs it in a single transaction
//! with row locks, the memory store runs it under one mutex. The rules that
//! decide whether an operation may proceed are pure functions on the models,
//! shared by both stores.
//!
//! - [`venue`]: Venue registry, policy and feature flags
//! - [`auth`]: Session resolution, roles and permissions
//! - [`lifecycle`]: Table/game state machines and seats
//! - [`must_move`]: Links between games of the same bucket
//! - [`waitlist`]: Per-bucket FIFO queues, calls and seating
//! - [`tournament`]: Registration, rebuys, compliance and spending limits
//! - [`comps`]: Append-only comp ledger
//! - [`notify`]: Fire-and-forget notifications
//! - [`db`]: Connection pool, Postgres and memory stores
//!
//! ## Example
//!
//! ```
//! use venue_floor::{FloorServices, db::MemoryStore, notify::Notifier};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let services = FloorServices::new(
//!     MemoryStore::new(),
//!     Notifier::logging(),
//!     "a-secret-of-at-least-thirty-two-bytes".to_string(),
//! );
//! # let _ = services;
//! # }
//! ```

pub mod auth;
pub mod comps;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod must_move;
pub mod notify;
pub mod services;
pub mod tournament;
pub mod venue;
pub mod waitlist;

pub use error::{ErrorCategory, ErrorCode, FloorError, FloorResult};
pub use services::{FloorServices, FloorStore};
