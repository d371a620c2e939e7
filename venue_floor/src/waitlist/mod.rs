//! Waitlist and seating: per-bucket FIFO queues feeding game seats.

pub mod coordinator;
pub mod models;
pub mod repository;

pub use coordinator::{ExpiredCall, SeatedEntry, WaitlistCoordinator};
pub use models::{
    Bucket, CallExpiry, CallOptions, EntryId, NewEntry, QueuePosition, WaitlistEntry,
    WaitlistStatus, seat_ready_message,
};
pub use repository::WaitlistRepository;
