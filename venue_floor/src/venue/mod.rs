//! Venue registry: per-venue policy and feature flags.

pub mod models;
pub mod registry;
pub mod repository;

pub use models::{DEFAULT_CALL_WINDOW_SECS, Feature, Venue, VenueId, VenuePolicy};
pub use registry::VenueRegistry;
pub use repository::VenueRepository;
