//! Must-move linker: one-directional links between games of the same bucket.

pub mod linker;
pub mod models;
pub mod repository;

pub use linker::MustMoveLinker;
pub use models::{LinkCheck, MustMoveLink, is_valid_forest};
pub use repository::LinkRepository;
