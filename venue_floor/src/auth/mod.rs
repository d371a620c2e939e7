//! Staff authorization gate: sessions, roles and permissions.

pub mod gate;
pub mod models;
pub mod repository;

pub use gate::{DEFAULT_SESSION_TTL_MINUTES, StaffGate};
pub use models::{
    Caller, Permission, PlayerId, Role, SessionClaims, SessionKind, StaffId, StaffMember,
};
pub use repository::StaffRepository;
