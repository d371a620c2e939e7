//! Tournament registration under capacity, compliance and spending limits.

pub mod compliance;
pub mod engine;
pub mod models;
pub mod repository;

pub use compliance::{ComplianceOracle, Exclusion, ExclusionType, SpendingLimitStore};
pub use engine::RegistrationEngine;
pub use models::{
    ChargeKind, EntryStatus, NewTournament, RegistrationCheck, SpendPolicy, Tournament,
    TournamentCharge, TournamentEntry, TournamentId, TournamentStatus,
};
pub use repository::TournamentRepository;
