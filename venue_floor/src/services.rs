//! Wiring of every floor component over one store.

use std::sync::Arc;

use crate::auth::{StaffGate, StaffRepository};
use crate::comps::{CompLedger, CompRepository};
use crate::lifecycle::{LifecycleManager, LifecycleRepository};
use crate::must_move::{LinkRepository, MustMoveLinker};
use crate::notify::Notifier;
use crate::tournament::{
    ComplianceOracle, RegistrationEngine, SpendingLimitStore, TournamentRepository,
};
use crate::venue::{VenueRegistry, VenueRepository};
use crate::waitlist::{WaitlistCoordinator, WaitlistRepository};

/// A store backing every repository trait
pub trait FloorStore:
    VenueRepository
    + StaffRepository
    + LifecycleRepository
    + LinkRepository
    + WaitlistRepository
    + TournamentRepository
    + CompRepository
    + ComplianceOracle
    + SpendingLimitStore
    + Clone
    + 'static
{
}

impl<T> FloorStore for T where
    T: VenueRepository
        + StaffRepository
        + LifecycleRepository
        + LinkRepository
        + WaitlistRepository
        + TournamentRepository
        + CompRepository
        + ComplianceOracle
        + SpendingLimitStore
        + Clone
        + 'static
{
}

/// All floor components sharing one store and one notifier
#[derive(Clone)]
pub struct FloorServices {
    pub venues: VenueRegistry,
    pub venue_admin: Arc<dyn VenueRepository>,
    pub staff: Arc<dyn StaffRepository>,
    pub gate: StaffGate,
    pub lifecycle: LifecycleManager,
    pub linker: MustMoveLinker,
    pub waitlist: WaitlistCoordinator,
    pub tournaments: RegistrationEngine,
    pub comps: CompLedger,
    pub compliance: Arc<dyn ComplianceOracle>,
    pub spending_limits: Arc<dyn SpendingLimitStore>,
}

impl FloorServices {
    /// Build every component over `store`
    ///
    /// # Arguments
    ///
    /// * `store` - `PgStore` in production, `MemoryStore` for tests and local runs
    /// * `notifier` - Destination of seat-ready and registration notifications
    /// * `session_secret` - Secret key for session signing
    pub fn new<S: FloorStore>(store: S, notifier: Notifier, session_secret: String) -> Self {
        let venue_admin: Arc<dyn VenueRepository> = Arc::new(store.clone());
        let staff: Arc<dyn StaffRepository> = Arc::new(store.clone());
        let compliance: Arc<dyn ComplianceOracle> = Arc::new(store.clone());
        let spending_limits: Arc<dyn SpendingLimitStore> = Arc::new(store.clone());
        let venues = VenueRegistry::new(Arc::clone(&venue_admin));

        Self {
            gate: StaffGate::new(Arc::clone(&staff), session_secret),
            lifecycle: LifecycleManager::new(venues.clone(), Arc::new(store.clone())),
            linker: MustMoveLinker::new(venues.clone(), Arc::new(store.clone())),
            waitlist: WaitlistCoordinator::new(
                venues.clone(),
                Arc::new(store.clone()),
                notifier.clone(),
            ),
            tournaments: RegistrationEngine::new(
                venues.clone(),
                Arc::new(store.clone()),
                Arc::clone(&compliance),
                Arc::clone(&spending_limits),
                notifier,
            ),
            comps: CompLedger::new(venues.clone(), Arc::new(store)),
            venues,
            venue_admin,
            staff,
            compliance,
            spending_limits,
        }
    }

    pub fn with_gate(mut self, gate: StaffGate) -> Self {
        self.gate = gate;
        self
    }
}
