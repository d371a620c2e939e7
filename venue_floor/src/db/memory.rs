//! In-process store.
//!
//! All state sits behind one mutex. Each repository method runs entirely
//! under the lock, so its reads and writes are serializable. Writes are
//! applied to a staged copy which replaces the original only when the
//! closure succeeds; a failed check leaves nothing behind. Tables are shared
//! between the copy and the original until first mutated, so a write only
//! copies the tables it touches.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::auth::{PlayerId, StaffId, StaffMember};
use crate::comps::{CompAccount, CompLedgerEntry};
use crate::error::{FloorError, FloorResult};
use crate::lifecycle::{Game, GameId, Seat, Table, TableId};
use crate::tournament::{Exclusion, Tournament, TournamentCharge, TournamentEntry, TournamentId};
use crate::venue::{Venue, VenueId};
use crate::waitlist::{EntryId, WaitlistEntry};

/// Copy-on-write table
///
/// Cloning shares the table; the first mutable access through a shared
/// handle copies it.
#[derive(Debug, Default)]
pub(crate) struct Staged<T>(Arc<T>);

impl<T> Clone for Staged<T> {
    fn clone(&self) -> Self {
        Staged(Arc::clone(&self.0))
    }
}

impl<T> Deref for Staged<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone> DerefMut for Staged<T> {
    fn deref_mut(&mut self) -> &mut T {
        Arc::make_mut(&mut self.0)
    }
}

/// Everything the floor stores
#[derive(Debug, Clone, Default)]
pub(crate) struct FloorState {
    last_id: i64,
    pub(crate) venues: Staged<BTreeMap<VenueId, Venue>>,
    pub(crate) staff: Staged<BTreeMap<StaffId, StaffMember>>,
    pub(crate) tables: Staged<BTreeMap<TableId, Table>>,
    pub(crate) games: Staged<BTreeMap<GameId, Game>>,
    pub(crate) seats: Staged<BTreeMap<(GameId, i32), Seat>>,
    pub(crate) waitlist: Staged<BTreeMap<EntryId, WaitlistEntry>>,
    pub(crate) tournaments: Staged<BTreeMap<TournamentId, Tournament>>,
    pub(crate) tournament_entries: Staged<BTreeMap<i64, TournamentEntry>>,
    pub(crate) tournament_charges: Staged<Vec<TournamentCharge>>,
    pub(crate) comp_ledger: Staged<Vec<CompLedgerEntry>>,
    pub(crate) comp_accounts: Staged<HashMap<(VenueId, PlayerId), CompAccount>>,
    pub(crate) exclusions: Staged<Vec<Exclusion>>,
    pub(crate) spending_limits: Staged<HashMap<PlayerId, i64>>,
}

impl FloorState {
    /// Allocate an id; one sequence serves every table
    pub(crate) fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Mutex-backed store implementing every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<FloorState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only closure under the lock
    pub(crate) fn read<T>(&self, f: impl FnOnce(&FloorState) -> FloorResult<T>) -> FloorResult<T> {
        let state = self
            .state
            .lock()
            .map_err(|_| FloorError::Internal("memory store lock poisoned".to_string()))?;
        f(&state)
    }

    /// Run a mutating closure under the lock, committing only on success
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut FloorState, DateTime<Utc>) -> FloorResult<T>,
    ) -> FloorResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| FloorError::Internal("memory store lock poisoned".to_string()))?;
        let mut staged = state.clone();
        let value = f(&mut staged, Utc::now())?;
        *state = staged;
        Ok(value)
    }
}
