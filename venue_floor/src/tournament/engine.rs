//! Tournament registration engine.

use std::sync::Arc;

use chrono::Utc;

use super::{
    compliance::{ComplianceOracle, SpendingLimitStore},
    models::{
        EntryStatus, NewTournament, SpendPolicy, Tournament, TournamentEntry, TournamentId,
        TournamentStatus,
    },
    repository::TournamentRepository,
};
use crate::auth::{Caller, Permission, PlayerId};
use crate::error::{FloorError, FloorResult};
use crate::notify::{Notification, Notifier};
use crate::venue::{Feature, VenueId, VenueRegistry};

/// Registration engine
#[derive(Clone)]
pub struct RegistrationEngine {
    venues: VenueRegistry,
    repo: Arc<dyn TournamentRepository>,
    compliance: Arc<dyn ComplianceOracle>,
    limits: Arc<dyn SpendingLimitStore>,
    notifier: Notifier,
}

impl RegistrationEngine {
    pub fn new(
        venues: VenueRegistry,
        repo: Arc<dyn TournamentRepository>,
        compliance: Arc<dyn ComplianceOracle>,
        limits: Arc<dyn SpendingLimitStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            venues,
            repo,
            compliance,
            limits,
            notifier,
        }
    }

    /// Schedule a tournament
    pub async fn create_tournament(
        &self,
        caller: Caller,
        request: &NewTournament,
    ) -> FloorResult<Tournament> {
        caller.require(Permission::ManageTournaments)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;
        let request = request.validated()?;

        let tournament = self.repo.create_tournament(caller.venue_id, &request).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id = tournament.id,
            buyin_amount = tournament.buyin_amount,
            max_entries = ?tournament.max_entries,
            staff_id = caller.id,
            "Tournament created"
        );
        Ok(tournament)
    }

    pub async fn get_tournament(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
    ) -> FloorResult<Tournament> {
        self.repo
            .get_tournament(caller.venue_id, tournament_id)
            .await?
            .ok_or_else(|| FloorError::not_found("tournament", tournament_id))
    }

    pub async fn list_tournaments(&self, caller: Caller) -> FloorResult<Vec<Tournament>> {
        self.repo.list_tournaments(caller.venue_id).await
    }

    /// Move a tournament along its state machine
    ///
    /// # Errors
    ///
    /// * `FloorError::InvalidTransition` - Edge not allowed, including any
    ///   change after completion or cancellation
    pub async fn transition(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        to: TournamentStatus,
    ) -> FloorResult<Tournament> {
        caller.require(Permission::ManageTournaments)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;

        let (tournament, previous) = self
            .repo
            .transition_tournament(caller.venue_id, tournament_id, to)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            from = %previous,
            to = %to,
            staff_id = caller.id,
            "Tournament status changed"
        );
        Ok(tournament)
    }

    async fn spend_policy(&self, venue_id: VenueId, player_id: PlayerId) -> FloorResult<SpendPolicy> {
        Ok(SpendPolicy {
            exclusion: self
                .compliance
                .active_exclusion(venue_id, player_id, Utc::now())
                .await?,
            daily_limit: self.limits.daily_limit(player_id).await?,
        })
    }

    /// Register a player
    ///
    /// Checks run in order and the first failure wins: registration open,
    /// not already registered, capacity, self-exclusion, daily spending limit.
    ///
    /// # Errors
    ///
    /// * `FloorError::RegistrationClosed` - Tournament is not scheduled or open
    /// * `FloorError::AlreadyRegistered` - Player already has an entry
    /// * `FloorError::TournamentFull` - `max_entries` reached
    /// * `FloorError::SelfExcluded` - Active exclusion at this venue or network-wide
    /// * `FloorError::LimitExceeded` - Buy-in would exceed the daily limit
    pub async fn register(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        caller.require_self_or(player_id, Permission::RegisterPlayers)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;
        let policy = self.spend_policy(caller.venue_id, player_id).await?;

        let entry = self
            .repo
            .register(caller.venue_id, tournament_id, player_id, &policy)
            .await
            .inspect_err(|e| match e {
                FloorError::SelfExcluded { .. } | FloorError::LimitExceeded { .. } => {
                    tracing::warn!(tournament_id, player_id, error = %e, "Registration refused by compliance");
                }
                _ => tracing::debug!(tournament_id, player_id, error = %e, "Registration refused"),
            })?;

        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            player_id,
            total_invested = entry.total_invested,
            caller_id = caller.id,
            "Player registered"
        );
        self.notifier.send(Notification::TournamentRegistered {
            venue_id: caller.venue_id,
            tournament_id,
            player_id,
        });
        Ok(entry)
    }

    /// Withdraw a player before the start; the entry becomes `cancelled`
    ///
    /// # Errors
    ///
    /// * `FloorError::TournamentStarted` - Tournament is running or completed
    /// * `FloorError::NotRegistered` - Player has no registered entry
    pub async fn unregister(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        caller.require_self_or(player_id, Permission::RegisterPlayers)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;

        let entry = self
            .repo
            .unregister(caller.venue_id, tournament_id, player_id)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            player_id,
            caller_id = caller.id,
            "Player unregistered"
        );
        Ok(entry)
    }

    /// Add a rebuy to a registered entry of a running tournament
    pub async fn rebuy(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        caller.require(Permission::RegisterPlayers)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;
        let policy = self.spend_policy(caller.venue_id, player_id).await?;

        let entry = self
            .repo
            .rebuy(caller.venue_id, tournament_id, player_id, &policy)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            player_id,
            rebuy_count = entry.rebuy_count,
            total_invested = entry.total_invested,
            staff_id = caller.id,
            "Rebuy recorded"
        );
        Ok(entry)
    }

    /// Take the single add-on of a registered entry while the tournament is
    /// running
    ///
    /// The add-on price goes through the same exclusion and daily-limit
    /// checks as a buy-in.
    ///
    /// # Errors
    ///
    /// * `FloorError::AddonNotAllowed` - Not running, no add-on offered, or
    ///   already taken
    /// * `FloorError::NotRegistered` - Player has no registered entry
    pub async fn addon(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        caller.require(Permission::RegisterPlayers)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;
        let policy = self.spend_policy(caller.venue_id, player_id).await?;

        let entry = self
            .repo
            .addon(caller.venue_id, tournament_id, player_id, &policy)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            player_id,
            total_invested = entry.total_invested,
            staff_id = caller.id,
            "Add-on recorded"
        );
        Ok(entry)
    }

    /// Record a bust-out while the tournament is running
    pub async fn eliminate(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        caller.require(Permission::ManageTournaments)?;
        self.venues
            .require(caller.venue_id, Feature::Tournaments)
            .await?;

        let entry = self
            .repo
            .eliminate(caller.venue_id, tournament_id, player_id)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            tournament_id,
            player_id,
            staff_id = caller.id,
            "Player eliminated"
        );
        Ok(entry)
    }

    pub async fn list_entries(
        &self,
        caller: Caller,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> FloorResult<Vec<TournamentEntry>> {
        caller.require(Permission::ViewFloor)?;
        self.get_tournament(caller, tournament_id).await?;
        self.repo
            .list_entries(caller.venue_id, tournament_id, status)
            .await
    }
}
