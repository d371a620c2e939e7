//! Table/game lifecycle manager.

use std::sync::Arc;

use super::{
    models::{
        Game, GameDetail, GameId, GameStatus, NewGame, NewTable, Occupant, Seat, Table, TableId,
        TransitionOutcome,
    },
    repository::LifecycleRepository,
};
use crate::auth::{Caller, Permission, PlayerId};
use crate::error::{FloorError, FloorResult};
use crate::venue::{Feature, VenueRegistry};

/// Lifecycle manager
#[derive(Clone)]
pub struct LifecycleManager {
    venues: VenueRegistry,
    repo: Arc<dyn LifecycleRepository>,
}

impl LifecycleManager {
    pub fn new(venues: VenueRegistry, repo: Arc<dyn LifecycleRepository>) -> Self {
        Self { venues, repo }
    }

    /// Open a physical table
    pub async fn create_table(&self, caller: Caller, request: &NewTable) -> FloorResult<Table> {
        caller.require(Permission::ManageGames)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;

        let label = request.label.trim();
        if label.is_empty() {
            return Err(FloorError::Validation("label is required".to_string()));
        }

        let table = self.repo.create_table(caller.venue_id, label).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            table_id = table.id,
            staff_id = caller.id,
            "Table created"
        );
        Ok(table)
    }

    pub async fn get_table(&self, caller: Caller, table_id: TableId) -> FloorResult<Table> {
        caller.require(Permission::ViewFloor)?;
        self.repo
            .get_table(caller.venue_id, table_id)
            .await?
            .ok_or_else(|| FloorError::not_found("table", table_id))
    }

    pub async fn list_tables(&self, caller: Caller) -> FloorResult<Vec<Table>> {
        caller.require(Permission::ViewFloor)?;
        self.repo.list_tables(caller.venue_id).await
    }

    /// Spread a new game in `waiting` status with all seats empty
    ///
    /// # Errors
    ///
    /// * `FloorError::VenueDisabled` - Floor operations are off for the venue
    /// * `FloorError::Validation` - Bad game type, stakes or seat count
    /// * `FloorError::NotFound` - Unknown table
    /// * `FloorError::TableUnavailable` - Table already hosts a game
    pub async fn create_game(&self, caller: Caller, request: &NewGame) -> FloorResult<GameDetail> {
        caller.require(Permission::ManageGames)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;
        let request = request.normalized()?;

        let detail = self.repo.create_game(caller.venue_id, &request).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            game_id = detail.game.id,
            table_id = ?detail.game.table_id,
            game_type = %detail.game.game_type,
            stakes = %detail.game.stakes,
            max_players = detail.game.max_players,
            staff_id = caller.id,
            "Game created"
        );
        Ok(detail)
    }

    pub async fn get_game(&self, caller: Caller, game_id: GameId) -> FloorResult<GameDetail> {
        caller.require(Permission::ViewFloor)?;
        self.repo
            .get_game(caller.venue_id, game_id)
            .await?
            .ok_or_else(|| FloorError::not_found("game", game_id))
    }

    pub async fn list_games(
        &self,
        caller: Caller,
        status: Option<GameStatus>,
    ) -> FloorResult<Vec<Game>> {
        caller.require(Permission::ViewFloor)?;
        self.repo.list_games(caller.venue_id, status).await
    }

    /// Move a game along its state machine
    ///
    /// Closing a game releases its table and clears every must-move link
    /// into or out of it in the same transaction.
    ///
    /// # Errors
    ///
    /// * `FloorError::InvalidTransition` - Edge not allowed
    /// * `FloorError::GameClosed` - Game is already closed
    pub async fn transition_status(
        &self,
        caller: Caller,
        game_id: GameId,
        to: GameStatus,
    ) -> FloorResult<TransitionOutcome> {
        caller.require(Permission::ManageGames)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;

        let outcome = self
            .repo
            .transition_game(caller.venue_id, game_id, to)
            .await
            .inspect_err(|e| {
                tracing::debug!(game_id, to = %to, error = %e, "Game transition refused");
            })?;

        tracing::info!(
            venue_id = caller.venue_id,
            game_id,
            from = %outcome.previous_status,
            to = %to,
            released_table = ?outcome.released_table,
            cleared_links = outcome.cleared_links.len(),
            staff_id = caller.id,
            "Game status changed"
        );
        Ok(outcome)
    }

    /// Seat a player directly, outside the waitlist
    pub async fn occupy_seat(
        &self,
        caller: Caller,
        game_id: GameId,
        seat_number: i32,
        player_id: PlayerId,
    ) -> FloorResult<Seat> {
        caller.require(Permission::ManageSeats)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;

        let seat = self
            .repo
            .occupy_seat(
                caller.venue_id,
                game_id,
                seat_number,
                &Occupant::Player { player_id },
            )
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            game_id,
            seat_number,
            player_id,
            staff_id = caller.id,
            "Seat occupied"
        );
        Ok(seat)
    }

    pub async fn vacate_seat(
        &self,
        caller: Caller,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<Seat> {
        caller.require(Permission::ManageSeats)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;

        let seat = self
            .repo
            .vacate_seat(caller.venue_id, game_id, seat_number)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            game_id,
            seat_number,
            staff_id = caller.id,
            "Seat vacated"
        );
        Ok(seat)
    }
}
