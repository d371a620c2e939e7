//! Must-move linker.

use std::sync::Arc;

use super::{models::MustMoveLink, repository::LinkRepository};
use crate::auth::{Caller, Permission};
use crate::error::FloorResult;
use crate::lifecycle::{Game, GameId};
use crate::venue::{Feature, VenueRegistry};

/// Links overflow games to their main game
#[derive(Clone)]
pub struct MustMoveLinker {
    venues: VenueRegistry,
    repo: Arc<dyn LinkRepository>,
}

impl MustMoveLinker {
    pub fn new(venues: VenueRegistry, repo: Arc<dyn LinkRepository>) -> Self {
        Self { venues, repo }
    }

    /// Make `game_id` must-move into `target_id`
    ///
    /// # Errors
    ///
    /// * `FloorError::AlreadyLinked` - Game already has a target
    /// * `FloorError::Incompatible` - Different bucket, or a game not waiting/running
    /// * `FloorError::ChainError` - Link would create a chain or a cycle
    /// * `FloorError::GameClosed` - Game is closed
    pub async fn link(&self, caller: Caller, game_id: GameId, target_id: GameId) -> FloorResult<Game> {
        caller.require(Permission::ManageGames)?;
        self.venues.require(caller.venue_id, Feature::MustMove).await?;

        let game = self
            .repo
            .link(caller.venue_id, game_id, target_id)
            .await
            .inspect_err(|e| {
                tracing::debug!(game_id, target_id, error = %e, "Must-move link refused");
            })?;
        tracing::info!(
            venue_id = caller.venue_id,
            game_id,
            target_id,
            staff_id = caller.id,
            "Must-move link created"
        );
        Ok(game)
    }

    /// Remove the outgoing link of `game_id`
    ///
    /// # Errors
    ///
    /// * `FloorError::NotLinked` - Game has no link
    pub async fn unlink(&self, caller: Caller, game_id: GameId) -> FloorResult<Game> {
        caller.require(Permission::ManageGames)?;
        self.venues.require(caller.venue_id, Feature::MustMove).await?;

        let (game, target_id) = self.repo.unlink(caller.venue_id, game_id).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            game_id,
            target_id,
            staff_id = caller.id,
            "Must-move link removed"
        );
        Ok(game)
    }

    pub async fn links(&self, caller: Caller) -> FloorResult<Vec<MustMoveLink>> {
        caller.require(Permission::ViewFloor)?;
        self.repo.list_links(caller.venue_id).await
    }
}
