//! Must-move link persistence.

use async_trait::async_trait;
use sqlx::Row;

use super::models::{LinkCheck, MustMoveLink};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::lifecycle::repository::{GAME_COLUMNS, game_from_row, lock_game};
use crate::lifecycle::{Game, GameId};
use crate::venue::VenueId;

/// Must-move link storage
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Point `game_id` at `target_id` after checking the link rule under lock
    async fn link(&self, venue_id: VenueId, game_id: GameId, target_id: GameId)
    -> FloorResult<Game>;

    /// Clear the outgoing link of `game_id`, returning the game and its former target
    async fn unlink(&self, venue_id: VenueId, game_id: GameId) -> FloorResult<(Game, GameId)>;

    async fn list_links(&self, venue_id: VenueId) -> FloorResult<Vec<MustMoveLink>>;
}

#[async_trait]
impl LinkRepository for PgStore {
    async fn link(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        target_id: GameId,
    ) -> FloorResult<Game> {
        let mut tx = self.begin().await?;

        // Both rows, lowest id first, so concurrent links cannot deadlock
        let rows = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games
             WHERE id = ANY($1) AND venue_id = $2
             ORDER BY id FOR UPDATE"
        ))
        .bind(vec![game_id, target_id])
        .bind(venue_id)
        .fetch_all(&mut *tx)
        .await?;
        let games = rows.iter().map(game_from_row).collect::<FloorResult<Vec<_>>>()?;
        let find = |id: GameId| {
            games
                .iter()
                .find(|g| g.id == id)
                .ok_or_else(|| FloorError::not_found("game", id))
        };
        let game = find(game_id)?;
        let target = find(target_id)?;

        let incoming: Vec<GameId> = sqlx::query(
            "SELECT must_move_to FROM games WHERE must_move_to = ANY($1)",
        )
        .bind(vec![game_id, target_id])
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.try_get("must_move_to"))
        .collect::<Result<_, _>>()?;

        LinkCheck {
            game,
            target,
            game_has_incoming: incoming.contains(&game_id),
            target_has_incoming: incoming.contains(&target_id),
        }
        .evaluate()?;

        let row = sqlx::query(&format!(
            "UPDATE games SET must_move_to = $2 WHERE id = $1 RETURNING {GAME_COLUMNS}"
        ))
        .bind(game_id)
        .bind(target_id)
        .fetch_one(&mut *tx)
        .await?;
        let linked = game_from_row(&row)?;
        tx.commit().await?;
        Ok(linked)
    }

    async fn unlink(&self, venue_id: VenueId, game_id: GameId) -> FloorResult<(Game, GameId)> {
        let mut tx = self.begin().await?;
        let game = lock_game(&mut tx, venue_id, game_id).await?;
        let target = game
            .must_move_to
            .ok_or(FloorError::NotLinked { game_id })?;

        let row = sqlx::query(&format!(
            "UPDATE games SET must_move_to = NULL WHERE id = $1 RETURNING {GAME_COLUMNS}"
        ))
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await?;
        let unlinked = game_from_row(&row)?;
        tx.commit().await?;
        Ok((unlinked, target))
    }

    async fn list_links(&self, venue_id: VenueId) -> FloorResult<Vec<MustMoveLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, must_move_to FROM games
            WHERE venue_id = $1 AND must_move_to IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(venue_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|row| {
                Ok(MustMoveLink {
                    game_id: row.try_get("id")?,
                    must_move_to: row.try_get("must_move_to")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LinkRepository for MemoryStore {
    async fn link(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        target_id: GameId,
    ) -> FloorResult<Game> {
        self.write(|state, _| {
            let has_incoming =
                |id: GameId| state.games.values().any(|g| g.must_move_to == Some(id));
            LinkCheck {
                game: state.game_at(venue_id, game_id)?,
                target: state.game_at(venue_id, target_id)?,
                game_has_incoming: has_incoming(game_id),
                target_has_incoming: has_incoming(target_id),
            }
            .evaluate()?;

            let game = state.game_at_mut(venue_id, game_id)?;
            game.must_move_to = Some(target_id);
            Ok(game.clone())
        })
    }

    async fn unlink(&self, venue_id: VenueId, game_id: GameId) -> FloorResult<(Game, GameId)> {
        self.write(|state, _| {
            let game = state.game_at_mut(venue_id, game_id)?;
            let target = game
                .must_move_to
                .take()
                .ok_or(FloorError::NotLinked { game_id })?;
            Ok((game.clone(), target))
        })
    }

    async fn list_links(&self, venue_id: VenueId) -> FloorResult<Vec<MustMoveLink>> {
        self.read(|state| {
            Ok(state
                .games
                .values()
                .filter(|g| g.venue_id == venue_id)
                .filter_map(|g| {
                    g.must_move_to.map(|must_move_to| MustMoveLink {
                        game_id: g.id,
                        must_move_to,
                    })
                })
                .collect())
        })
    }
}
