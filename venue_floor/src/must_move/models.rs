//! Must-move link rule.
//!
//! The link graph is a forest of depth at most one: every game has at most
//! one outgoing and one incoming link, and no game has both.

use serde::{Deserialize, Serialize};

use crate::error::{FloorError, FloorResult};
use crate::lifecycle::{Game, GameId, GameStatus};

/// A directed link from an overflow game to its main game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MustMoveLink {
    pub game_id: GameId,
    pub must_move_to: GameId,
}

/// Link state around the two games, read under lock
#[derive(Debug, Clone, Copy)]
pub struct LinkCheck<'a> {
    pub game: &'a Game,
    pub target: &'a Game,
    /// Some other game already points at `game`
    pub game_has_incoming: bool,
    /// Some other game already points at `target`
    pub target_has_incoming: bool,
}

impl LinkCheck<'_> {
    /// Decide whether `game.must_move_to = target` keeps the graph valid
    pub fn evaluate(&self) -> FloorResult<()> {
        let (game, target) = (self.game, self.target);

        if game.id == target.id {
            return Err(FloorError::ChainError { game_id: game.id });
        }
        if game.status == GameStatus::Closed {
            return Err(FloorError::GameClosed { game_id: game.id });
        }
        if !game.status.is_linkable() {
            return Err(FloorError::Incompatible(format!(
                "game {} is {}",
                game.id, game.status
            )));
        }
        if let Some(existing) = game.must_move_to {
            return Err(FloorError::AlreadyLinked {
                game_id: game.id,
                target: existing,
            });
        }
        if !target.status.is_linkable() {
            return Err(FloorError::Incompatible(format!(
                "target game {} is {}",
                target.id, target.status
            )));
        }
        if !game.same_bucket(target) {
            return Err(FloorError::Incompatible(format!(
                "game {} ({} {}) and game {} ({} {}) differ",
                game.id, game.game_type, game.stakes, target.id, target.game_type, target.stakes
            )));
        }
        if target.must_move_to.is_some() || self.game_has_incoming || self.target_has_incoming {
            return Err(FloorError::ChainError { game_id: game.id });
        }
        Ok(())
    }
}

/// True when the links form no chain, no cycle and no shared target
pub fn is_valid_forest(links: &[MustMoveLink]) -> bool {
    use std::collections::HashSet;

    let sources: HashSet<GameId> = links.iter().map(|l| l.game_id).collect();
    let mut targets = HashSet::new();
    sources.len() == links.len()
        && links.iter().all(|l| {
            l.game_id != l.must_move_to
                && targets.insert(l.must_move_to)
                && !sources.contains(&l.must_move_to)
        })
}
