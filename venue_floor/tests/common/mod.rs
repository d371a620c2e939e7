//! Shared setup for the floor integration tests.

#![allow(dead_code)]

use std::time::Duration;

use venue_floor::FloorServices;
use venue_floor::auth::{Caller, Role};
use venue_floor::db::MemoryStore;
use venue_floor::lifecycle::{GameDetail, GameStatus, NewGame, NewTable};
use venue_floor::notify::{MemoryDispatcher, Notification, Notifier};
use venue_floor::venue::{Venue, VenuePolicy, VenueRepository};

pub const TEST_SECRET: &str = "test-session-secret-with-32-bytes!!";

/// One venue over a fresh memory store
pub struct TestFloor {
    pub services: FloorServices,
    pub store: MemoryStore,
    pub dispatcher: MemoryDispatcher,
    pub venue: Venue,
}

impl TestFloor {
    pub async fn new() -> Self {
        Self::with_policy(VenuePolicy::all_enabled()).await
    }

    pub async fn with_policy(policy: VenuePolicy) -> Self {
        let store = MemoryStore::new();
        let dispatcher = MemoryDispatcher::new();
        let services = FloorServices::new(
            store.clone(),
            Notifier::new(std::sync::Arc::new(dispatcher.clone())),
            TEST_SECRET.to_string(),
        );
        let venue = store
            .create_venue("Test Card Room", &policy)
            .await
            .expect("Failed to create venue");

        Self {
            services,
            store,
            dispatcher,
            venue,
        }
    }

    /// Staff caller at this venue; ids are arbitrary, managers trust the caller
    pub fn staff(&self, role: Role) -> Caller {
        Caller::staff(900 + role as i64, self.venue.id, role)
    }

    pub fn floor(&self) -> Caller {
        self.staff(Role::Floor)
    }

    pub fn player(&self, player_id: i64) -> Caller {
        Caller::player(player_id, self.venue.id)
    }

    /// Spread a game on a fresh table
    pub async fn spread(&self, game_type: &str, stakes: &str, max_players: i32) -> GameDetail {
        let table = self
            .services
            .lifecycle
            .create_table(
                self.floor(),
                &NewTable {
                    label: format!("T-{game_type}-{stakes}-{max_players}"),
                },
            )
            .await
            .expect("Failed to create table");
        self.services
            .lifecycle
            .create_game(
                self.floor(),
                &NewGame {
                    table_id: Some(table.id),
                    game_type: game_type.to_string(),
                    stakes: stakes.to_string(),
                    max_players,
                    is_must_move: false,
                },
            )
            .await
            .expect("Failed to create game")
    }

    /// Spread a game and move it to `running`
    pub async fn spread_running(&self, game_type: &str, stakes: &str, max_players: i32) -> GameDetail {
        let detail = self.spread(game_type, stakes, max_players).await;
        self.services
            .lifecycle
            .transition_status(self.floor(), detail.game.id, GameStatus::Running)
            .await
            .expect("Failed to start game");
        self.services
            .lifecycle
            .get_game(self.floor(), detail.game.id)
            .await
            .expect("Failed to reload game")
    }

    /// Wait until the dispatcher has seen at least `count` notifications
    pub async fn notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.dispatcher.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.dispatcher.sent()
    }
}
