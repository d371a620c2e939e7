//! Table/game lifecycle: tables, games, seats and their state machines.

pub mod manager;
pub mod models;
pub mod repository;

pub use manager::LifecycleManager;
pub use models::{
    Game, GameDetail, GameId, GameStatus, MAX_PLAYERS, MIN_PLAYERS, NewGame, NewTable, Occupant,
    Seat, SeatStatus, Table, TableId, TableStatus, TransitionOutcome, normalize_game_type,
    normalize_stakes,
};
pub use repository::LifecycleRepository;
