//! Table, game and seat models with their state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::PlayerId;
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Table ID type
pub type TableId = i64;

/// Game ID type
pub type GameId = i64;

/// Smallest game a floor will spread
pub const MIN_PLAYERS: i32 = 2;

/// Largest game a table can seat
pub const MAX_PLAYERS: i32 = 10;

/// Normalize a game type ("NLH " -> "nlh")
pub fn normalize_game_type(raw: &str) -> FloorResult<String> {
    let game_type = raw.trim().to_lowercase();
    if game_type.is_empty() {
        return Err(FloorError::Validation("game_type is required".to_string()));
    }
    Ok(game_type)
}

/// Normalize stakes ("1/2 " -> "1/2")
pub fn normalize_stakes(raw: &str) -> FloorResult<String> {
    let stakes: String = raw.split_whitespace().collect();
    if stakes.is_empty() {
        return Err(FloorError::Validation("stakes are required".to_string()));
    }
    Ok(stakes)
}

/// Table status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    InUse,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::InUse => "in_use",
        }
    }
}

impl std::str::FromStr for TableStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TableStatus::Available),
            "in_use" => Ok(TableStatus::InUse),
            other => Err(FloorError::Validation(format!(
                "unknown table status '{other}'"
            ))),
        }
    }
}

/// Physical table model
///
/// `current_game` is set exactly when the status is `InUse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub venue_id: VenueId,
    pub label: String,
    pub status: TableStatus,
    pub current_game: Option<GameId>,
    pub created_at: DateTime<Utc>,
}

impl Table {
    pub fn ensure_available(&self) -> FloorResult<()> {
        match self.status {
            TableStatus::Available => Ok(()),
            TableStatus::InUse => Err(FloorError::TableUnavailable { table_id: self.id }),
        }
    }

    pub fn bind(&mut self, game_id: GameId) -> FloorResult<()> {
        self.ensure_available()?;
        self.status = TableStatus::InUse;
        self.current_game = Some(game_id);
        Ok(())
    }

    pub fn release(&mut self) {
        self.status = TableStatus::Available;
        self.current_game = None;
    }
}

/// Game status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Running,
    Breaking,
    Closed,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Running => "running",
            GameStatus::Breaking => "breaking",
            GameStatus::Closed => "closed",
        }
    }

    pub fn can_transition_to(self, to: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, to),
            (Waiting, Running)
                | (Waiting, Closed)
                | (Running, Breaking)
                | (Running, Closed)
                | (Breaking, Running)
                | (Breaking, Closed)
        )
    }

    /// Seats may change hands in every status but `Closed`
    pub fn accepts_seating(self) -> bool {
        self != GameStatus::Closed
    }

    /// Must-move links may only involve waiting or running games
    pub fn is_linkable(self) -> bool {
        matches!(self, GameStatus::Waiting | GameStatus::Running)
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GameStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GameStatus::Waiting),
            "running" => Ok(GameStatus::Running),
            "breaking" => Ok(GameStatus::Breaking),
            "closed" => Ok(GameStatus::Closed),
            other => Err(FloorError::Validation(format!(
                "unknown game status '{other}'"
            ))),
        }
    }
}

/// Game model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub venue_id: VenueId,
    pub table_id: Option<TableId>,
    pub game_type: String,
    pub stakes: String,
    pub max_players: i32,
    pub status: GameStatus,
    pub is_must_move: bool,
    pub must_move_to: Option<GameId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Move to `to`, stamping `started_at` on the first start and `closed_at` on close
    ///
    /// # Errors
    ///
    /// * `FloorError::GameClosed` - The game is already closed
    /// * `FloorError::InvalidTransition` - Edge not in the allowed set
    pub fn apply_transition(&mut self, to: GameStatus, now: DateTime<Utc>) -> FloorResult<()> {
        if self.status == GameStatus::Closed {
            return Err(FloorError::GameClosed { game_id: self.id });
        }
        if !self.status.can_transition_to(to) {
            return Err(FloorError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.status = to;
        match to {
            GameStatus::Running if self.started_at.is_none() => self.started_at = Some(now),
            GameStatus::Closed => self.closed_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> FloorResult<()> {
        if self.status.accepts_seating() {
            Ok(())
        } else {
            Err(FloorError::GameClosed { game_id: self.id })
        }
    }

    pub fn check_seat_number(&self, seat_number: i32) -> FloorResult<()> {
        if (1..=self.max_players).contains(&seat_number) {
            Ok(())
        } else {
            Err(FloorError::Validation(format!(
                "seat {seat_number} is outside 1..={}",
                self.max_players
            )))
        }
    }

    /// True when both games share the (venue, game type, stakes) bucket
    pub fn same_bucket(&self, other: &Game) -> bool {
        self.venue_id == other.venue_id
            && self.game_type == other.game_type
            && self.stakes == other.stakes
    }
}

/// Seat status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Empty,
    Occupied,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Empty => "empty",
            SeatStatus::Occupied => "occupied",
        }
    }
}

impl std::str::FromStr for SeatStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(SeatStatus::Empty),
            "occupied" => Ok(SeatStatus::Occupied),
            other => Err(FloorError::Validation(format!(
                "unknown seat status '{other}'"
            ))),
        }
    }
}

/// Who sits in a seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occupant {
    Player { player_id: PlayerId },
    /// Walk-in without an account, seated off the waitlist
    Guest { name: String },
}

impl Occupant {
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Occupant::Player { player_id } => Some(*player_id),
            Occupant::Guest { .. } => None,
        }
    }

    pub(crate) fn from_columns(player_id: Option<PlayerId>, guest_name: Option<String>) -> Option<Self> {
        match (player_id, guest_name) {
            (Some(player_id), _) => Some(Occupant::Player { player_id }),
            (None, Some(name)) => Some(Occupant::Guest { name }),
            (None, None) => None,
        }
    }

    pub(crate) fn guest_name(&self) -> Option<&str> {
        match self {
            Occupant::Guest { name } => Some(name),
            Occupant::Player { .. } => None,
        }
    }
}

/// Seat model; one row per seat number, created with the game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub game_id: GameId,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub occupant: Option<Occupant>,
    pub occupied_at: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn empty(game_id: GameId, seat_number: i32) -> Self {
        Self {
            game_id,
            seat_number,
            status: SeatStatus::Empty,
            occupant: None,
            occupied_at: None,
        }
    }

    pub fn occupy(&mut self, occupant: Occupant, now: DateTime<Utc>) -> FloorResult<()> {
        if self.status == SeatStatus::Occupied {
            return Err(FloorError::SeatOccupied {
                game_id: self.game_id,
                seat_number: self.seat_number,
            });
        }
        self.status = SeatStatus::Occupied;
        self.occupant = Some(occupant);
        self.occupied_at = Some(now);
        Ok(())
    }

    pub fn vacate(&mut self) -> FloorResult<()> {
        if self.status == SeatStatus::Empty {
            return Err(FloorError::SeatEmpty {
                game_id: self.game_id,
                seat_number: self.seat_number,
            });
        }
        self.status = SeatStatus::Empty;
        self.occupant = None;
        self.occupied_at = None;
        Ok(())
    }
}

/// Request to open a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTable {
    pub label: String,
}

/// Request to spread a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGame {
    pub table_id: Option<TableId>,
    pub game_type: String,
    pub stakes: String,
    pub max_players: i32,
    #[serde(default)]
    pub is_must_move: bool,
}

impl NewGame {
    /// Validate and normalize the request
    pub fn normalized(&self) -> FloorResult<NewGame> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(FloorError::Validation(format!(
                "max_players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            )));
        }
        Ok(NewGame {
            table_id: self.table_id,
            game_type: normalize_game_type(&self.game_type)?,
            stakes: normalize_stakes(&self.stakes)?,
            max_players: self.max_players,
            is_must_move: self.is_must_move,
        })
    }
}

/// Game together with its seats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetail {
    pub game: Game,
    pub seats: Vec<Seat>,
}

impl GameDetail {
    pub fn occupied_count(&self) -> usize {
        self.seats
            .iter()
            .filter(|s| s.status == SeatStatus::Occupied)
            .count()
    }

    pub fn open_seats(&self) -> Vec<i32> {
        self.seats
            .iter()
            .filter(|s| s.status == SeatStatus::Empty)
            .map(|s| s.seat_number)
            .collect()
    }
}

/// Result of a status change, including close side effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub game: Game,
    pub previous_status: GameStatus,
    /// Table freed because the game closed
    pub released_table: Option<TableId>,
    /// Must-move links (from, to) removed because the game closed
    pub cleared_links: Vec<(GameId, GameId)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(status: GameStatus) -> Game {
        Game {
            id: 1,
            venue_id: 1,
            table_id: None,
            game_type: "nlh".to_string(),
            stakes: "1/2".to_string(),
            max_players: 6,
            status,
            is_must_move: false,
            must_move_to: None,
            created_at: Utc::now(),
            started_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn test_allowed_edges() {
        use GameStatus::*;
        let all = [Waiting, Running, Breaking, Closed];
        let allowed = [
            (Waiting, Running),
            (Waiting, Closed),
            (Running, Breaking),
            (Running, Closed),
            (Breaking, Running),
            (Breaking, Closed),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_started_at_stamped_once() {
        let mut g = game(GameStatus::Waiting);
        let first = Utc::now();
        g.apply_transition(GameStatus::Running, first).unwrap();
        assert_eq!(g.started_at, Some(first));

        g.apply_transition(GameStatus::Breaking, Utc::now()).unwrap();
        g.apply_transition(GameStatus::Running, first + chrono::Duration::minutes(20))
            .unwrap();
        assert_eq!(g.started_at, Some(first));
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut g = game(GameStatus::Running);
        g.apply_transition(GameStatus::Closed, Utc::now()).unwrap();
        assert!(g.closed_at.is_some());
        let err = g.apply_transition(GameStatus::Running, Utc::now()).unwrap_err();
        assert!(matches!(err, FloorError::GameClosed { game_id: 1 }));
        assert!(g.ensure_open().is_err());
    }

    #[test]
    fn test_invalid_edge() {
        let mut g = game(GameStatus::Waiting);
        let err = g.apply_transition(GameStatus::Breaking, Utc::now()).unwrap_err();
        assert!(matches!(err, FloorError::InvalidTransition { .. }));
        assert_eq!(g.status, GameStatus::Waiting);
    }

    #[test]
    fn test_seat_occupancy_toggles() {
        let mut seat = Seat::empty(1, 3);
        seat.occupy(Occupant::Player { player_id: 7 }, Utc::now())
            .unwrap();
        let err = seat
            .occupy(Occupant::Player { player_id: 8 }, Utc::now())
            .unwrap_err();
        assert!(matches!(err, FloorError::SeatOccupied { seat_number: 3, .. }));
        seat.vacate().unwrap();
        assert!(matches!(
            seat.vacate().unwrap_err(),
            FloorError::SeatEmpty { .. }
        ));
    }

    #[test]
    fn test_table_binding() {
        let mut table = Table {
            id: 4,
            venue_id: 1,
            label: "T4".to_string(),
            status: TableStatus::Available,
            current_game: None,
            created_at: Utc::now(),
        };
        table.bind(10).unwrap();
        assert_eq!(table.current_game, Some(10));
        assert!(matches!(
            table.bind(11).unwrap_err(),
            FloorError::TableUnavailable { table_id: 4 }
        ));
        table.release();
        assert_eq!(table.status, TableStatus::Available);
        assert_eq!(table.current_game, None);
    }

    #[test]
    fn test_new_game_validation() {
        let request = NewGame {
            table_id: None,
            game_type: " PLO ".to_string(),
            stakes: " 2 / 5 ".to_string(),
            max_players: 9,
            is_must_move: false,
        };
        let normalized = request.normalized().unwrap();
        assert_eq!(normalized.game_type, "plo");
        assert_eq!(normalized.stakes, "2/5");

        let too_big = NewGame {
            max_players: 11,
            ..request.clone()
        };
        assert!(too_big.normalized().is_err());
        let no_type = NewGame {
            game_type: "  ".to_string(),
            ..request
        };
        assert!(no_type.normalized().is_err());
    }

    #[test]
    fn test_seat_range() {
        let g = game(GameStatus::Waiting);
        assert!(g.check_seat_number(1).is_ok());
        assert!(g.check_seat_number(6).is_ok());
        assert!(g.check_seat_number(0).is_err());
        assert!(g.check_seat_number(7).is_err());
    }
}
