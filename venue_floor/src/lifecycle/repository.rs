//! Table, game and seat persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

use super::models::{
    Game, GameDetail, GameId, GameStatus, NewGame, Occupant, Seat, SeatStatus, Table, TableId,
    TableStatus, TransitionOutcome,
};
use crate::db::memory::FloorState;
use crate::db::postgres::{optional_timestamp, parse_column, timestamp};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Table/game lifecycle storage; every method is one atomic unit
#[async_trait]
pub trait LifecycleRepository: Send + Sync {
    async fn create_table(&self, venue_id: VenueId, label: &str) -> FloorResult<Table>;

    async fn get_table(&self, venue_id: VenueId, table_id: TableId) -> FloorResult<Option<Table>>;

    async fn list_tables(&self, venue_id: VenueId) -> FloorResult<Vec<Table>>;

    /// Insert a waiting game with all its empty seats, binding the table if given
    async fn create_game(&self, venue_id: VenueId, game: &NewGame) -> FloorResult<GameDetail>;

    async fn get_game(&self, venue_id: VenueId, game_id: GameId)
    -> FloorResult<Option<GameDetail>>;

    async fn list_games(
        &self,
        venue_id: VenueId,
        status: Option<GameStatus>,
    ) -> FloorResult<Vec<Game>>;

    /// Apply a status change; closing releases the table and clears must-move links
    async fn transition_game(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        to: GameStatus,
    ) -> FloorResult<TransitionOutcome>;

    async fn occupy_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
        occupant: &Occupant,
    ) -> FloorResult<Seat>;

    async fn vacate_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<Seat>;
}

/// Refuse seating a player who already holds another seat in the game
fn check_not_seated<'a>(
    game_id: GameId,
    occupant: &Occupant,
    seats: impl IntoIterator<Item = &'a Seat>,
) -> FloorResult<()> {
    let Some(player_id) = occupant.player_id() else {
        return Ok(());
    };
    match seats
        .into_iter()
        .find(|s| s.occupant.as_ref().and_then(Occupant::player_id) == Some(player_id))
    {
        Some(seat) => Err(FloorError::SeatOccupied {
            game_id,
            seat_number: seat.seat_number,
        }),
        None => Ok(()),
    }
}

pub(crate) const GAME_COLUMNS: &str = "id, venue_id, table_id, game_type, stakes, max_players, \
     status, is_must_move, must_move_to, created_at, started_at, closed_at";

const TABLE_COLUMNS: &str = "id, venue_id, label, status, current_game_id, created_at";

const SEAT_COLUMNS: &str = "game_id, seat_number, status, player_id, guest_name, occupied_at";

fn table_from_row(row: &PgRow) -> FloorResult<Table> {
    Ok(Table {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        label: row.try_get("label")?,
        status: parse_column(row, "status")?,
        current_game: row.try_get("current_game_id")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn game_from_row(row: &PgRow) -> FloorResult<Game> {
    Ok(Game {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        table_id: row.try_get("table_id")?,
        game_type: row.try_get("game_type")?,
        stakes: row.try_get("stakes")?,
        max_players: row.try_get("max_players")?,
        status: parse_column(row, "status")?,
        is_must_move: row.try_get("is_must_move")?,
        must_move_to: row.try_get("must_move_to")?,
        created_at: timestamp(row, "created_at")?,
        started_at: optional_timestamp(row, "started_at")?,
        closed_at: optional_timestamp(row, "closed_at")?,
    })
}

fn seat_from_row(row: &PgRow) -> FloorResult<Seat> {
    Ok(Seat {
        game_id: row.try_get("game_id")?,
        seat_number: row.try_get("seat_number")?,
        status: parse_column(row, "status")?,
        occupant: Occupant::from_columns(row.try_get("player_id")?, row.try_get("guest_name")?),
        occupied_at: optional_timestamp(row, "occupied_at")?,
    })
}

/// Lock a game row for the rest of the transaction
pub(crate) async fn lock_game(
    conn: &mut PgConnection,
    venue_id: VenueId,
    game_id: GameId,
) -> FloorResult<Game> {
    let row = sqlx::query(&format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE id = $1 AND venue_id = $2 FOR UPDATE"
    ))
    .bind(game_id)
    .bind(venue_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| FloorError::not_found("game", game_id))?;
    game_from_row(&row)
}

async fn load_seats(conn: &mut PgConnection, game_id: GameId) -> FloorResult<Vec<Seat>> {
    let rows = sqlx::query(&format!(
        "SELECT {SEAT_COLUMNS} FROM seats WHERE game_id = $1 ORDER BY seat_number"
    ))
    .bind(game_id)
    .fetch_all(conn)
    .await?;
    rows.iter().map(seat_from_row).collect()
}

async fn write_seat(conn: &mut PgConnection, seat: &Seat) -> FloorResult<()> {
    sqlx::query(
        r#"
        UPDATE seats
        SET status = $3, player_id = $4, guest_name = $5, occupied_at = $6
        WHERE game_id = $1 AND seat_number = $2
        "#,
    )
    .bind(seat.game_id)
    .bind(seat.seat_number)
    .bind(seat.status.as_str())
    .bind(seat.occupant.as_ref().and_then(Occupant::player_id))
    .bind(seat.occupant.as_ref().and_then(Occupant::guest_name))
    .bind(seat.occupied_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Seat an occupant inside an open transaction; the game row lock
/// serializes every seat change of that game
pub(crate) async fn occupy_seat_in(
    conn: &mut PgConnection,
    venue_id: VenueId,
    game_id: GameId,
    seat_number: i32,
    occupant: &Occupant,
    now: DateTime<Utc>,
) -> FloorResult<Seat> {
    let game = lock_game(conn, venue_id, game_id).await?;
    game.ensure_open()?;
    game.check_seat_number(seat_number)?;

    let seats = load_seats(conn, game_id).await?;
    check_not_seated(game_id, occupant, &seats)?;
    let mut seat = seats
        .into_iter()
        .find(|s| s.seat_number == seat_number)
        .ok_or_else(|| FloorError::Internal(format!("game {game_id} missing seat {seat_number}")))?;
    seat.occupy(occupant.clone(), now)?;
    write_seat(conn, &seat).await?;
    Ok(seat)
}

#[async_trait]
impl LifecycleRepository for PgStore {
    async fn create_table(&self, venue_id: VenueId, label: &str) -> FloorResult<Table> {
        let row = sqlx::query(&format!(
            "INSERT INTO poker_tables (venue_id, label) VALUES ($1, $2) RETURNING {TABLE_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(label)
        .fetch_one(self.pool())
        .await?;
        table_from_row(&row)
    }

    async fn get_table(&self, venue_id: VenueId, table_id: TableId) -> FloorResult<Option<Table>> {
        let row = sqlx::query(&format!(
            "SELECT {TABLE_COLUMNS} FROM poker_tables WHERE id = $1 AND venue_id = $2"
        ))
        .bind(table_id)
        .bind(venue_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(table_from_row).transpose()
    }

    async fn list_tables(&self, venue_id: VenueId) -> FloorResult<Vec<Table>> {
        let rows = sqlx::query(&format!(
            "SELECT {TABLE_COLUMNS} FROM poker_tables WHERE venue_id = $1 ORDER BY id"
        ))
        .bind(venue_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(table_from_row).collect()
    }

    async fn create_game(&self, venue_id: VenueId, new_game: &NewGame) -> FloorResult<GameDetail> {
        let mut tx = self.begin().await?;

        if let Some(table_id) = new_game.table_id {
            let row = sqlx::query(&format!(
                "SELECT {TABLE_COLUMNS} FROM poker_tables
                 WHERE id = $1 AND venue_id = $2 FOR UPDATE"
            ))
            .bind(table_id)
            .bind(venue_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| FloorError::not_found("table", table_id))?;
            table_from_row(&row)?.ensure_available()?;
        }

        let row = sqlx::query(&format!(
            "INSERT INTO games (venue_id, table_id, game_type, stakes, max_players, is_must_move)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {GAME_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(new_game.table_id)
        .bind(&new_game.game_type)
        .bind(&new_game.stakes)
        .bind(new_game.max_players)
        .bind(new_game.is_must_move)
        .fetch_one(&mut *tx)
        .await?;
        let game = game_from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO seats (game_id, seat_number, status)
            SELECT $1, n, 'empty' FROM generate_series(1, $2) AS n
            "#,
        )
        .bind(game.id)
        .bind(game.max_players)
        .execute(&mut *tx)
        .await?;

        if let Some(table_id) = game.table_id {
            sqlx::query(
                "UPDATE poker_tables SET status = 'in_use', current_game_id = $2 WHERE id = $1",
            )
            .bind(table_id)
            .bind(game.id)
            .execute(&mut *tx)
            .await?;
        }

        let seats = load_seats(&mut tx, game.id).await?;
        tx.commit().await?;
        Ok(GameDetail { game, seats })
    }

    async fn get_game(
        &self,
        venue_id: VenueId,
        game_id: GameId,
    ) -> FloorResult<Option<GameDetail>> {
        let mut conn = self.pool().acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE id = $1 AND venue_id = $2"
        ))
        .bind(game_id)
        .bind(venue_id)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let game = game_from_row(&row)?;
        let seats = load_seats(&mut conn, game_id).await?;
        Ok(Some(GameDetail { game, seats }))
    }

    async fn list_games(
        &self,
        venue_id: VenueId,
        status: Option<GameStatus>,
    ) -> FloorResult<Vec<Game>> {
        let rows = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games
             WHERE venue_id = $1 AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY id"
        ))
        .bind(venue_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(game_from_row).collect()
    }

    async fn transition_game(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        to: GameStatus,
    ) -> FloorResult<TransitionOutcome> {
        let mut tx = self.begin().await?;
        let mut game = lock_game(&mut tx, venue_id, game_id).await?;
        let previous_status = game.status;
        game.apply_transition(to, Utc::now())?;

        let mut released_table = None;
        let mut cleared_links = Vec::new();
        if to == GameStatus::Closed {
            if let Some(table_id) = game.table_id {
                let released = sqlx::query(
                    r#"
                    UPDATE poker_tables SET status = 'available', current_game_id = NULL
                    WHERE id = $1 AND current_game_id = $2
                    "#,
                )
                .bind(table_id)
                .bind(game.id)
                .execute(&mut *tx)
                .await?;
                if released.rows_affected() > 0 {
                    released_table = Some(table_id);
                }
            }
            if let Some(target) = game.must_move_to.take() {
                cleared_links.push((game.id, target));
            }
            let sources = sqlx::query(
                "UPDATE games SET must_move_to = NULL WHERE must_move_to = $1 RETURNING id",
            )
            .bind(game.id)
            .fetch_all(&mut *tx)
            .await?;
            for row in sources {
                cleared_links.push((row.try_get("id")?, game.id));
            }
        }

        sqlx::query(
            r#"
            UPDATE games
            SET status = $2, started_at = $3, closed_at = $4, must_move_to = $5
            WHERE id = $1
            "#,
        )
        .bind(game.id)
        .bind(game.status.as_str())
        .bind(game.started_at)
        .bind(game.closed_at)
        .bind(game.must_move_to)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TransitionOutcome {
            game,
            previous_status,
            released_table,
            cleared_links,
        })
    }

    async fn occupy_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
        occupant: &Occupant,
    ) -> FloorResult<Seat> {
        let mut tx = self.begin().await?;
        let seat =
            occupy_seat_in(&mut tx, venue_id, game_id, seat_number, occupant, Utc::now()).await?;
        tx.commit().await?;
        Ok(seat)
    }

    async fn vacate_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<Seat> {
        let mut tx = self.begin().await?;
        let game = lock_game(&mut tx, venue_id, game_id).await?;
        game.ensure_open()?;
        game.check_seat_number(seat_number)?;

        let row = sqlx::query(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE game_id = $1 AND seat_number = $2"
        ))
        .bind(game_id)
        .bind(seat_number)
        .fetch_one(&mut *tx)
        .await?;
        let mut seat = seat_from_row(&row)?;
        seat.vacate()?;
        write_seat(&mut tx, &seat).await?;
        tx.commit().await?;
        Ok(seat)
    }
}

impl FloorState {
    /// Venue-scoped game lookup; other venues' games are not found
    pub(crate) fn game_at(&self, venue_id: VenueId, game_id: GameId) -> FloorResult<&Game> {
        self.games
            .get(&game_id)
            .filter(|g| g.venue_id == venue_id)
            .ok_or_else(|| FloorError::not_found("game", game_id))
    }

    pub(crate) fn game_at_mut(
        &mut self,
        venue_id: VenueId,
        game_id: GameId,
    ) -> FloorResult<&mut Game> {
        self.games
            .get_mut(&game_id)
            .filter(|g| g.venue_id == venue_id)
            .ok_or_else(|| FloorError::not_found("game", game_id))
    }

    fn seats_of(&self, game_id: GameId) -> Vec<Seat> {
        self.seats
            .range((game_id, i32::MIN)..=(game_id, i32::MAX))
            .map(|(_, seat)| seat.clone())
            .collect()
    }

    pub(crate) fn occupy_seat(
        &mut self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
        occupant: &Occupant,
        now: DateTime<Utc>,
    ) -> FloorResult<Seat> {
        let game = self.game_at(venue_id, game_id)?;
        game.ensure_open()?;
        game.check_seat_number(seat_number)?;
        check_not_seated(game_id, occupant, self.seats.values().filter(|s| s.game_id == game_id))?;

        let seat = self
            .seats
            .get_mut(&(game_id, seat_number))
            .ok_or_else(|| FloorError::Internal(format!("game {game_id} missing seat {seat_number}")))?;
        seat.occupy(occupant.clone(), now)?;
        Ok(seat.clone())
    }
}

#[async_trait]
impl LifecycleRepository for MemoryStore {
    async fn create_table(&self, venue_id: VenueId, label: &str) -> FloorResult<Table> {
        self.write(|state, now| {
            let table = Table {
                id: state.next_id(),
                venue_id,
                label: label.to_string(),
                status: TableStatus::Available,
                current_game: None,
                created_at: now,
            };
            state.tables.insert(table.id, table.clone());
            Ok(table)
        })
    }

    async fn get_table(&self, venue_id: VenueId, table_id: TableId) -> FloorResult<Option<Table>> {
        self.read(|state| {
            Ok(state
                .tables
                .get(&table_id)
                .filter(|t| t.venue_id == venue_id)
                .cloned())
        })
    }

    async fn list_tables(&self, venue_id: VenueId) -> FloorResult<Vec<Table>> {
        self.read(|state| {
            Ok(state
                .tables
                .values()
                .filter(|t| t.venue_id == venue_id)
                .cloned()
                .collect())
        })
    }

    async fn create_game(&self, venue_id: VenueId, new_game: &NewGame) -> FloorResult<GameDetail> {
        self.write(|state, now| {
            let game_id = state.next_id();
            if let Some(table_id) = new_game.table_id {
                state
                    .tables
                    .get_mut(&table_id)
                    .filter(|t| t.venue_id == venue_id)
                    .ok_or_else(|| FloorError::not_found("table", table_id))?
                    .bind(game_id)?;
            }

            let game = Game {
                id: game_id,
                venue_id,
                table_id: new_game.table_id,
                game_type: new_game.game_type.clone(),
                stakes: new_game.stakes.clone(),
                max_players: new_game.max_players,
                status: GameStatus::Waiting,
                is_must_move: new_game.is_must_move,
                must_move_to: None,
                created_at: now,
                started_at: None,
                closed_at: None,
            };
            for seat_number in 1..=game.max_players {
                state
                    .seats
                    .insert((game_id, seat_number), Seat::empty(game_id, seat_number));
            }
            state.games.insert(game_id, game.clone());
            Ok(GameDetail {
                seats: state.seats_of(game_id),
                game,
            })
        })
    }

    async fn get_game(
        &self,
        venue_id: VenueId,
        game_id: GameId,
    ) -> FloorResult<Option<GameDetail>> {
        self.read(|state| {
            Ok(state.game_at(venue_id, game_id).ok().map(|game| GameDetail {
                game: game.clone(),
                seats: state.seats_of(game_id),
            }))
        })
    }

    async fn list_games(
        &self,
        venue_id: VenueId,
        status: Option<GameStatus>,
    ) -> FloorResult<Vec<Game>> {
        self.read(|state| {
            Ok(state
                .games
                .values()
                .filter(|g| g.venue_id == venue_id && status.is_none_or(|s| g.status == s))
                .cloned()
                .collect())
        })
    }

    async fn transition_game(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        to: GameStatus,
    ) -> FloorResult<TransitionOutcome> {
        self.write(|state, now| {
            let game = state.game_at_mut(venue_id, game_id)?;
            let previous_status = game.status;
            game.apply_transition(to, now)?;

            let mut cleared_links = Vec::new();
            let mut released_table = None;
            if to == GameStatus::Closed {
                if let Some(target) = game.must_move_to.take() {
                    cleared_links.push((game_id, target));
                }
                let table_id = game.table_id;

                for source in state.games.values_mut() {
                    if source.must_move_to == Some(game_id) {
                        source.must_move_to = None;
                        cleared_links.push((source.id, game_id));
                    }
                }
                if let Some(table) = table_id.and_then(|id| state.tables.get_mut(&id))
                    && table.current_game == Some(game_id)
                {
                    table.release();
                    released_table = Some(table.id);
                }
            }

            Ok(TransitionOutcome {
                game: state.game_at(venue_id, game_id)?.clone(),
                previous_status,
                released_table,
                cleared_links,
            })
        })
    }

    async fn occupy_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
        occupant: &Occupant,
    ) -> FloorResult<Seat> {
        self.write(|state, now| state.occupy_seat(venue_id, game_id, seat_number, occupant, now))
    }

    async fn vacate_seat(
        &self,
        venue_id: VenueId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<Seat> {
        self.write(|state, _| {
            let game = state.game_at(venue_id, game_id)?;
            game.ensure_open()?;
            game.check_seat_number(seat_number)?;
            let seat = state
                .seats
                .get_mut(&(game_id, seat_number))
                .ok_or_else(|| FloorError::Internal(format!("game {game_id} missing seat {seat_number}")))?;
            seat.vacate()?;
            Ok(seat.clone())
        })
    }
}
