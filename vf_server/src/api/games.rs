//! Table, game, seat and must-move handlers.
//!
//! # Examples
//!
//! Spread a game on a table:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/games \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"table_id": 3, "game_type": "nlh", "stakes": "1/2", "max_players": 9}'
//! ```

use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use venue_floor::auth::{Caller, PlayerId};
use venue_floor::lifecycle::{
    Game, GameDetail, GameId, GameStatus, NewGame, NewTable, Seat, Table, TransitionOutcome,
};

use super::AppState;
use super::response::{ApiRequest, ApiResult, timed};

#[derive(Debug, Deserialize)]
pub struct GameFilter {
    pub status: Option<GameStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: GameStatus,
}

#[derive(Debug, Deserialize)]
pub struct OccupyRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub target_game_id: GameId,
}

pub async fn create_table(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiRequest(request): ApiRequest<NewTable>,
) -> ApiResult<Table> {
    timed(
        "tables.create",
        state.services.lifecycle.create_table(caller, &request),
    )
    .await
}

pub async fn list_tables(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Table>> {
    timed("tables.list", state.services.lifecycle.list_tables(caller)).await
}

pub async fn create_game(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiRequest(request): ApiRequest<NewGame>,
) -> ApiResult<GameDetail> {
    timed(
        "games.create",
        state.services.lifecycle.create_game(caller, &request),
    )
    .await
}

/// List games, optionally filtered with `?status=running`
pub async fn list_games(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(filter): Query<GameFilter>,
) -> ApiResult<Vec<Game>> {
    timed(
        "games.list",
        state.services.lifecycle.list_games(caller, filter.status),
    )
    .await
}

pub async fn get_game(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(game_id): Path<GameId>,
) -> ApiResult<GameDetail> {
    timed("games.get", state.services.lifecycle.get_game(caller, game_id)).await
}

/// Change a game's status
///
/// Closing a game also releases its table and clears its must-move links;
/// both are reported in the response.
pub async fn transition_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(game_id): Path<GameId>,
    ApiRequest(request): ApiRequest<StatusRequest>,
) -> ApiResult<TransitionOutcome> {
    timed(
        "games.transition",
        state
            .services
            .lifecycle
            .transition_status(caller, game_id, request.status),
    )
    .await
}

pub async fn occupy_seat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((game_id, seat_number)): Path<(GameId, i32)>,
    ApiRequest(request): ApiRequest<OccupyRequest>,
) -> ApiResult<Seat> {
    timed(
        "seats.occupy",
        state
            .services
            .lifecycle
            .occupy_seat(caller, game_id, seat_number, request.player_id),
    )
    .await
}

pub async fn vacate_seat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((game_id, seat_number)): Path<(GameId, i32)>,
) -> ApiResult<Seat> {
    timed(
        "seats.vacate",
        state
            .services
            .lifecycle
            .vacate_seat(caller, game_id, seat_number),
    )
    .await
}

pub async fn link_must_move(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(game_id): Path<GameId>,
    ApiRequest(request): ApiRequest<LinkRequest>,
) -> ApiResult<Game> {
    timed(
        "must_move.link",
        state
            .services
            .linker
            .link(caller, game_id, request.target_game_id),
    )
    .await
}

pub async fn unlink_must_move(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(game_id): Path<GameId>,
) -> ApiResult<Game> {
    timed(
        "must_move.unlink",
        state.services.linker.unlink(caller, game_id),
    )
    .await
}
