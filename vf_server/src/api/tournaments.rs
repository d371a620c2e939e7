//! Tournament registration handlers.

use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use venue_floor::FloorError;
use venue_floor::auth::{Caller, PlayerId};
use venue_floor::tournament::{
    EntryStatus, NewTournament, Tournament, TournamentEntry, TournamentId, TournamentStatus,
};

use super::AppState;
use super::response::{ApiError, ApiRequest, ApiResult, timed};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TournamentStatus,
}

#[derive(Debug, Deserialize)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
}

/// Player an entry operation applies to
///
/// Players may omit `player_id` to act on themselves; staff must name the player.
#[derive(Debug, Deserialize)]
pub struct PlayerTarget {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

impl PlayerTarget {
    fn resolve(&self, caller: &Caller) -> Result<PlayerId, ApiError> {
        match self.player_id {
            Some(player_id) => Ok(player_id),
            None if !caller.is_staff() => Ok(caller.id),
            None => Err(ApiError(FloorError::Validation(
                "player_id is required".to_string(),
            ))),
        }
    }
}

pub async fn create_tournament(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiRequest(request): ApiRequest<NewTournament>,
) -> ApiResult<Tournament> {
    timed(
        "tournaments.create",
        state.services.tournaments.create_tournament(caller, &request),
    )
    .await
}

pub async fn list_tournaments(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Tournament>> {
    timed(
        "tournaments.list",
        state.services.tournaments.list_tournaments(caller),
    )
    .await
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Tournament> {
    timed(
        "tournaments.get",
        state.services.tournaments.get_tournament(caller, tournament_id),
    )
    .await
}

pub async fn transition(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(request): ApiRequest<StatusRequest>,
) -> ApiResult<Tournament> {
    timed(
        "tournaments.transition",
        state
            .services
            .tournaments
            .transition(caller, tournament_id, request.status),
    )
    .await
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    Query(filter): Query<EntryFilter>,
) -> ApiResult<Vec<TournamentEntry>> {
    timed(
        "tournaments.entries",
        state
            .services
            .tournaments
            .list_entries(caller, tournament_id, filter.status),
    )
    .await
}

pub async fn register(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(target): ApiRequest<PlayerTarget>,
) -> ApiResult<TournamentEntry> {
    let player_id = target.resolve(&caller)?;
    timed(
        "tournaments.register",
        state
            .services
            .tournaments
            .register(caller, tournament_id, player_id),
    )
    .await
}

pub async fn unregister(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(target): ApiRequest<PlayerTarget>,
) -> ApiResult<TournamentEntry> {
    let player_id = target.resolve(&caller)?;
    timed(
        "tournaments.unregister",
        state
            .services
            .tournaments
            .unregister(caller, tournament_id, player_id),
    )
    .await
}

pub async fn rebuy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(target): ApiRequest<PlayerTarget>,
) -> ApiResult<TournamentEntry> {
    let player_id = target.resolve(&caller)?;
    timed(
        "tournaments.rebuy",
        state.services.tournaments.rebuy(caller, tournament_id, player_id),
    )
    .await
}

pub async fn addon(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(target): ApiRequest<PlayerTarget>,
) -> ApiResult<TournamentEntry> {
    let player_id = target.resolve(&caller)?;
    timed(
        "tournaments.addon",
        state.services.tournaments.addon(caller, tournament_id, player_id),
    )
    .await
}

pub async fn eliminate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tournament_id): Path<TournamentId>,
    ApiRequest(target): ApiRequest<PlayerTarget>,
) -> ApiResult<TournamentEntry> {
    let player_id = target.resolve(&caller)?;
    timed(
        "tournaments.eliminate",
        state
            .services
            .tournaments
            .eliminate(caller, tournament_id, player_id),
    )
    .await
}
