//! Waitlist and seating handlers.
//!
//! # Examples
//!
//! Call the next player for a bucket:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/waitlist/call-next \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"game_type": "nlh", "stakes": "1/2", "notify_sms": true}'
//! ```

use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use venue_floor::auth::{Caller, PlayerId};
use venue_floor::lifecycle::GameId;
use venue_floor::waitlist::{
    CallOptions, EntryId, ExpiredCall, NewEntry, QueuePosition, SeatedEntry, WaitlistEntry,
};

use super::AppState;
use super::response::{ApiRequest, ApiResult, timed};

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    pub game_type: String,
    pub stakes: String,
}

#[derive(Debug, Deserialize)]
pub struct CallNextRequest {
    pub game_type: String,
    pub stakes: String,
    #[serde(flatten)]
    pub options: CallOptions,
}

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub game_id: GameId,
    pub seat_number: i32,
}

/// Join a queue; a player joining without `player_id` joins as themselves
pub async fn enqueue(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiRequest(mut request): ApiRequest<NewEntry>,
) -> ApiResult<WaitlistEntry> {
    if !caller.is_staff() && request.player_id.is_none() {
        request.player_id = Some(caller.id);
    }
    timed("waitlist.enqueue", state.services.waitlist.enqueue(caller, &request)).await
}

pub async fn list_queue(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(bucket): Query<BucketQuery>,
) -> ApiResult<Vec<QueuePosition>> {
    timed(
        "waitlist.list",
        state
            .services
            .waitlist
            .list_queue(caller, &bucket.game_type, &bucket.stakes),
    )
    .await
}

pub async fn list_player_entries(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
) -> ApiResult<Vec<WaitlistEntry>> {
    timed(
        "waitlist.list_player",
        state
            .services
            .waitlist
            .list_player_entries(caller, player_id),
    )
    .await
}

pub async fn call_next(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiRequest(request): ApiRequest<CallNextRequest>,
) -> ApiResult<WaitlistEntry> {
    timed(
        "waitlist.call_next",
        state.services.waitlist.call_next(
            caller,
            &request.game_type,
            &request.stakes,
            &request.options,
        ),
    )
    .await
}

pub async fn call_entry(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(entry_id): Path<EntryId>,
    ApiRequest(options): ApiRequest<CallOptions>,
) -> ApiResult<WaitlistEntry> {
    timed(
        "waitlist.call",
        state.services.waitlist.call_entry(caller, entry_id, &options),
    )
    .await
}

pub async fn seat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(entry_id): Path<EntryId>,
    ApiRequest(request): ApiRequest<SeatRequest>,
) -> ApiResult<SeatedEntry> {
    timed(
        "waitlist.seat",
        state
            .services
            .waitlist
            .seat(caller, entry_id, request.game_id, request.seat_number),
    )
    .await
}

pub async fn expire_call(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(entry_id): Path<EntryId>,
) -> ApiResult<ExpiredCall> {
    timed(
        "waitlist.expire",
        state.services.waitlist.expire_call(caller, entry_id),
    )
    .await
}

pub async fn expire_overdue(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<ExpiredCall>> {
    timed(
        "waitlist.expire_overdue",
        state.services.waitlist.expire_overdue(caller),
    )
    .await
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(entry_id): Path<EntryId>,
) -> ApiResult<WaitlistEntry> {
    timed("waitlist.cancel", state.services.waitlist.cancel(caller, entry_id)).await
}
