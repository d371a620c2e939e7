//! Comp ledger handlers.
//!
//! Amounts are integer cents.

use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use venue_floor::auth::{Caller, PlayerId};
use venue_floor::comps::{CompAccount, CompBalance, CompLedgerEntry, RedemptionCategory};

use super::AppState;
use super::response::{ApiRequest, ApiResult, timed};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub amount: i64,
    pub category: RedemptionCategory,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct FreezeRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn balance(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
) -> ApiResult<CompBalance> {
    timed("comps.balance", state.services.comps.balance(caller, player_id)).await
}

/// Newest entries first, `?limit=` defaults to 50
pub async fn history(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<CompLedgerEntry>> {
    timed(
        "comps.history",
        state.services.comps.history(caller, player_id, query.limit),
    )
    .await
}

pub async fn issue(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
    ApiRequest(request): ApiRequest<AmountRequest>,
) -> ApiResult<CompLedgerEntry> {
    timed(
        "comps.issue",
        state
            .services
            .comps
            .issue(caller, player_id, request.amount, &request.description),
    )
    .await
}

pub async fn redeem(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
    ApiRequest(request): ApiRequest<RedeemRequest>,
) -> ApiResult<CompLedgerEntry> {
    timed(
        "comps.redeem",
        state.services.comps.redeem(
            caller,
            player_id,
            request.amount,
            request.category,
            &request.description,
        ),
    )
    .await
}

pub async fn adjust(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
    ApiRequest(request): ApiRequest<AmountRequest>,
) -> ApiResult<CompLedgerEntry> {
    timed(
        "comps.adjust",
        state
            .services
            .comps
            .adjust(caller, player_id, request.amount, &request.description),
    )
    .await
}

pub async fn freeze(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
    ApiRequest(request): ApiRequest<FreezeRequest>,
) -> ApiResult<CompAccount> {
    timed(
        "comps.freeze",
        state
            .services
            .comps
            .freeze(caller, player_id, request.reason.as_deref()),
    )
    .await
}

pub async fn unfreeze(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(player_id): Path<PlayerId>,
) -> ApiResult<CompAccount> {
    timed("comps.unfreeze", state.services.comps.unfreeze(caller, player_id)).await
}
