//! HTTP API for venue floor operations.
//!
//! # Architecture
//!
//! - **Axum** routes under `/api/v1`, every one behind the session middleware
//! - **Caller**: the middleware resolves the bearer token into a
//!   [`venue_floor::auth::Caller`]; handlers pass it into the floor components,
//!   which enforce roles and venue scoping
//! - **Envelope**: `{ "success", "data"?, "error"? }` on every response, see [`response`]
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                                 - Health check (public)
//!
//! POST   /api/v1/tables                          - Open a table
//! GET    /api/v1/tables                          - List tables
//! POST   /api/v1/games                           - Spread a game
//! GET    /api/v1/games?status=                   - List games
//! GET    /api/v1/games/{id}                      - Game with seats
//! POST   /api/v1/games/{id}/status               - Change game status
//! POST   /api/v1/games/{id}/seats/{n}/occupy     - Seat a player directly
//! POST   /api/v1/games/{id}/seats/{n}/vacate     - Free a seat
//! POST   /api/v1/games/{id}/must-move            - Link to a main game
//! DELETE /api/v1/games/{id}/must-move            - Remove the link
//!
//! POST   /api/v1/waitlist                        - Join a queue
//! GET    /api/v1/waitlist?game_type&stakes       - Queue in FIFO order
//! GET    /api/v1/waitlist/players/{player_id}    - A player's active entries
//! POST   /api/v1/waitlist/call-next              - Call the head of a queue
//! POST   /api/v1/waitlist/expire-overdue         - Sweep elapsed calls
//! POST   /api/v1/waitlist/{id}/call              - Call a specific entry
//! POST   /api/v1/waitlist/{id}/seat              - Seat a called entry
//! POST   /api/v1/waitlist/{id}/expire            - Return a no-show to the queue
//! POST   /api/v1/waitlist/{id}/cancel            - Leave the queue
//!
//! POST   /api/v1/tournaments                     - Schedule a tournament
//! GET    /api/v1/tournaments                     - List tournaments
//! GET    /api/v1/tournaments/{id}                - Tournament detail
//! POST   /api/v1/tournaments/{id}/status         - Change tournament status
//! GET    /api/v1/tournaments/{id}/entries        - Entries, `?status=` filter
//! POST   /api/v1/tournaments/{id}/register       - Register a player
//! POST   /api/v1/tournaments/{id}/unregister     - Withdraw before start
//! POST   /api/v1/tournaments/{id}/rebuy          - Rebuy while running
//! POST   /api/v1/tournaments/{id}/addon          - One add-on while running
//! POST   /api/v1/tournaments/{id}/eliminate      - Record a bust-out
//!
//! GET    /api/v1/comps/{player_id}               - Derived balance
//! GET    /api/v1/comps/{player_id}/history       - Ledger, newest first
//! POST   /api/v1/comps/{player_id}/issue         - Issue comps
//! POST   /api/v1/comps/{player_id}/redeem        - Redeem comps
//! POST   /api/v1/comps/{player_id}/adjust        - Correct the balance
//! POST   /api/v1/comps/{player_id}/freeze        - Block redemptions
//! POST   /api/v1/comps/{player_id}/unfreeze      - Allow redemptions
//! ```
//!
//! The venue of every route is the caller's venue from the session.

pub mod comps;
pub mod games;
pub mod middleware;
pub mod request_id;
pub mod response;
pub mod tournaments;
pub mod waitlist;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use venue_floor::FloorServices;
use venue_floor::db::Database;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every component inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub services: FloorServices,
    /// Present with the postgres backend; checked by `/health`
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(services: FloorServices, database: Option<Database>) -> Self {
        Self { services, database }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use vf_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Versioned floor routes, all behind the session middleware
fn create_v1_router(state: AppState) -> Router<AppState> {
    let floor_routes = Router::new()
        .route(
            "/tables",
            post(games::create_table).get(games::list_tables),
        )
        .route("/games", post(games::create_game).get(games::list_games))
        .route("/games/{game_id}", get(games::get_game))
        .route("/games/{game_id}/status", post(games::transition_status))
        .route(
            "/games/{game_id}/seats/{seat_number}/occupy",
            post(games::occupy_seat),
        )
        .route(
            "/games/{game_id}/seats/{seat_number}/vacate",
            post(games::vacate_seat),
        )
        .route(
            "/games/{game_id}/must-move",
            post(games::link_must_move).delete(games::unlink_must_move),
        );

    let waitlist_routes = Router::new()
        .route(
            "/waitlist",
            post(waitlist::enqueue).get(waitlist::list_queue),
        )
        .route(
            "/waitlist/players/{player_id}",
            get(waitlist::list_player_entries),
        )
        .route("/waitlist/call-next", post(waitlist::call_next))
        .route("/waitlist/expire-overdue", post(waitlist::expire_overdue))
        .route("/waitlist/{entry_id}/call", post(waitlist::call_entry))
        .route("/waitlist/{entry_id}/seat", post(waitlist::seat))
        .route("/waitlist/{entry_id}/expire", post(waitlist::expire_call))
        .route("/waitlist/{entry_id}/cancel", post(waitlist::cancel));

    let tournament_routes = Router::new()
        .route(
            "/tournaments",
            post(tournaments::create_tournament).get(tournaments::list_tournaments),
        )
        .route("/tournaments/{tournament_id}", get(tournaments::get_tournament))
        .route(
            "/tournaments/{tournament_id}/status",
            post(tournaments::transition),
        )
        .route(
            "/tournaments/{tournament_id}/entries",
            get(tournaments::list_entries),
        )
        .route(
            "/tournaments/{tournament_id}/register",
            post(tournaments::register),
        )
        .route(
            "/tournaments/{tournament_id}/unregister",
            post(tournaments::unregister),
        )
        .route("/tournaments/{tournament_id}/rebuy", post(tournaments::rebuy))
        .route("/tournaments/{tournament_id}/addon", post(tournaments::addon))
        .route(
            "/tournaments/{tournament_id}/eliminate",
            post(tournaments::eliminate),
        );

    let comp_routes = Router::new()
        .route("/comps/{player_id}", get(comps::balance))
        .route("/comps/{player_id}/history", get(comps::history))
        .route("/comps/{player_id}/issue", post(comps::issue))
        .route("/comps/{player_id}/redeem", post(comps::redeem))
        .route("/comps/{player_id}/adjust", post(comps::adjust))
        .route("/comps/{player_id}/freeze", post(comps::freeze))
        .route("/comps/{player_id}/unfreeze", post(comps::unfreeze));

    Router::new()
        .merge(floor_routes)
        .merge(waitlist_routes)
        .merge(tournament_routes)
        .merge(comp_routes)
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store is reachable, `503 Service Unavailable`
/// otherwise. The memory backend is always healthy.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (backend, db_healthy) = match &state.database {
        Some(db) => ("postgres", db.health_check().await.is_ok()),
        None => ("memory", true),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": backend,
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
