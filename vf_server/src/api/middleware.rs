//! Session middleware for floor endpoints.
//!
//! Extracts the bearer token from the `Authorization` header, resolves it
//! through the staff gate, and injects the resulting [`Caller`] into request
//! extensions for downstream handlers.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use venue_floor::auth::Caller;
//!
//! async fn handler(Extension(caller): Extension<Caller>) -> String {
//!     format!("Venue {} as {}", caller.venue_id, caller.role)
//! }
//! # let _ = handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use venue_floor::FloorError;

use super::AppState;
use super::response::ApiError;
use crate::{logging, metrics};

/// Resolve the session and inject the [`Caller`]
///
/// # Behavior
///
/// - **Success**: Session valid → Injects `Caller` → Calls next handler
/// - **Missing or malformed header**: `401 Unauthorized`
/// - **Invalid/expired token, unknown or inactive staff**: `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        metrics::rejected_sessions_total();
        return ApiError(FloorError::Unauthenticated(
            "Missing bearer token".to_string(),
        ))
        .into_response();
    };

    match state.services.gate.resolve(token).await {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            metrics::rejected_sessions_total();
            logging::log_security_event("rejected_session", None, None, &e.to_string());
            ApiError(e).into_response()
        }
    }
}
