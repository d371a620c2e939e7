//! Response envelope and error mapping.
//!
//! Every API response body has the shape
//! `{ "success": bool, "data"?: ..., "error"?: { "code", "message" } }`.

use std::future::Future;
use std::time::Instant;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use venue_floor::{ErrorCategory, ErrorCode, FloorError, FloorResult};

use crate::{logging, metrics};

/// Response envelope
#[derive(Debug, Serialize)]
pub struct ApiBody<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Successful response carrying `data`
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        let body = ApiBody {
            success: true,
            data: Some(self.0),
            error: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

/// Failed response carrying the error code and a client-safe message
#[derive(Debug)]
pub struct ApiError(pub FloorError);

impl From<FloorError> for ApiError {
    fn from(err: FloorError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body: ApiBody<()> = ApiBody {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.0.code(),
                message: self.0.client_message(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiJson<T>, ApiError>;

/// JSON request body whose rejections use the error envelope
#[derive(Debug)]
pub struct ApiRequest<T>(pub T);

impl<T, S> FromRequest<S> for ApiRequest<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError(FloorError::Validation(e.body_text())))?;
        Ok(ApiRequest(value))
    }
}

/// HTTP status for an error, by category
pub fn status_for(err: &FloorError) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::StateConflict => StatusCode::CONFLICT,
        ErrorCategory::Authorization => match err {
            FloorError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        },
        ErrorCategory::Compliance => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Resource => StatusCode::NOT_FOUND,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn outcome_label(code: ErrorCode) -> String {
    serde_json::to_value(code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_lowercase))
        .unwrap_or_else(|| "error".to_string())
}

/// Run one floor operation, recording its outcome and duration
pub async fn timed<T, F>(operation: &'static str, call: F) -> ApiResult<T>
where
    F: Future<Output = FloorResult<T>>,
{
    let start = Instant::now();
    let result = call.await;
    let elapsed = start.elapsed();

    let outcome = match &result {
        Ok(_) => "ok".to_string(),
        Err(e) => outcome_label(e.code()),
    };
    metrics::floor_operation(operation, &outcome, elapsed.as_secs_f64() * 1000.0);
    logging::log_performance(operation, elapsed.as_millis() as u64);

    if let Err(FloorError::InsufficientRole { required, actual }) = &result {
        tracing::warn!(operation, %required, %actual, "Operation refused for role");
    }

    result.map(ApiJson).map_err(ApiError)
}
