use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mx::LookupMx;
use crate::smtp_verify::Connector;
use crate::verify::{Reason, Verifier};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state of the HTTP handlers.
pub struct AppState<R, C> {
    pub verifier: Verifier<R, C>,
}

/// Key expected in `X-API-KEY`.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    fn matches(&self, presented: &str) -> bool {
        !self.0.is_empty() && *self.0 == *presented
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub email: String,
    pub is_valid: bool,
    pub reason: Reason,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    fn respond(status: StatusCode, message: &str) -> Response {
        (status, Json(Self::new(message))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct RouteNotFound {
    status: &'static str,
    message: &'static str,
}

pub async fn require_api_key(State(key): State<ApiKey>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| key.matches(value));
    if authorized {
        return next.run(req).await;
    }
    warn!(path = %req.uri().path(), "rejected request without a valid API key");
    ApiError::respond(
        StatusCode::UNAUTHORIZED,
        "Unauthorized: Missing or invalid API key",
    )
}

pub async fn validate<R, C>(
    State(state): State<Arc<AppState<R, C>>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Response
where
    R: LookupMx + 'static,
    C: Connector + 'static,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable validation request");
            return ApiError::respond(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };
    let email = match request.email {
        Some(email) if !email.is_empty() => email,
        _ => return ApiError::respond(StatusCode::BAD_REQUEST, "Email is required"),
    };

    info!(email = %email, "received validation request");
    let verdict = state.verifier.verify(&email).await;
    Json(ValidateResponse {
        email,
        is_valid: verdict.valid(),
        reason: verdict.reason(),
    })
    .into_response()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(RouteNotFound {
            status: "error",
            message: "Route not found. Use the /validate endpoint with a POST request.",
        }),
    )
        .into_response()
}
