//! HTTP front end: `POST /validate` behind an API key, `GET /health`.

mod config;
mod handlers;

pub use config::{ConfigError, LogConfig, ServerConfig};
pub use handlers::{ApiError, ApiKey, AppState, ValidateRequest, ValidateResponse};

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::mx::LookupMx;
use crate::smtp_verify::Connector;

/// Build the application router.
pub fn router<R, C>(state: Arc<AppState<R, C>>, config: &ServerConfig) -> Router
where
    R: LookupMx + 'static,
    C: Connector + 'static,
{
    let protected = Router::new()
        .route("/validate", post(handlers::validate::<R, C>))
        .route_layer(middleware::from_fn_with_state(
            ApiKey::new(&config.api_key),
            handlers::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(handlers::API_KEY_HEADER)])
        .allow_credentials(true)
}

/// Serve until Ctrl-C.
pub async fn serve<R, C>(
    listener: TcpListener,
    state: Arc<AppState<R, C>>,
    config: &ServerConfig,
) -> std::io::Result<()>
where
    R: LookupMx + 'static,
    C: Connector + 'static,
{
    info!(addr = %listener.local_addr()?, "validation service listening");
    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests;
