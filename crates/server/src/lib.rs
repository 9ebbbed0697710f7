//! HTTP surface of the Soberly chat backend: `POST /chat` and `GET /health`.

pub mod auth;
pub mod bootstrap;
pub mod chat;
pub mod health;

use std::time::Duration;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use soberly_core::config::{AppConfig, LoadOptions, LogFormat, ServerConfig};

use crate::bootstrap::Application;
use crate::chat::ChatState;

pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if server.allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }

    let origins = server
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    base.allow_origin(AllowOrigin::list(origins))
}

pub fn app(application: &Application) -> Router {
    let chat_state = ChatState {
        runtime: application.chat_runtime.clone(),
        identity: application.identity.clone(),
    };

    Router::new()
        .merge(chat::router(chat_state))
        .merge(health::router(application.db_pool.clone(), application.config.llm.model.clone()))
        .layer(cors_layer(&application.config.server))
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let application = bootstrap::bootstrap_with_config(config).await?;
    let address =
        format!("{}:{}", application.config.server.bind_address, application.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "soberly-server listening"
    );

    let grace = Duration::from_secs(application.config.server.graceful_shutdown_secs);
    axum::serve(listener, app(&application)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "soberly-server stopping"
    );
    if tokio::time::timeout(grace, application.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "database pool did not close within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use soberly_core::config::AppConfig;

    use super::cors_layer;

    #[tokio::test]
    async fn wildcard_origin_is_echoed_as_any() {
        let config = AppConfig::default();
        let app = Router::new().route("/ping", get(|| async { "pong" })).layer(cors_layer(&config.server));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("origin", "https://app.soberly.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").and_then(|value| value.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn listed_origins_reject_strangers() {
        let mut config = AppConfig::default();
        config.server.allowed_origins = vec!["https://app.soberly.example".to_string()];
        let app = Router::new().route("/ping", get(|| async { "pong" })).layer(cors_layer(&config.server));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("origin", "https://evil.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
