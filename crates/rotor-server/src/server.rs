use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rotor_auth::{
    InMemorySessionStore, SessionState, SessionStore, TokenService,
    http::{issue_handler, refresh_handler, whoami_handler},
};
use rotor_auth_postgres::PostgresSessionStore;
use serde_json::json;
use tower::{BoxError, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, StorageBackend};

pub struct RotorServer {
    addr: SocketAddr,
    app: Router,
}

/// Opens the configured session store and wires the token service over it.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<SessionState> {
    let store: Arc<dyn SessionStore> = match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .storage
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.postgres is not configured"))?;
            let settings = pg.pool_settings().map_err(anyhow::Error::msg)?;
            let store = PostgresSessionStore::connect_with(&settings).await?;
            store.ensure_schema().await?;
            tracing::info!("PostgreSQL session store ready");
            Arc::new(store)
        }
    };

    let service = TokenService::from_config(&cfg.auth, store)?;
    Ok(SessionState::new(Arc::new(service)))
}

pub fn build_app(cfg: &AppConfig, state: SessionState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let request_timeout = cfg.request_timeout();
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/session/{subject_id}", get(issue_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/whoami", get(whoami_handler))
        .with_state(state)
        // Middleware stack (order: cors -> trace -> timeout -> body limit)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CorsLayer::permissive())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn handle_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "error": "request_timeout",
                "error_description": "The request took too long to complete",
            })),
        )
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "server_error",
                "error_description": "The server encountered an internal error",
            })),
        )
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<RotorServer> {
        let state = build_state(&self.config).await?;
        let app = build_app(&self.config, state);

        Ok(RotorServer {
            addr: self.addr,
            app,
        })
    }
}

impl RotorServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
