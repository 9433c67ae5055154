//! HTTP front end for a translated schema.
//!
//! Endpoints:
//! - `POST /graphql` executes a GraphQL request
//! - `GET /schema` returns the schema in SDL
//! - `GET /health` liveness check

use async_graphql::{Request, Response};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use oasgraph_core::ServerConfig;
use oasgraph_openapi::{AuthState, Schema};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

#[derive(Clone)]
pub struct AppState {
    pub schema: Schema,
    /// Credentials attached to every GraphQL request
    pub auth: Arc<AuthState>,
}

pub fn create_router(schema: Schema, auth: AuthState) -> Router {
    let state = AppState {
        schema,
        auth: Arc::new(auth),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/schema", get(print_schema))
        .route("/graphql", post(graphql_handler))
        // Middleware layers (applied in reverse order)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind to the configured address and serve `router` until the process
/// stops.
pub async fn serve(config: &ServerConfig, router: Router) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("GraphQL endpoint listening on http://{}/graphql", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

/// Health check endpoint - returns OK if the service is running
async fn health_check() -> impl IntoResponse {
    tracing::debug!("Health check requested");
    (StatusCode::OK, "OK")
}

async fn print_schema(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.schema.sdl())
}

async fn graphql_handler(
    State(state): State<AppState>,
    Json(request): Json<Request>,
) -> Json<Response> {
    let mut request = request;
    if !state.auth.is_empty() {
        request = request.data(state.auth.as_ref().clone());
    }
    Json(state.schema.execute(request).await)
}
