use axum::extract::{Json, State};
use serde::Serialize;

use crate::{AppState, error::AppError};

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_connected: bool,
}

pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to CarbonCity Insights API!",
    })
}

/// Lists the tables of the schema the pool runs against.
#[axum::debug_handler]
pub async fn db_test(State(state): State<AppState>) -> Result<Json<TablesResponse>, AppError> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1 ORDER BY table_name",
    )
    .bind(state.config.db_schema())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(TablesResponse { tables }))
}

/// Always 200: a missing store only degrades rate limiting and caching.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: store unreachable: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if store_connected { "healthy" } else { "degraded" },
        store_connected,
    })
}
