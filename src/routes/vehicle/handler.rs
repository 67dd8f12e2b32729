use axum::extract::{Json, Query, State};

use crate::{
    AppState,
    cache::keys::{vehicle_compare_key, vehicle_emissions_key},
    error::AppError,
};

use super::model::{CompareRequest, CompareResponse, EmissionsPage, ListQuery, VehicleEmission};

#[axum::debug_handler]
pub async fn list_vehicle_emissions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EmissionsPage>, AppError> {
    let page_size = query.page_size();
    let key = vehicle_emissions_key(
        query.vehicle_make_name.as_deref(),
        query.vehicle_model_name.as_deref(),
        query.year,
        query.cursor,
        page_size,
    );

    if let Some(page) = state.cache.get::<EmissionsPage>(&key).await {
        return Ok(Json(page));
    }

    let rows = VehicleEmission::list(&state.pool, &query).await?;
    let page = EmissionsPage::from_rows(rows, page_size);
    state.cache.set(&key, &page).await;

    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn compare_vehicle_emissions(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    let key = vehicle_compare_key(req.vehicle_1.as_key_parts(), req.vehicle_2.as_key_parts());

    if let Some(response) = state.cache.get::<CompareResponse>(&key).await {
        return Ok(Json(response));
    }

    let vehicle_1 = VehicleEmission::find_one(&state.pool, &req.vehicle_1)
        .await?
        .ok_or_else(|| not_found("vehicle_1"))?;
    let vehicle_2 = VehicleEmission::find_one(&state.pool, &req.vehicle_2)
        .await?
        .ok_or_else(|| not_found("vehicle_2"))?;

    let response = CompareResponse::new(vehicle_1, vehicle_2);
    state.cache.set(&key, &response).await;

    Ok(Json(response))
}

fn not_found(which: &str) -> AppError {
    AppError::NotFound(format!("No emissions data found for {}.", which))
}
