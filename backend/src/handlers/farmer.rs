//! Farmer HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::farmer::{CreateFarmerInput, FarmerService, RestockInput};
use crate::services::sale::{SaleFilter, SaleService};
use crate::AppState;

/// Register a farmer
pub async fn create_farmer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateFarmerInput>,
) -> impl IntoResponse {
    let service = FarmerService::new(state.db.clone());

    match service.create(&user, input).await {
        Ok(farmer) => (StatusCode::CREATED, Json(farmer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a farmer with its stock counters
pub async fn get_farmer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = FarmerService::new(state.db.clone());

    match service.get(&user, farmer_id).await {
        Ok(farmer) => (StatusCode::OK, Json(farmer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Add feed bags to a farmer's reserve
pub async fn restock_farmer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
    Json(input): Json<RestockInput>,
) -> impl IntoResponse {
    let service = FarmerService::new(state.db.clone());

    match service.restock(&user, farmer_id, input).await {
        Ok(stock) => (StatusCode::OK, Json(stock)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Archive a farmer
pub async fn archive_farmer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = FarmerService::new(state.db.clone());

    match service.archive(&user, farmer_id).await {
        Ok(farmer) => (StatusCode::OK, Json(farmer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Stock ledger of a farmer
pub async fn list_stock_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = FarmerService::new(state.db.clone());

    match service.stock_logs(&user, farmer_id).await {
        Ok(logs) => (StatusCode::OK, Json(serde_json::json!({ "logs": logs }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Every sale of a farmer across cycles
pub async fn list_farmer_sales(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    match service.list_sale_events(&user, SaleFilter::Farmer(farmer_id)).await {
        Ok(sales) => (StatusCode::OK, Json(serde_json::json!({ "sales": sales }))).into_response(),
        Err(e) => e.into_response(),
    }
}
