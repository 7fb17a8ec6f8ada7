//! Sale HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::sale::{CreateSaleEventInput, GenerateReportInput, SaleService};
use crate::AppState;

/// Record a sale
pub async fn create_sale_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateSaleEventInput>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    match service
        .create_sale_event(&user, input, state.notifications())
        .await
    {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Report versions of a sale, newest first
pub async fn list_sale_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_event_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    match service.get_sale_reports(&user, sale_event_id).await {
        Ok(reports) => {
            (StatusCode::OK, Json(serde_json::json!({ "reports": reports }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Append a corrected report version to a sale
pub async fn generate_sale_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_event_id): Path<Uuid>,
    Json(input): Json<GenerateReportInput>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    match service
        .generate_report(&user, sale_event_id, input, state.notifications())
        .await
    {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
