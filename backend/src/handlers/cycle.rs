//! Cycle lifecycle HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::cycle::{
    AddMortalityInput, AddNoteInput, CorrectDocInput, CreateCycleInput, CycleService, EndCycleInput,
};
use crate::services::feed::FeedService;
use crate::services::sale::{SaleFilter, SaleService};
use crate::AppState;

fn cycle_service(state: &AppState) -> CycleService {
    CycleService::new(state.db.clone(), state.pricing())
}

/// Start a cycle
pub async fn create_cycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateCycleInput>,
) -> impl IntoResponse {
    match cycle_service(&state).create(&user, input).await {
        Ok(cycle) => (StatusCode::CREATED, Json(cycle)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Active cycles the current user manages
pub async fn list_cycles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    match cycle_service(&state).list_active(&user).await {
        Ok(cycles) => (StatusCode::OK, Json(serde_json::json!({ "cycles": cycles }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Bring ages and feed intake of managed cycles up to today
pub async fn sync_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    let service = FeedService::new(state.db.clone(), state.pricing());

    match service.sync_feed(&user).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Details of an active or archived cycle
pub async fn get_cycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match cycle_service(&state).get_cycle_details(&user, id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record dead birds
pub async fn add_mortality(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cycle_id): Path<Uuid>,
    Json(input): Json<AddMortalityInput>,
) -> impl IntoResponse {
    match cycle_service(&state).add_mortality(&user, cycle_id, input).await {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Attach a note to a cycle
pub async fn add_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<AddNoteInput>,
) -> impl IntoResponse {
    match cycle_service(&state).add_note(&user, id, input).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// End a cycle with the reported feed intake
pub async fn end_cycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cycle_id): Path<Uuid>,
    Json(input): Json<EndCycleInput>,
) -> impl IntoResponse {
    match cycle_service(&state)
        .end(&user, cycle_id, input, state.notifications())
        .await
    {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Correct the placed chick count
pub async fn correct_doc(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cycle_id): Path<Uuid>,
    Json(input): Json<CorrectDocInput>,
) -> impl IntoResponse {
    match cycle_service(&state).correct_doc(&user, cycle_id, input).await {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Sales of a cycle; the id may name an active or an archived cycle
pub async fn list_cycle_sales(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    let filter = match service.filter_for(id).await {
        Ok(filter) => filter,
        Err(e) => return e.into_response(),
    };

    match service.list_sale_events(&user, filter).await {
        Ok(sales) => (StatusCode::OK, Json(serde_json::json!({ "sales": sales }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Reopen an archived cycle
pub async fn reopen_cycle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(history_id): Path<Uuid>,
) -> impl IntoResponse {
    match cycle_service(&state).reopen(&user, history_id).await {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Delete an archived cycle
pub async fn delete_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(history_id): Path<Uuid>,
) -> impl IntoResponse {
    match cycle_service(&state).delete_history(&user, history_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Sales of an archived cycle
pub async fn list_history_sales(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(history_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = SaleService::new(state.db.clone(), state.pricing());

    match service
        .list_sale_events(&user, SaleFilter::History(history_id))
        .await
    {
        Ok(sales) => (StatusCode::OK, Json(serde_json::json!({ "sales": sales }))).into_response(),
        Err(e) => e.into_response(),
    }
}
