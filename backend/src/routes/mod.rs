//! Route definitions for the Broiler Cycle Ledger API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - farmers and their feed reserve
        .nest("/farmers", farmer_routes(state.clone()))
        // Protected routes - active cycles
        .nest("/cycles", cycle_routes(state.clone()))
        // Protected routes - archived cycles
        .nest("/histories", history_routes(state.clone()))
        // Protected routes - sales and report versions
        .nest("/sales", sale_routes(state))
}

/// Farmer routes (protected)
fn farmer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_farmer))
        .route("/:farmer_id", get(handlers::get_farmer))
        .route("/:farmer_id/restock", post(handlers::restock_farmer))
        .route("/:farmer_id/archive", post(handlers::archive_farmer))
        .route("/:farmer_id/stock-logs", get(handlers::list_stock_logs))
        .route("/:farmer_id/sales", get(handlers::list_farmer_sales))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Cycle routes (protected)
fn cycle_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cycles).post(handlers::create_cycle))
        .route("/sync-feed", post(handlers::sync_feed))
        .route("/:id", get(handlers::get_cycle))
        .route("/:id/mortality", post(handlers::add_mortality))
        .route("/:id/notes", post(handlers::add_note))
        .route("/:id/end", post(handlers::end_cycle))
        .route("/:id/doc", put(handlers::correct_doc))
        .route("/:id/sales", get(handlers::list_cycle_sales))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Archived cycle routes (protected)
fn history_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:history_id", delete(handlers::delete_history))
        .route("/:history_id/reopen", post(handlers::reopen_cycle))
        .route("/:history_id/sales", get(handlers::list_history_sales))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_sale_event))
        .route(
            "/:sale_event_id/reports",
            get(handlers::list_sale_reports).post(handlers::generate_sale_report),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
