//! Route definitions for the kitchen inventory API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/units", unit_routes())
        .nest("/products", product_routes())
        .nest("/deliveries", delivery_routes())
        .nest("/recipes", recipe_routes())
        .nest("/portions", portion_routes())
        .nest("/servings", serving_routes())
        .nest("/reports", report_routes())
        .nest("/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // WebSocket relay authenticates with ?token=
        .route("/ws", get(handlers::events_socket))
        .merge(protected)
}

fn unit_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_units).post(handlers::create_unit))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:id/quantity", get(handlers::get_product_quantity))
}

fn delivery_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_deliveries).post(handlers::record_delivery))
}

fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_recipes).post(handlers::create_recipe))
        .route(
            "/:id",
            get(handlers::get_recipe)
                .put(handlers::update_recipe)
                .delete(handlers::delete_recipe),
        )
        .route("/:id/possible-portions", get(handlers::get_possible_portions))
}

fn portion_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_portions))
        .route("/recalculate", post(handlers::recalculate_portions))
}

fn serving_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_servings).post(handlers::serve_meal))
        .route("/:id", get(handlers::get_serving))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_reports))
        .route("/generate", post(handlers::generate_report))
        .route("/generate-previous", post(handlers::generate_previous_month))
        .route("/analytics/consumption", get(handlers::consumption_totals))
        .route("/analytics/deliveries", get(handlers::delivery_trends))
        .route("/:id", get(handlers::get_report))
        .route("/:id/balances.csv", get(handlers::export_balances_csv))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/read-all", post(handlers::mark_all_read))
        .route("/:id/read", post(handlers::mark_notification_read))
}
