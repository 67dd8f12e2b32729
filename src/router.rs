use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors, rate_limit},
    routes,
};

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(routes::service::root))
        .route("/db_test", get(routes::service::db_test))
        .route("/health", get(routes::service::health))
        .route(
            "/register",
            get(routes::pages::register_page).post(routes::user::register),
        )
        .route(
            "/login",
            get(routes::pages::login_page).post(routes::user::login),
        );

    // Each route keeps its own counter, keyed by its path.
    let limited_routes = Router::new()
        .route(
            "/vehicle_emissions",
            get(routes::vehicle::list_vehicle_emissions),
        )
        .route(
            "/vehicle_emissions/compare",
            post(routes::vehicle::compare_vehicle_emissions),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    // Auth runs first so the limiter always sees a verified identity.
    let protected_routes = Router::new()
        .route(
            "/protected-endpoint",
            get(routes::user::protected_endpoint),
        )
        .merge(limited_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(log_errors)),
        );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding permissive CORS layer for development");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
