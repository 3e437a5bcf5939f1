mod handlers;
pub mod middleware;

pub use handlers::{
    CompleteTaskRequest, NextTaskRequest, NextTaskResponse, ResearchRequest, TemplateSummary,
    WorkItemRequest, WorkItemResponse,
};

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::coordinator::Coordinator;
use middleware::ApiAuth;

pub fn create_router(coordinator: Coordinator) -> Router {
    create_router_with_auth(coordinator, ApiAuth::disabled())
}

pub fn create_router_with_auth(coordinator: Coordinator, auth: ApiAuth) -> Router {
    let api = Router::new()
        // Project
        .route("/status", get(handlers::get_status))
        .route("/state", put(handlers::update_state))
        .route("/templates", get(handlers::list_templates))
        // Tasks
        .route("/tasks/next", post(handlers::next_task))
        .route("/tasks/complete", post(handlers::complete_task))
        .route("/tasks/research", post(handlers::create_research_task))
        // Work items
        .route("/bugs", post(handlers::add_bug))
        .route("/features", post(handlers::add_feature))
        .route("/work-items", get(handlers::list_work_items))
        .route_layer(from_fn_with_state(auth, middleware::auth_middleware))
        // Health stays open for probes
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(coordinator)
}
