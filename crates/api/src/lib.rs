pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    // Generic CRUD + list for every registered resource
    let resource_routes = Router::new()
        .route("/get-all", post(routes::resource::get_all))
        .route("/add", post(routes::resource::add))
        .route("/insert-many", post(routes::resource::insert_many))
        .route("/update-multiple", put(routes::resource::update_multiple))
        .route("/delete-multiple", post(routes::resource::delete_multiple))
        .route(
            "/{id}",
            get(routes::resource::get_by_id)
                .put(routes::resource::update)
                .delete(routes::resource::delete),
        );

    // Task lists, checklist edits and reports
    let task_routes = Router::new()
        .route("/get-all", post(routes::task::get_all))
        .route("/get-all-by-user", post(routes::task::get_all_by_user))
        .route("/add-list", post(routes::task::add_list))
        .route("/add-list-by-user", post(routes::task::add_list_by_user))
        .route("/update-list", put(routes::task::update_list))
        .route("/update-multiple-list", put(routes::task::update_multiple_list))
        .route("/delete-list/{task_id}/{id}", delete(routes::task::delete_list))
        .route(
            "/get-user-task-report-by-admin",
            post(routes::task::report_by_admin),
        )
        .route(
            "/get-user-task-report-by-user",
            post(routes::task::report_by_user),
        );

    let api = Router::new()
        .nest("/resource/{kind}", resource_routes)
        .nest("/task", task_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
