use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::{AppState, middleware::log_errors, routes};

/// 页面路由与 JSON 接口，限流层由 main 按部署环境另行添加
pub fn create_router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(routes::pages::index))
        .route("/login", get(routes::pages::login))
        .route("/callback", get(routes::pages::callback))
        .route("/emails", get(routes::pages::emails))
        .route("/logout", get(routes::pages::logout));

    let api = Router::new().route(
        "/api/priorities/{priority}",
        get(routes::priority::list_by_priority),
    );

    Router::new()
        .merge(pages)
        .merge(api)
        .layer(middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
