use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::config::STATIC_ASSETS_DIR;
use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .nest_service("/assets", ServeDir::new(STATIC_ASSETS_DIR))
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route("/", get(routes::pages::dashboard_page))
        .route("/team", get(routes::pages::team_page))
        .route("/api/dashboard", get(routes::api::get_dashboard))
        .route("/api/team", get(routes::api::get_team))
        .route("/api/events", get(routes::sse::board_events))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    let asset = path.strip_prefix("/assets/")?;
    let ext = Path::new(asset).extension().and_then(|ext| ext.to_str())?;

    match ext {
        "css" | "js" => Some("public, max-age=3600"),
        "png" | "jpg" | "jpeg" | "svg" | "webp" | "ico" | "woff2" => Some("public, max-age=86400"),
        _ => None,
    }
}
