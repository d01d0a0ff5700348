use crate::controller::{
    driver_controller, health_check_controller, token_controller, vehicle_controller,
};
use crate::{sse, ws, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

pub fn define_routes(app_state: AppState) -> Router {
    let static_dir = app_state.config.static_dir().clone();

    Router::new()
        .merge(health_routes())
        .merge(driver_routes(app_state.clone()))
        .merge(token_routes(app_state.clone()))
        .merge(vehicle_routes(app_state.clone()))
        .merge(subscriber_routes(app_state))
        .fallback_service(static_routes(&static_dir))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// One-shot updates for devices that cannot hold a socket open
fn driver_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/driver/update", post(driver_controller::update))
        .with_state(app_state)
}

fn token_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/gen-token", get(token_controller::generate))
        .with_state(app_state)
}

fn vehicle_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/buses", get(vehicle_controller::index))
        .with_state(app_state)
}

/// Long-lived connections: WebSocket for drivers and commuters, SSE for receive-only commuters
fn subscriber_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handler::ws_handler))
        .route("/sse", get(sse::handler::sse_handler))
        .with_state(app_state)
}

// Serves the driver and commuter pages for every path no route matched
pub fn static_routes(dir: &Path) -> ServeDir {
    ServeDir::new(dir)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, test_app};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unmatched_paths_fall_back_to_static_files() {
        let t = test_app();

        let response = crate::app(t.state.clone())
            .oneshot(get("/commuter.html"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>commuter</h1>");
    }

    #[tokio::test]
    async fn missing_static_file_is_not_found() {
        let t = test_app();

        let response = crate::app(t.state.clone())
            .oneshot(get("/nope.html"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sse_subscription_joins_the_requested_route() {
        let t = test_app();

        let response = crate::app(t.state.clone())
            .oneshot(get("/sse?routeId=route-4"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );
        assert_eq!(t.state.broadcast.route_members("route-4"), 1);

        drop(response);
        assert_eq!(t.state.broadcast.connection_count(), 0);
    }

    #[test]
    fn commuter_page_renders_driver_fields_as_text() {
        let page = include_str!("../../public/commuter.html");

        assert!(!page.contains("innerHTML"));
        assert!(page.contains("textContent"));
    }
}
