use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET health check used by load balancers and deploy scripts
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
