pub mod certificates;
pub mod health;
pub mod portfolio;

use axum::{
    extract::{DefaultBodyLimit, FromRequest},
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::errors::AppError;
use crate::state::AppState;
use crate::uploads::UPLOADS_URL_PREFIX;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// `Json` extractor whose rejections render as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.certificates.max_bytes() + MULTIPART_OVERHEAD_BYTES;
    let uploads = ServeDir::new(state.certificates.dir());

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/portfolio", post(portfolio::handle_save_portfolio))
        .route("/api/portfolio/:id", get(portfolio::handle_get_portfolio))
        .route("/api/portfolios", get(portfolio::handle_list_portfolios))
        .route(
            "/api/upload-certificate",
            post(certificates::handle_upload_certificate)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/certificate/:filename",
            get(certificates::handle_download_certificate),
        )
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::test_support::{body_json, TestApp};

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new(1024);
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "folio-api");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new(1024);
        assert_eq!(app.get("/api/nope").await.status(), StatusCode::NOT_FOUND);
    }
}
