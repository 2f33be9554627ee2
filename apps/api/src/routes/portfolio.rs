use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::portfolio::Portfolio;
use crate::routes::AppJson;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub id: String,
    pub portfolio: Portfolio,
}

#[derive(Serialize)]
pub struct PortfolioResponse {
    pub success: bool,
    pub portfolio: Portfolio,
}

#[derive(Serialize)]
pub struct PortfolioListResponse {
    pub success: bool,
    pub portfolios: BTreeMap<String, Portfolio>,
}

/// POST /api/portfolio
/// Creates a record when the payload has no id, otherwise replaces the record wholesale.
pub async fn handle_save_portfolio(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<Portfolio>,
) -> Result<Json<SaveResponse>, AppError> {
    let requested = payload.id.take();
    debug!(id = ?requested, "Saving portfolio");

    let portfolio = state.store.put(requested, payload).await?;
    let id = portfolio
        .id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("store returned a portfolio without an id"))?;

    info!(%id, "Portfolio saved");
    Ok(Json(SaveResponse {
        success: true,
        id,
        portfolio,
    }))
}

/// GET /api/portfolio/:id
pub async fn handle_get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let portfolio = state.store.get(&id).await?.ok_or_else(|| {
        info!(%id, "Portfolio not found");
        AppError::NotFound("Portfolio not found".to_string())
    })?;

    Ok(Json(PortfolioResponse {
        success: true,
        portfolio,
    }))
}

/// GET /api/portfolios
/// Administrative dump of the whole store. Unauthenticated.
pub async fn handle_list_portfolios(
    State(state): State<AppState>,
) -> Result<Json<PortfolioListResponse>, AppError> {
    let portfolios = state.store.list().await?;
    Ok(Json(PortfolioListResponse {
        success: true,
        portfolios,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{body_json, TestApp};

    #[tokio::test]
    async fn test_create_then_fetch_end_to_end() {
        let app = TestApp::new(1024);

        let response = app
            .post_json(
                "/api/portfolio",
                json!({ "personalInfo": { "fullName": "A", "email": "a@b.com" } }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(body["portfolio"]["id"], id.as_str());

        let response = app.get(&format!("/api/portfolio/{id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["portfolio"]["personalInfo"]["fullName"], "A");
        assert_eq!(body["portfolio"]["personalInfo"]["email"], "a@b.com");
        assert!(body["portfolio"]["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_keys_are_stored_verbatim() {
        let app = TestApp::new(1024);

        let body = body_json(
            app.post_json(
                "/api/portfolio",
                json!({
                    "personalInfo": { "fullName": "A", "title": "Dev" },
                    "theme": "dark",
                    "projects": [{ "name": "folio", "stars": 3 }]
                }),
            )
            .await,
        )
        .await;
        let id = body["id"].as_str().unwrap().to_string();

        let body = body_json(app.get(&format!("/api/portfolio/{id}")).await).await;
        let portfolio = &body["portfolio"];
        assert_eq!(portfolio["theme"], "dark");
        assert_eq!(portfolio["personalInfo"]["fullName"], "A");
        assert_eq!(portfolio["personalInfo"]["title"], "Dev");
        assert_eq!(portfolio["projects"][0]["stars"], 3);
    }

    #[tokio::test]
    async fn test_create_without_id_assigns_fresh_ids() {
        let app = TestApp::new(1024);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let body = body_json(app.post_json("/api/portfolio", json!({})).await).await;
            ids.push(body["id"].as_str().unwrap().to_string());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let app = TestApp::new(1024);
        let created = body_json(
            app.post_json(
                "/api/portfolio",
                json!({ "summary": "first", "skills": ["Rust", "Go"] }),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let updated = body_json(
            app.post_json("/api/portfolio", json!({ "id": id, "summary": "second" }))
                .await,
        )
        .await;
        assert_eq!(updated["id"], id);

        let fetched = body_json(app.get(&format!("/api/portfolio/{id}")).await).await;
        assert_eq!(fetched["portfolio"]["summary"], "second");
        assert_eq!(fetched["portfolio"]["skills"], json!([]));
    }

    #[tokio::test]
    async fn test_create_with_explicit_new_id() {
        let app = TestApp::new(1024);
        let body = body_json(
            app.post_json("/api/portfolio", json!({ "id": "custom-id" }))
                .await,
        )
        .await;
        assert_eq!(body["id"], "custom-id");
        assert_eq!(
            app.get("/api/portfolio/custom-id").await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_404() {
        let app = TestApp::new(1024);
        let response = app.get("/api/portfolio/does-not-exist").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Portfolio not found");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_400() {
        let app = TestApp::new(1024);
        let response = app
            .post_json("/api/portfolio", json!({ "skills": "not-a-list" }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_list_returns_every_record() {
        let app = TestApp::new(1024);
        let a = body_json(app.post_json("/api/portfolio", json!({ "summary": "a" })).await).await;
        let b = body_json(app.post_json("/api/portfolio", json!({ "summary": "b" })).await).await;

        let body = body_json(app.get("/api/portfolios").await).await;
        assert_eq!(body["success"], true);
        let all = body["portfolios"].as_object().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[a["id"].as_str().unwrap()]["summary"], "a");
        assert_eq!(all[b["id"].as_str().unwrap()]["summary"], "b");
    }
}
