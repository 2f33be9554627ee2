//! Typed HTTP client for the Folio API. Every other client module goes through it.

use std::collections::BTreeMap;
use std::time::Duration;

use folio_api::models::portfolio::Portfolio;
use reqwest::{multipart, Client, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::error::ClientError;

/// Fixed timeout for a single certificate upload attempt.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct SaveReply {
    pub id: String,
    pub portfolio: Portfolio,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadReply {
    pub url: String,
    pub filename: String,
}

#[derive(Deserialize)]
struct PortfolioReply {
    portfolio: Portfolio,
}

#[derive(Deserialize)]
struct ListReply {
    portfolios: BTreeMap<String, Portfolio>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    /// Server origin, e.g. `http://localhost:5000`. API routes live under `/api`.
    server_url: String,
    base: Url,
}

impl ApiClient {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ClientError> {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&server_url)
            .map_err(|e| ClientError::Validation(format!("Invalid server URL {server_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "Invalid server URL {server_url}"
            )));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            server_url,
            base,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Absolute URL for a server-relative path such as a certificate's `/uploads/..` url.
    pub fn asset_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.server_url, path.trim_start_matches('/'))
        }
    }

    /// `<server>/api/<segments..>`, each segment percent-encoded.
    fn api(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    /// POST /api/portfolio with the full record; `portfolio.id` selects create vs. replace.
    pub async fn save(&self, portfolio: &Portfolio) -> Result<SaveReply, ClientError> {
        let response = self
            .http
            .post(self.api(&["portfolio"]))
            .json(portfolio)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn fetch(&self, id: &str) -> Result<Portfolio, ClientError> {
        let response = self
            .http
            .get(self.api(&["portfolio", id]))
            .send()
            .await?;
        Ok(decode::<PortfolioReply>(response).await?.portfolio)
    }

    pub async fn list(&self) -> Result<BTreeMap<String, Portfolio>, ClientError> {
        let response = self.http.get(self.api(&["portfolios"])).send().await?;
        Ok(decode::<ListReply>(response).await?.portfolios)
    }

    /// Single attempt, bounded by `UPLOAD_TIMEOUT`. No retries.
    pub async fn upload_certificate(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReply, ClientError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("certificate", part);

        let response = self
            .http
            .post(self.api(&["upload-certificate"]))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn download_certificate(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .http
            .get(self.api(&["certificate", filename]))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turns a non-2xx reply into `ClientError::Api`, preferring the server's `error` message.
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorReply>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("Request failed with status {status}"));
    debug!(status = status.as_u16(), %message, "API call failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestServer;

    #[test]
    fn test_asset_url_joins_relative_paths() {
        let api = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(
            api.asset_url("/uploads/a.png"),
            "http://localhost:5000/uploads/a.png"
        );
        assert_eq!(
            api.asset_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            api.api(&["portfolios"]).as_str(),
            "http://localhost:5000/api/portfolios"
        );
    }

    #[test]
    fn test_path_segments_are_percent_encoded() {
        let api = ApiClient::new("http://localhost:5000").unwrap();
        assert_eq!(
            api.api(&["portfolio", "a?b"]).as_str(),
            "http://localhost:5000/api/portfolio/a%3Fb"
        );
        assert_eq!(
            api.api(&["certificate", "x#1 y.png"]).as_str(),
            "http://localhost:5000/api/certificate/x%231%20y.png"
        );

        let nested = ApiClient::new("http://localhost:5000/folio/").unwrap();
        assert_eq!(
            nested.api(&["portfolios"]).as_str(),
            "http://localhost:5000/folio/api/portfolios"
        );
    }

    #[test]
    fn test_invalid_server_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_ids_with_reserved_characters() {
        let server = TestServer::spawn().await;
        for id in ["a?b", "x#1", "with space"] {
            let saved = server
                .api
                .save(&Portfolio {
                    id: Some(id.to_string()),
                    summary: format!("record {id}"),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(saved.id, id);

            let fetched = server.api.fetch(id).await.unwrap();
            assert_eq!(fetched.id.as_deref(), Some(id));
            assert_eq!(fetched.summary, format!("record {id}"));
        }
    }
}
