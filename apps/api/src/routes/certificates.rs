use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;
use crate::uploads::{content_type_for, UploadError};

/// Multipart field carrying the certificate image.
pub const CERTIFICATE_FIELD: &str = "certificate";

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
}

/// POST /api/upload-certificate
/// Stores the first `certificate` field; any further parts are ignored.
pub async fn handle_upload_certificate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max_bytes = state.certificates.max_bytes();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(CERTIFICATE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);

        let mut upload = state
            .certificates
            .begin(content_type.as_deref(), &original_name)
            .await
            .inspect_err(|e| warn!(%original_name, ?content_type, "Upload rejected: {e}"))?;

        // Returning early drops `upload`, which removes the partial file.
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            upload
                .write_chunk(&chunk)
                .await
                .inspect_err(|e| warn!(%original_name, "Upload rejected: {e}"))?;
        }

        let stored = upload.finish().await?;
        return Ok(Json(UploadResponse {
            success: true,
            url: stored.url,
            filename: stored.filename,
        }));
    }

    Err(UploadError::Missing.into())
}

/// GET /api/certificate/:filename
/// Streams the stored file as an attachment.
pub async fn handle_download_certificate(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let path = state
        .certificates
        .resolve(&filename)
        .await
        .ok_or_else(|| AppError::NotFound("Certificate not found".to_string()))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::Upload(UploadError::Io(e)))?;

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename.replace('"', "_")),
        ),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// The body limit only trips past the configured file size, so it reports as too large.
fn multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    warn!("Upload error: {e}");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { max_bytes }.into()
    } else {
        UploadError::Malformed.into()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tokio::io::AsyncWriteExt;
    use tokio_util::io::ReaderStream;
    use tower::ServiceExt;

    use crate::routes::test_support::{body_bytes, body_json, TestApp, BOUNDARY};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    #[tokio::test]
    async fn test_upload_then_download() {
        let app = TestApp::new(1024);

        let response = app
            .upload("certificate", "aws cert.png", "image/png", PNG_BYTES)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let filename = body["filename"].as_str().unwrap().to_string();
        assert!(filename.ends_with("-aws_cert.png"));
        assert_eq!(body["url"], format!("/uploads/{filename}"));

        let response = app.get(&format!("/api/certificate/{filename}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment"));
        assert_eq!(body_bytes(response).await, PNG_BYTES);
    }

    #[tokio::test]
    async fn test_uploaded_file_is_served_statically() {
        let app = TestApp::new(1024);
        let body = body_json(app.upload("certificate", "c.gif", "image/gif", b"GIF89a").await).await;

        let response = app.get(body["url"].as_str().unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"GIF89a");
    }

    #[tokio::test]
    async fn test_disallowed_type_is_rejected_and_not_stored() {
        let app = TestApp::new(1024);
        let response = app
            .upload("certificate", "cert.pdf", "application/pdf", b"%PDF-1.4")
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Only image files are allowed!");
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_extension_is_rejected() {
        let app = TestApp::new(1024);
        let response = app
            .upload("certificate", "script.svg", "image/png", b"<svg/>")
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_not_stored() {
        let app = TestApp::new(1024);
        let response = app
            .upload("certificate", "big.png", "image/png", &vec![7u8; 4096])
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("File too large"));
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_missing_certificate_field_is_400() {
        let app = TestApp::new(1024);
        let response = app.upload("other", "c.png", "image/png", PNG_BYTES).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_download_unknown_or_traversal_is_404() {
        let app = TestApp::new(1024);
        let response = app.get("/api/certificate/missing.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Certificate not found");

        let response = app.get("/api/certificate/..%2Fsecret.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disconnect_mid_upload_leaves_nothing_behind() {
        let app = TestApp::new(1024 * 1024);

        // Headers and a first chunk arrive, then the client goes quiet.
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let head = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"certificate\"; filename=\"c.png\"\r\nContent-Type: image/png\r\n\r\n"
        );
        client.write_all(head.as_bytes()).await.unwrap();
        client.write_all(&[7u8; 4096]).await.unwrap();

        let request = Request::post("/api/upload-certificate")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from_stream(ReaderStream::new(server)))
            .unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            app.router.clone().oneshot(request),
        )
        .await;
        assert!(outcome.is_err(), "request should still be waiting for data");

        assert_eq!(app.stored_files(), 0);
        drop(client);
    }
}
