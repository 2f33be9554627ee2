use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The server answered with `{ success: false, error }`.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}
