//! Error types for the sheets_client crate.

use thiserror::Error;

/// Errors that can occur when talking to the Drive and Sheets APIs.
#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// The resumable upload could not be started; `body` holds the server response.
    #[error("Failed to initialize upload ({reason}): {body}")]
    UploadInitFailed { reason: String, body: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl SheetsError {
    /// HTTP status carried by an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SheetsError::ApiError { status, .. } => Some(*status),
            SheetsError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the server answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type alias for SheetsError.
pub type Result<T> = std::result::Result<T, SheetsError>;
