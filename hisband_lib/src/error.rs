//! Error types for the Supabase client bootstrap.

use thiserror::Error;

/// Base error type for hisband operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Raised while building a client from credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("supabase url is required")]
    MissingUrl,

    #[error("invalid supabase url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("supabase key is required")]
    MissingKey,

    #[error("supabase key is not a valid header value")]
    InvalidKey,

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Raised when the service rejects the API key.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

/// Raised when the API returns an error response.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status_code: Option<u16>,
    pub response_data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(
        message: impl Into<String>,
        status_code: Option<u16>,
        response_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            message: message.into(),
            status_code,
            response_data,
        }
    }
}
