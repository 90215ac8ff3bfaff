//! Error types for the Picasa provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Picasa provider errors
#[derive(Error, Debug)]
pub enum PicasaError {
    /// The service rejected the token (HTTP 403)
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    /// API request returned an unexpected status
    #[error("Picasa API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Remote content no longer exists (HTTP 404)
    #[error("Remote content not found: {url}")]
    NotFound { url: String },

    /// A response could not be interpreted
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The entity lacks what the request needs, e.g. an edit URL
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Picasa operations
pub type Result<T> = std::result::Result<T, PicasaError>;

impl From<std::io::Error> for PicasaError {
    fn from(error: std::io::Error) -> Self {
        PicasaError::BridgeError(BridgeError::Io(error))
    }
}

impl From<PicasaError> for BridgeError {
    fn from(error: PicasaError) -> Self {
        match error {
            PicasaError::Unauthorized(msg) => BridgeError::Unauthorized(msg),
            PicasaError::ApiError {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            PicasaError::NotFound { url } => BridgeError::NotFound(url),
            PicasaError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            PicasaError::InvalidRequest(msg) => {
                BridgeError::OperationFailed(format!("Invalid request: {}", msg))
            }
            PicasaError::BridgeError(e) => e,
        }
    }
}
