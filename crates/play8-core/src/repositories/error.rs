use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}")]
    Status { status: u16 },

    /// The backend refused the request until the user signs in (HTTP 403).
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },
}

impl ApiError {
    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16) -> Self {
        if status == 403 {
            ApiError::AuthenticationRequired
        } else {
            ApiError::Status { status }
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::Unavailable {
            message: message.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
