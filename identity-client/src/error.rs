use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("re-authentication required, log in again")]
    ReauthenticationRequired,

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    details: Option<String>,
}

impl ClientError {
    /// Maps a non-success response to the caller-facing taxonomy.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                details: Some(details),
                ..
            }) => details,
            Ok(ErrorBody { error, .. }) => error,
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => body.to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthenticated(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::AlreadyExists(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::ValidationFailed(message)
            }
            s if s.is_server_error() => ClientError::UpstreamUnavailable(message),
            s => ClientError::Unexpected(anyhow::anyhow!("unexpected status {}: {}", s, message)),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ClientError::UpstreamUnavailable(err.to_string())
        } else {
            ClientError::Unexpected(anyhow::Error::new(err))
        }
    }
}
