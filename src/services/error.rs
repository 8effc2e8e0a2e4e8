//! Error taxonomy shared by the remote-service clients

use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Failure classes for calls against the archive and media-server APIs.
///
/// Only `Transient` failures are eligible for retry; everything else
/// propagates immediately.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    Validation(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }

    /// Classify a non-success HTTP status.
    ///
    /// 401/403 are credential problems, 404 is a vanished resource, 408/429
    /// and the 5xx range are worth retrying; any other 4xx is a hard API error.
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        let code = status.as_u16();
        match code {
            401 | 403 => ClientError::Auth {
                status: code,
                message,
            },
            404 => ClientError::NotFound(message),
            408 | 429 | 500..=599 => {
                ClientError::Transient(format!("status {code}: {message}"))
            }
            _ => ClientError::Api {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Validation(err.to_string())
        } else {
            // Connect failures, timeouts and resets all land here.
            ClientError::Transient(err.to_string())
        }
    }
}
