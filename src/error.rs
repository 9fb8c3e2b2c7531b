use reqwest::StatusCode;

use crate::geolocation::LocationError;

const GENERIC_NETWORK_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally, before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(#[from] LocationError),

    #[error("{message}")]
    Network {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn server(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Permission(e) => e.to_string(),
            Self::Network { message, .. } if !message.is_empty() => message.clone(),
            Self::Network { .. } | Self::Decode(_) => GENERIC_NETWORK_MESSAGE.to_string(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Whether repeating the same call could succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status, .. } => match status {
                None => true,
                Some(s) => s.is_server_error() || *s == StatusCode::REQUEST_TIMEOUT,
            },
            Self::Permission(e) => e.is_transient(),
            Self::Decode(_) => true,
            Self::Validation(_) | Self::Io(_) => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Network {
                status: Some(StatusCode::UNAUTHORIZED),
                ..
            }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        tracing::debug!("Transport error: {}", e);
        Self::Network {
            status: e.status(),
            message: String::new(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
