use std::time::Duration;

use thiserror::Error;

/// Uniform failure value of a single gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("malformed response: {message}")]
    Decode { message: String },
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid input: {0}")]
    Validation(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
