//! Failure kinds the poll loop cares to tell apart.

use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The gateway rejected the credentials or the cached session.
    #[error("{service} rejected the credentials ({status})")]
    Auth { service: &'static str, status: StatusCode },

    #[error("{service} is unreachable")]
    Unreachable {
        service: &'static str,

        #[source]
        source: reqwest::Error,
    },

    #[error("{service} responded with {status}")]
    UnexpectedStatus { service: &'static str, status: StatusCode },

    #[error("{service} returned a malformed response")]
    MalformedResponse {
        service: &'static str,

        #[source]
        source: reqwest::Error,
    },

    #[error("weather is unavailable: {0}")]
    WeatherUnavailable(String),

    #[error("metric API responded with {status}: {body}")]
    Publish { status: StatusCode, body: String },

    #[error("{service} says too many requests")]
    RateLimited { service: &'static str },

    #[error("metric `{name}` is not finite")]
    NonFiniteMetric { name: String },

    #[error("failed to assemble the snapshot")]
    Assembly(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Classify a non-successful HTTP status coming from one of the polled services.
    pub fn from_status(service: &'static str, status: StatusCode) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { service },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth { service, status },
            _ => Self::UnexpectedStatus { service, status },
        }
    }

    /// Whether another attempt has a chance to succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. }
            | Self::MalformedResponse { .. }
            | Self::WeatherUnavailable(_) => true,
            Self::UnexpectedStatus { status, .. } => status.is_server_error(),
            Self::Auth { .. }
            | Self::Publish { .. }
            | Self::RateLimited { .. }
            | Self::NonFiniteMetric { .. }
            | Self::Assembly(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Publish { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }
}
