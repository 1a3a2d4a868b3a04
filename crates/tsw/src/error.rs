//! Errors returned by the TSW client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::response::ErrorResponse;

/// Errors that can occur while talking to the TSW API.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument (header name, header value, ...) is invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request path could not be resolved against the base URL.
    #[error("Parse URL {path:?}: {source}")]
    UrlParse {
        path: String,
        #[source]
        source: url::ParseError,
    },

    /// The request body could not be serialized to JSON.
    #[error("Encode body: {0}")]
    Encoding(#[source] serde_json::Error),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The cancellation token fired while the call was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// Reading a body stream or writing to a byte sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API returned a status outside 200-299.
    #[error(transparent)]
    Api(#[from] ErrorResponse),

    /// A 2xx body could not be decoded into the expected shape.
    #[error("Decode response body: {0}")]
    Decoding(#[source] serde_json::Error),

    /// A 2xx envelope did not carry a `result`.
    #[error("Response envelope has no result")]
    MissingResult,

    /// API answered 2xx but the envelope reported `success: false`.
    #[error("{message}")]
    Application { message: String },
}

impl Error {
    /// HTTP status attached to this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(response) => Some(response.status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Whether this error came from the HTTP status layer rather than the
    /// envelope's `success` flag.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_displays_message() {
        let err = Error::Application {
            message: "service busy".into(),
        };
        assert_eq!(err.to_string(), "service busy");
        assert!(err.status().is_none());
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_url_parse_error_names_path() {
        let err = Error::UrlParse {
            path: "http://[::1".into(),
            source: url::ParseError::InvalidIpv6Address,
        };
        assert!(err.to_string().contains("http://[::1"));
    }
}
