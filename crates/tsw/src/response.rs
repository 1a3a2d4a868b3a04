//! Response decoding: status classification, the error envelope and the
//! generic result envelope.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::error::Error;
use crate::models::null_default;
use crate::transport::{emit, RawResponse};

/// Message used when an error response carries no body.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Uniform wrapper around every JSON response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub validation_errors: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub metadata: ListMetadata,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Turn `success: false` into [`Error::Application`].
    ///
    /// # Errors
    /// Returns the envelope's message as an error when `success` is false.
    pub fn ensure_success(self) -> Result<Self, Error> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Application {
                message: self
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            })
        }
    }

    /// The `result`, after checking `success`.
    ///
    /// # Errors
    /// [`Error::Application`] if `success` is false, [`Error::MissingResult`]
    /// if there is no result.
    pub fn into_result(self) -> Result<T, Error> {
        self.ensure_success()?.result.ok_or(Error::MissingResult)
    }
}

/// Paging information attached to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadata {
    #[serde(default, rename = "total_count")]
    pub total_count: i32,
    #[serde(default)]
    pub limit: i32,
    #[serde(default)]
    pub skip: i32,
}

/// Returned for any status outside 200-299.
#[derive(Error, Debug, Clone)]
#[error("{method} {url}: {} {message}", .status.as_u16())]
pub struct ErrorResponse {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    /// JSON `message`, else the raw body, else [`UNKNOWN_ERROR`].
    pub message: String,
    pub success: bool,
    /// Raw response body.
    pub body: Bytes,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    success: bool,
}

impl ErrorResponse {
    /// Build the error from a failed response's parts.
    #[must_use]
    pub fn new(method: Method, url: Url, status: StatusCode, body: Bytes) -> Self {
        let decoded = serde_json::from_slice::<ErrorBody>(&body).ok();
        let success = decoded.as_ref().is_some_and(|b| b.success);

        let message = decoded
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .or_else(|| {
                (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned())
            })
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

        Self {
            method,
            url,
            status,
            message,
            success,
            body,
        }
    }
}

/// Pass 2xx responses through; turn anything else into [`Error::Api`].
///
/// # Errors
/// Returns [`Error::Api`] for non-2xx statuses, or the error hit while
/// reading the error body.
pub async fn check_response(
    ctx: &CancellationToken,
    response: RawResponse,
) -> Result<RawResponse, Error> {
    if response.status().is_success() {
        return Ok(response);
    }

    let method = response.method().clone();
    let url = response.url().clone();
    let status = response.status();
    let body = response.bytes(ctx).await?;

    Err(Error::Api(ErrorResponse::new(method, url, status, body)))
}

/// Decode a checked response body as JSON.
///
/// # Errors
/// Returns [`Error::Decoding`] if the body is not valid JSON for `T`.
pub async fn decode_json<T: DeserializeOwned>(
    ctx: &CancellationToken,
    response: RawResponse,
) -> Result<T, Error> {
    let logger = response.logger.clone();
    let url = response.url().clone();
    let body = response.bytes(ctx).await?;

    serde_json::from_slice(&body).map_err(|e| {
        emit(logger.as_ref(), || {
            warn!(url = %url, error = %e, body = %String::from_utf8_lossy(&body), "Failed to parse response");
        });
        Error::Decoding(e)
    })
}

/// Stream a checked response body into `sink`.
///
/// # Errors
/// Returns [`Error::Io`] if the sink fails, or a transport/cancellation error.
pub async fn copy_body<W>(
    ctx: &CancellationToken,
    response: RawResponse,
    sink: &mut W,
) -> Result<u64, Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    response.copy_to(ctx, sink).await
}
