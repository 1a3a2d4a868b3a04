//! Request building: URL resolution, query options, body encoding and headers.

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use url::Url;

use crate::client::ClientConfig;
use crate::error::Error;

/// Media type sent and accepted by the API.
pub const MEDIA_TYPE: &str = "application/json";

/// A streaming request body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>;

/// Body of an outgoing request.
///
/// The caller picks the encoding explicitly; nothing is inferred from the
/// runtime type of the payload.
#[derive(Default)]
pub enum RequestBody {
    /// No body and no `Content-Type`.
    #[default]
    Empty,
    /// Raw bytes, sent unmodified.
    Bytes(Bytes),
    /// A byte stream, sent unmodified.
    Stream(BodyStream),
    /// Compact JSON, already encoded.
    Json(Bytes),
}

impl RequestBody {
    /// Encode `value` as compact JSON.
    ///
    /// `<`, `>` and `&` inside strings are written literally, never as
    /// `<`-style escapes.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_vec(value)
            .map(|buf| Self::Json(Bytes::from(buf)))
            .map_err(Error::Encoding)
    }

    /// Wrap raw bytes.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::Bytes(data.into())
    }

    /// Wrap a byte stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Whether there is no body at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Bytes of the body if they are already in memory.
    #[must_use]
    pub fn in_memory(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(data) | Self::Json(data) => Some(data),
            Self::Empty | Self::Stream(_) => None,
        }
    }

    /// Drain a streaming body into memory. Other variants are returned as-is.
    pub(crate) async fn buffer(self) -> Result<Self, std::io::Error> {
        let Self::Stream(mut stream) = self else {
            return Ok(self);
        };
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Self::Bytes(buf.freeze()))
    }

    fn into_reqwest(self) -> Option<reqwest::Body> {
        match self {
            Self::Empty => None,
            Self::Bytes(data) | Self::Json(data) => Some(reqwest::Body::from(data)),
            Self::Stream(stream) => Some(reqwest::Body::wrap_stream(stream)),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Json(data) => f
                .debug_tuple("Json")
                .field(&String::from_utf8_lossy(data))
                .finish(),
        }
    }
}

/// A mutation applied to a request after the base headers and query are set.
///
/// Options run in the order given; a later option replaces the value an
/// earlier one set for the same query key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOption {
    /// Set `key=value` on the query string. Skipped when `value` is empty.
    QueryParam { key: String, value: String },
    /// Set a header, replacing any earlier value.
    Header { name: String, value: String },
}

impl RequestOption {
    /// Apply this option to `request`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for an invalid header name or value.
    pub fn apply(&self, request: &mut reqwest::Request) -> Result<(), Error> {
        match self {
            Self::QueryParam { key, value } => {
                set_query_param(request.url_mut(), key, value);
                Ok(())
            }
            Self::Header { name, value } => {
                let (name, value) = header_pair(name, value)?;
                request.headers_mut().insert(name, value);
                Ok(())
            }
        }
    }
}

/// Add `key=value` to the query string unless `value` is empty.
pub fn with_query_param(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    RequestOption::QueryParam {
        key: key.into(),
        value: value.into(),
    }
}

/// Set a request header.
pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> RequestOption {
    RequestOption::Header {
        name: name.into(),
        value: value.into(),
    }
}

fn set_query_param(url: &mut Url, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidArgument(format!("header name {name:?}: {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("header {name} value: {e}")))?;
    Ok((header_name, header_value))
}

/// Resolve `path` against `base` using RFC 3986 reference resolution.
///
/// # Errors
/// Returns [`Error::UrlParse`] if `path` is not a valid reference.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, Error> {
    base.join(path).map_err(|source| Error::UrlParse {
        path: path.to_string(),
        source,
    })
}

/// Build an authenticated request from a configuration snapshot.
///
/// # Errors
/// Fails on an unresolvable path or an invalid header name/value.
pub fn build_request(
    config: &ClientConfig,
    method: Method,
    path: &str,
    body: RequestBody,
    options: &[RequestOption],
) -> Result<reqwest::Request, Error> {
    let url = resolve_url(config.base_url(), path)?;
    let has_body = !body.is_empty();

    let mut request = reqwest::Request::new(method, url);
    *request.body_mut() = body.into_reqwest();

    let headers = request.headers_mut();
    apply_base_headers(config, headers, has_body)?;

    for option in options {
        option.apply(&mut request)?;
    }

    Ok(request)
}

fn apply_base_headers(
    config: &ClientConfig,
    headers: &mut HeaderMap,
    has_body: bool,
) -> Result<(), Error> {
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(config.user_agent())
            .map_err(|e| Error::InvalidArgument(format!("user agent: {e}")))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));

    let (auth_name, auth_value) = header_pair(
        config.auth_header(),
        &format!("Bearer {}", config.authorization()),
    )?;
    headers.insert(auth_name, auth_value);

    if has_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE));
    }

    for (name, value) in config.headers() {
        let (name, value) = header_pair(name, value)?;
        headers.insert(name, value);
    }
    Ok(())
}
