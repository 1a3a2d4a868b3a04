//! HTTP execution: sends built requests through the engine and hands back
//! raw responses, with optional body capture and traffic dumps.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Version};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Dispatch};
use url::Url;

use crate::client::{Client, ClientConfig};
use crate::error::Error;
use crate::request::{build_request, RequestBody, RequestOption};

/// Response content types whose bodies are safe to buffer and log.
const LOGGABLE_MIME_TYPES: [&str; 3] = ["application/json", "text/plain", "text/html"];

const REQUEST_PREFIX: &str = "http --> ";
const RESPONSE_PREFIX: &str = "http <-- ";

/// The engine that performs HTTP round trips.
#[async_trait]
pub trait HttpEngine: Send + Sync {
    /// Execute `request` and return the response without interpreting it.
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl HttpEngine for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}

/// Sink for human-readable traffic dumps.
#[derive(Clone)]
pub struct PlainLogger(Arc<Mutex<Box<dyn Write + Send>>>);

impl PlainLogger {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(sink))))
    }

    fn write_dump(&self, prefix: &str, dump: &str) {
        let mut sink = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = sink.write_all(prefix_lines(prefix, dump).as_bytes());
        let _ = sink.flush();
    }
}

/// Summary of a finished request, passed to the completion callback.
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    pub method: Method,
    pub url: Url,
    pub request_headers: HeaderMap,
    pub status: StatusCode,
    pub response_headers: HeaderMap,
}

enum ResponseBody {
    /// Read into memory for logging; replayed to the caller.
    Captured(Bytes),
    /// Still on the wire.
    Live(reqwest::Response),
}

/// A response whose status has not been interpreted yet.
pub struct RawResponse {
    method: Method,
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    pub(crate) logger: Option<Dispatch>,
}

impl RawResponse {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Final URL of the request.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the body was buffered for logging.
    #[must_use]
    pub fn is_captured(&self) -> bool {
        matches!(self.body, ResponseBody::Captured(_))
    }

    /// Read the whole body.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if `ctx` fires first, or the transport error.
    pub async fn bytes(self, ctx: &CancellationToken) -> Result<Bytes, Error> {
        match self.body {
            ResponseBody::Captured(data) => Ok(data),
            ResponseBody::Live(response) => read_body(ctx, response).await,
        }
    }

    /// Stream the body into `sink` without decoding it, returning the number
    /// of bytes written.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`], a transport error, or [`Error::Io`] if the
    /// sink fails.
    pub async fn copy_to<W>(self, ctx: &CancellationToken, sink: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut response = match self.body {
            ResponseBody::Captured(data) => {
                sink.write_all(&data).await?;
                sink.flush().await?;
                return Ok(data.len() as u64);
            }
            ResponseBody::Live(response) => response,
        };

        let mut written = 0u64;
        loop {
            let chunk = tokio::select! {
                () = ctx.cancelled() => return Err(Error::Cancelled),
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("captured", &self.is_captured())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Perform one HTTP call and return the raw response.
    ///
    /// The status is not interpreted; see [`Client::execute`] for the decoded
    /// form. Configuration is read once, when the call starts.
    ///
    /// # Errors
    /// Fails on request-building errors, transport errors, or cancellation.
    pub async fn request(
        &self,
        ctx: &CancellationToken,
        method: Method,
        path: &str,
        body: RequestBody,
        options: &[RequestOption],
    ) -> Result<RawResponse, Error> {
        let config = self.snapshot();
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let log_bodies = config.log_bodies();
        let body = if log_bodies {
            tokio::select! {
                () = ctx.cancelled() => return Err(Error::Cancelled),
                buffered = body.buffer() => buffered?,
            }
        } else {
            body
        };
        let request_body = if log_bodies {
            body.in_memory().cloned()
        } else {
            None
        };

        let request = build_request(&config, method, path, body, options)?;
        let method = request.method().clone();
        let url = request.url().clone();
        let request_headers = request.headers().clone();

        emit(config.logger.as_ref(), || {
            debug!(
                method = %method,
                url = %url,
                body = %lossy(request_body.as_ref()),
                "sdk request"
            );
        });

        let result = tokio::select! {
            () = ctx.cancelled() => Err(Error::Cancelled),
            response = config.engine.execute(request) => response.map_err(Error::from),
        };

        if let Some(sink) = &config.plain_logger {
            let dump = dump_request(
                &config,
                &method,
                &url,
                &request_headers,
                request_body.as_ref(),
            );
            sink.write_dump(REQUEST_PREFIX, &dump);
        }

        let response = result?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let body = if log_bodies && is_loggable(&headers) {
            ResponseBody::Captured(read_body(ctx, response).await?)
        } else {
            ResponseBody::Live(response)
        };
        let response_body = match &body {
            ResponseBody::Captured(data) => Some(data),
            ResponseBody::Live(_) => None,
        };

        if let Some(sink) = &config.plain_logger {
            let dump = dump_response(version, status, &headers, response_body);
            sink.write_dump(RESPONSE_PREFIX, &dump);
        }

        emit(config.logger.as_ref(), || {
            debug!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                body = %lossy(response_body),
                "sdk response"
            );
        });

        if let Some(callback) = &config.on_request_completed {
            callback(&CompletedRequest {
                method: method.clone(),
                url: url.clone(),
                request_headers,
                status,
                response_headers: headers.clone(),
            });
        }

        Ok(RawResponse {
            method,
            url,
            status,
            headers,
            body,
            logger: config.logger.clone(),
        })
    }
}

/// Run `f` with this client's dispatcher as the default, if it has one.
pub(crate) fn emit(logger: Option<&Dispatch>, f: impl FnOnce()) {
    match logger {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        None => f(),
    }
}

async fn read_body(ctx: &CancellationToken, mut response: reqwest::Response) -> Result<Bytes, Error> {
    let mut buf = BytesMut::new();
    loop {
        let chunk = tokio::select! {
            () = ctx.cancelled() => return Err(Error::Cancelled),
            chunk = response.chunk() => chunk?,
        };
        match chunk {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => return Ok(buf.freeze()),
        }
    }
}

fn lossy(body: Option<&Bytes>) -> std::borrow::Cow<'_, str> {
    body.map_or(std::borrow::Cow::Borrowed(""), |b| String::from_utf8_lossy(b))
}

/// Media type of a `Content-Type` value with parameters stripped.
fn parse_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_loggable(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(parse_mime_type)
        .is_some_and(|mime| LOGGABLE_MIME_TYPES.contains(&mime.as_str()))
}

fn prefix_lines(prefix: &str, text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for line in text.split('\n') {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap, redact: Option<&str>) {
    let mut lines: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = if redact.is_some_and(|r| name.as_str().eq_ignore_ascii_case(r)) {
                "[redacted]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (canonical_header_name(name.as_str()), value)
        })
        .collect();
    lines.sort();
    for (name, value) in lines {
        let _ = writeln!(out, "{name}: {value}");
    }
}

/// `content-type` -> `Content-Type`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn dump_request(
    config: &ClientConfig,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: Option<&Bytes>,
) -> String {
    let mut out = String::new();
    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };
    let _ = writeln!(out, "{method} {target} HTTP/1.1");
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => {
                let _ = writeln!(out, "Host: {host}:{port}");
            }
            None => {
                let _ = writeln!(out, "Host: {host}");
            }
        }
    }
    write_headers(&mut out, headers, Some(config.auth_header()));
    out.push('\n');
    if let Some(body) = body {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

fn dump_response(
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&Bytes>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{version:?} {status}");
    write_headers(&mut out, headers, None);
    out.push('\n');
    if let Some(body) = body {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}
