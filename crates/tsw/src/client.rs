//! Client handle and its configuration snapshots.
//!
//! A [`Client`] owns one configuration cell. Every call reads an immutable
//! [`ClientConfig`] snapshot from the cell when it starts and uses only that
//! snapshot, so setters never affect requests that are already in flight.
//! Setters clone the current snapshot, modify the clone and publish it.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::Dispatch;
use url::Url;

use crate::error::Error;
use crate::transport::{CompletedRequest, HttpEngine, PlainLogger};

/// Base URL of the TSW API.
pub const DEFAULT_BASE_URL: &str = "https://api.tsw.io/v2/";

/// Header carrying the bearer token unless overridden.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Library user agent.
pub const USER_AGENT: &str = concat!("tsw-rs/", env!("CARGO_PKG_VERSION"));

/// Callback invoked once per request that produced a response.
pub type CompletionCallback = Arc<dyn Fn(&CompletedRequest) + Send + Sync>;

/// Immutable configuration captured at the start of each call.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    authorization: String,
    auth_header: String,
    user_agent: String,
    headers: BTreeMap<String, String>,
    pub(crate) engine: Arc<dyn HttpEngine>,
    pub(crate) logger: Option<Dispatch>,
    pub(crate) plain_logger: Option<PlainLogger>,
    log_bodies: bool,
    pub(crate) on_request_completed: Option<CompletionCallback>,
}

impl ClientConfig {
    /// Base URL request paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authorization value sent after `Bearer `.
    #[must_use]
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Name of the header carrying the authorization value.
    #[must_use]
    pub fn auth_header(&self) -> &str {
        &self.auth_header
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Extra headers sent on every request.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Whether request and response bodies are captured for logging.
    #[must_use]
    pub fn log_bodies(&self) -> bool {
        self.log_bodies
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("auth_header", &self.auth_header)
            .field("has_authorization", &!self.authorization.is_empty())
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .field("log_bodies", &self.log_bodies)
            .field("has_logger", &self.logger.is_some())
            .field("has_plain_logger", &self.plain_logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to the TSW API.
///
/// Cloning is cheap; clones share one configuration cell.
#[derive(Clone)]
pub struct Client {
    config: Arc<RwLock<Arc<ClientConfig>>>,
}

impl Client {
    /// Create a client for the default base URL using `authorization` as the
    /// bearer value.
    ///
    /// # Errors
    /// Returns error if the HTTP engine cannot be created.
    pub fn new(authorization: impl Into<String>) -> Result<Self, Error> {
        Self::builder().authorization(authorization).build()
    }

    /// Create a client from a token as copied from a dashboard or shell:
    /// surrounding whitespace and single quotes are stripped.
    ///
    /// # Errors
    /// Returns error if the HTTP engine cannot be created.
    pub fn from_token(token: &str) -> Result<Self, Error> {
        Self::new(clean_token(token))
    }

    /// Create a client around a preconfigured engine, without authorization.
    ///
    /// # Errors
    /// Never fails for the default base URL; the signature matches [`Client::new`].
    pub fn with_engine(engine: impl HttpEngine + 'static) -> Result<Self, Error> {
        Self::builder().engine(engine).build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(&self, f: impl FnOnce(&mut ClientConfig)) -> &Self {
        let mut current = self
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = ClientConfig::clone(&current);
        f(&mut next);
        *current = Arc::new(next);
        self
    }

    /// Replace the HTTP engine.
    pub fn set_engine(&self, engine: impl HttpEngine + 'static) -> &Self {
        let engine: Arc<dyn HttpEngine> = Arc::new(engine);
        self.update(|c| c.engine = engine)
    }

    /// Per-client tracing dispatcher, if one was set.
    #[must_use]
    pub fn logger(&self) -> Option<Dispatch> {
        self.snapshot().logger.clone()
    }

    /// Route this client's structured events to `logger` instead of the
    /// global subscriber.
    pub fn set_logger(&self, logger: Dispatch) -> &Self {
        self.update(|c| c.logger = Some(logger))
    }

    /// Write human-readable dumps of HTTP traffic to `sink`. Bodies are
    /// included when [`Client::set_log_bodies`] is on.
    pub fn set_plain_logger(&self, sink: impl Write + Send + 'static) -> &Self {
        let sink = PlainLogger::new(sink);
        self.update(|c| c.plain_logger = Some(sink))
    }

    pub fn clear_plain_logger(&self) -> &Self {
        self.update(|c| c.plain_logger = None)
    }

    #[must_use]
    pub fn log_bodies(&self) -> bool {
        self.snapshot().log_bodies
    }

    /// Capture request and response bodies for logging.
    ///
    /// Request bodies are fully buffered in memory before sending, including
    /// streaming bodies, so large uploads cost their full size in memory.
    /// Response bodies are buffered only for JSON, plain text and HTML.
    pub fn set_log_bodies(&self, log_bodies: bool) -> &Self {
        self.update(|c| c.log_bodies = log_bodies)
    }

    #[must_use]
    pub fn authorization(&self) -> String {
        self.snapshot().authorization.clone()
    }

    pub fn set_authorization(&self, authorization: impl Into<String>) -> &Self {
        let authorization = authorization.into();
        self.update(|c| c.authorization = authorization)
    }

    /// Send the authorization value in `header` instead of `Authorization`.
    pub fn set_auth_header(&self, header: impl Into<String>) -> &Self {
        let header = header.into();
        self.update(|c| c.auth_header = header)
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        self.snapshot().base_url.clone()
    }

    /// Point the client at another API root.
    ///
    /// # Errors
    /// Returns [`Error::UrlParse`] if `base_url` is not an absolute URL.
    pub fn set_base_url(&self, base_url: &str) -> Result<&Self, Error> {
        let url = parse_base_url(base_url)?;
        Ok(self.update(|c| c.base_url = url))
    }

    /// Add headers sent on every request.
    pub fn set_request_headers<I, K, V>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers: Vec<(String, String)> = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(|c| c.headers.extend(headers))
    }

    /// Register a callback invoked after every request that got a response.
    pub fn on_request_completed<F>(&self, callback: F) -> &Self
    where
        F: Fn(&CompletedRequest) + Send + Sync + 'static,
    {
        let callback: CompletionCallback = Arc::new(callback);
        self.update(|c| c.on_request_completed = Some(callback))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.snapshot())
            .finish()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    authorization: String,
    auth_header: Option<String>,
    user_agent: Option<String>,
    headers: BTreeMap<String, String>,
    engine: Option<Arc<dyn HttpEngine>>,
    timeout: Option<Duration>,
    logger: Option<Dispatch>,
    plain_logger: Option<PlainLogger>,
    log_bodies: bool,
    on_request_completed: Option<CompletionCallback>,
}

impl ClientBuilder {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = authorization.into();
        self
    }

    #[must_use]
    pub fn auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }

    /// Prefix the library user agent with `user_agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: impl HttpEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Total timeout for each request on the built-in engine, including
    /// reading the body. Without it requests only end on completion, error
    /// or cancellation. Ignored when an engine is supplied.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn plain_logger(mut self, sink: impl Write + Send + 'static) -> Self {
        self.plain_logger = Some(PlainLogger::new(sink));
        self
    }

    #[must_use]
    pub fn log_bodies(mut self, log_bodies: bool) -> Self {
        self.log_bodies = log_bodies;
        self
    }

    #[must_use]
    pub fn on_request_completed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CompletedRequest) + Send + Sync + 'static,
    {
        self.on_request_completed = Some(Arc::new(callback));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the default engine cannot
    /// be created.
    pub fn build(self) -> Result<Client, Error> {
        let base_url = parse_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                Arc::new(builder.build()?)
            }
        };

        let user_agent = match self.user_agent {
            Some(prefix) => format!("{prefix} {USER_AGENT}"),
            None => USER_AGENT.to_string(),
        };

        let config = ClientConfig {
            base_url,
            authorization: self.authorization,
            auth_header: self
                .auth_header
                .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string()),
            user_agent,
            headers: self.headers,
            engine,
            logger: self.logger,
            plain_logger: self.plain_logger,
            log_bodies: self.log_bodies,
            on_request_completed: self.on_request_completed,
        };

        Ok(Client {
            config: Arc::new(RwLock::new(Arc::new(config))),
        })
    }
}

/// Parse an API root. A missing trailing slash is added so relative paths
/// extend the root instead of replacing its last segment.
fn parse_base_url(base_url: &str) -> Result<Url, Error> {
    let mut url = Url::parse(base_url).map_err(|source| Error::UrlParse {
        path: base_url.to_string(),
        source,
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn clean_token(token: &str) -> String {
    token.trim().trim_matches('\'').to_string()
}
