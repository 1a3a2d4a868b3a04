//! Declarative API operations and the generic executor that runs them.

use std::fmt;
use std::marker::PhantomData;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::Error;
use crate::request::{with_query_param, RequestBody, RequestOption};
use crate::response::{check_response, copy_body, decode_json, ApiResponse};

/// One API call: method, path, options, body, and the shape of `result`.
pub struct Operation<T> {
    method: Method,
    path: String,
    options: Vec<RequestOption>,
    body: RequestBody,
    require_success: bool,
    _result: PhantomData<fn() -> T>,
}

impl<T> Operation<T> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            options: Vec::new(),
            body: RequestBody::Empty,
            require_success: false,
            _result: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a query parameter; empty values are dropped when the request is built.
    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.options.push(with_query_param(key, value.to_string()));
        self
    }

    #[must_use]
    pub fn option(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    #[must_use]
    pub fn options(mut self, options: impl IntoIterator<Item = RequestOption>) -> Self {
        self.options.extend(options);
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Send `body` as JSON.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, Error> {
        Ok(self.body(RequestBody::json(body)?))
    }

    /// Fail the call when a 2xx envelope says `success: false`.
    #[must_use]
    pub fn require_success(mut self) -> Self {
        self.require_success = true;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn request_options(&self) -> &[RequestOption] {
        &self.options
    }

    #[must_use]
    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }

    #[must_use]
    pub fn requires_success(&self) -> bool {
        self.require_success
    }

    /// Query parameter value set by this operation, after override rules.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.options.iter().rev().find_map(|option| match option {
            RequestOption::QueryParam { key: k, value } if k == key && !value.is_empty() => {
                Some(value.as_str())
            }
            _ => None,
        })
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("options", &self.options)
            .field("body", &self.body)
            .field("require_success", &self.require_success)
            .finish()
    }
}

impl Client {
    /// Run `operation` and decode its envelope.
    ///
    /// # Errors
    /// Transport and cancellation errors, [`Error::Api`] for non-2xx statuses,
    /// [`Error::Decoding`] for malformed bodies, and [`Error::Application`]
    /// when the operation requires `success` and the envelope reports failure.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        operation: Operation<T>,
    ) -> Result<ApiResponse<T>, Error> {
        let Operation {
            method,
            path,
            options,
            body,
            require_success,
            ..
        } = operation;

        let response = self.request(ctx, method, &path, body, &options).await?;
        let response = check_response(ctx, response).await?;
        let envelope: ApiResponse<T> = decode_json(ctx, response).await?;

        if require_success {
            envelope.ensure_success()
        } else {
            Ok(envelope)
        }
    }

    /// Run `operation` and stream the raw success body into `sink`.
    ///
    /// # Errors
    /// Transport and cancellation errors, [`Error::Api`] for non-2xx statuses,
    /// and [`Error::Io`] if the sink fails.
    pub async fn execute_into<T, W>(
        &self,
        ctx: &CancellationToken,
        operation: Operation<T>,
        sink: &mut W,
    ) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let response = self
            .request(
                ctx,
                operation.method,
                &operation.path,
                operation.body,
                &operation.options,
            )
            .await?;
        let response = check_response(ctx, response).await?;
        copy_body(ctx, response, sink).await
    }
}
