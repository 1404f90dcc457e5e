//! reqwest-backed [`Transport`].
//!
//! # Design
//! - One pooled client per transport; every call carries a fresh request id.
//! - Transport-level failures map onto the transient variants; retrying is left to the
//!   engine's governor.
//! - Non-2xx answers are decoded as a problem body when possible and fall back to the raw
//!   text otherwise.

use std::time::Duration;

use async_trait::async_trait;
use ferry_core::{Method, Request, Response, Transport, TransportError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Header carrying the per-call correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";
/// Header carrying the API key.
pub const HEADER_API_KEY: &str = "x-ferry-api-key";
/// Per-request deadline applied by the HTTP client itself.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: Url,
    /// API key sent with every call.
    pub api_key: Option<String>,
    /// Client-side deadline per request.
    pub timeout: Duration,
}

impl HttpTransportConfig {
    /// Settings for `base_url` with no credentials and the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Attach an API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace the client-side timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Failures raised while building the transport.
#[derive(Debug, Error)]
pub enum HttpSetupError {
    /// The API key cannot be sent as a header value.
    #[error("api key contains invalid header characters")]
    InvalidApiKey,
    /// The underlying client could not be constructed.
    #[error("failed to build HTTP client")]
    Client {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },
}

/// [`Transport`] speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the API key is not a valid header value or the client cannot
    /// be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, HttpSetupError> {
        let mut default_headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value =
                HeaderValue::from_str(api_key).map_err(|_| HttpSetupError::InvalidApiKey)?;
            default_headers.insert(HEADER_API_KEY, value);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| HttpSetupError::Client { source })?;
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{path}", self.base_url.path().trim_end_matches('/'));
        url.set_path(&joined);
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &Request) -> Result<Response, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.endpoint(&request.path);
        debug!(
            method = request.method.as_str(),
            url = %url,
            request_id = %request_id,
            "sending request"
        );

        let mut builder = self
            .client
            .request(method(request.method), url)
            .header(HEADER_REQUEST_ID, &request_id);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(classify_send_error)?;

        if !status.is_success() {
            return Err(classify_problem(status.as_u16(), &bytes));
        }
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|err| TransportError::Protocol {
                detail: format!("response body is not JSON: {err}"),
            })?
        };
        Ok(Response {
            status: status.as_u16(),
            body,
        })
    }
}

const fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            detail: err.to_string(),
        }
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Connection {
            detail: err.to_string(),
        }
    } else {
        TransportError::Protocol {
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProblemBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn classify_problem(status: u16, bytes: &[u8]) -> TransportError {
    let problem = serde_json::from_slice::<ProblemBody>(bytes).ok();
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    let message = problem
        .as_ref()
        .and_then(|problem| {
            problem
                .message
                .clone()
                .or_else(|| problem.detail.clone())
                .or_else(|| problem.title.clone())
        })
        .unwrap_or_else(|| {
            if text.is_empty() {
                format!("request failed with status {status}")
            } else {
                text
            }
        });
    TransportError::Application {
        status,
        code: problem.and_then(|problem| problem.code),
        message,
    }
}
