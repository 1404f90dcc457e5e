//! Contract consumed from the transport collaborator.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failures surfaced by a transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established or was reset.
    #[error("connection failed")]
    Connection {
        /// Failure detail.
        detail: String,
    },
    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout {
        /// Failure detail.
        detail: String,
    },
    /// The server answered with an application-level failure.
    #[error("application error response")]
    Application {
        /// HTTP status.
        status: u16,
        /// Application error code when supplied.
        code: Option<String>,
        /// Server message.
        message: String,
    },
    /// The exchange completed but could not be understood.
    #[error("malformed response")]
    Protocol {
        /// Failure detail.
        detail: String,
    },
}

impl TransportError {
    /// Whether the failure is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// HTTP status of an application failure.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Submit.
    Post,
    /// Store.
    Put,
    /// Remove.
    Delete,
}

impl Method {
    /// Upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// One transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Verb.
    pub method: Method,
    /// Endpoint path relative to the transport's base URL.
    pub path: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl Request {
    /// `GET` request without parameters.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// `POST` request carrying a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Successful transport response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status.
    pub status: u16,
    /// Decoded JSON body; `null` when empty.
    pub body: Value,
}

impl Response {
    /// `200` response wrapping `body`.
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Decode the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Application result code (`rc`) carried by the body, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.body.get("rc").and_then(Value::as_str)
    }
}

/// The single call surface every backend request goes through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `request`.
    async fn call(&self, request: &Request) -> Result<Response, TransportError>;
}
