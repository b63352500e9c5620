//! Transport Abstraction
//!
//! The platform layer a context drives its transactions through. Every call is
//! non-blocking: an operation that cannot finish yet reports [`IoStatus::WouldBlock`] and
//! the state machine comes back to it later, either on the caller's thread (blocking mode)
//! or from the reactor (callback mode).

use crate::context::ContextSettings;
use crate::error::TransportError;
use crate::types::Method;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod scripted;

pub use http::{HttpTransport, HttpTransportFactory};
pub use scripted::{RecordedRequest, ScriptedReply, ScriptedTransport, ScriptedTransportFactory};

/// Result of one non-blocking transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoStatus<T> {
    Ready(T),
    WouldBlock,
    Failed(TransportError),
}

/// A formatted request, ready to be sent
///
/// Path segments and query values are kept unencoded; the transport encodes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: Method::Get,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn push_query(&mut self, key: &str, value: impl Into<String>) {
        self.query.push((key.to_string(), value.into()));
    }

    pub fn push_query_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push_query(key, value);
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Unencoded path, e.g. `/v2/subscribe/sub-key/demo/0`
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }
}

/// A received response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Non-blocking transport driven by the context state machine
pub trait Transport: Send {
    /// Resolve the origin. Resolution strategy belongs to the implementation.
    fn resolve(&mut self, settings: &ContextSettings) -> IoStatus<()> {
        let _ = settings;
        IoStatus::Ready(())
    }

    fn connect(&mut self, settings: &ContextSettings) -> IoStatus<()>;

    fn send(&mut self, request: &HttpRequest) -> IoStatus<()>;

    fn receive(&mut self) -> IoStatus<HttpResponse>;

    /// Abandon whatever is in flight
    fn cancel(&mut self);

    /// Drop the connection (used when keep-alive is off)
    fn close(&mut self);
}

/// Creates transports for contexts; heartbeat clones get their own from the owner's factory
pub trait TransportFactory: Send + Sync {
    fn create(&self, settings: &ContextSettings) -> Box<dyn Transport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_and_query() {
        let mut request = HttpRequest::get(["v2", "subscribe", "sub-key", "demo", "0"]);
        request.push_query("tt", "0");
        request.push_query_opt("auth", None);
        assert_eq!(request.path(), "/v2/subscribe/sub-key/demo/0");
        assert_eq!(request.query_value("tt"), Some("0"));
        assert_eq!(request.query_value("auth"), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::ok("[]").is_success());
        assert!(!HttpResponse::new(403, "{}").is_success());
    }
}
