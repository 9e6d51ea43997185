use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connection::ConnectionHandle;
use crate::types::Request;

// ==============================================================================
// HTTP Request Info
// ==============================================================================

/// Transport details of the HTTP request a call arrived on.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestInfo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub remote_addr: Option<String>,
}

impl HttpRequestInfo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

// ==============================================================================
// Call Context
// ==============================================================================

/// Where a call came from.
#[derive(Debug, Clone)]
pub enum Origin {
    Http(Arc<HttpRequestInfo>),
    Connection(ConnectionHandle),
}

/// The implicit leading argument of every registered function.
#[derive(Debug, Clone)]
pub struct CallContext {
    request: Option<Arc<Request>>,
    origin: Origin,
}

impl CallContext {
    pub fn new(request: Option<Request>, origin: Origin) -> Self {
        Self {
            request: request.map(Arc::new),
            origin,
        }
    }

    /// The JSON-RPC request being served; `None` for plain HTTP path calls.
    pub fn json_request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    pub fn http_request(&self) -> Option<&HttpRequestInfo> {
        match &self.origin {
            Origin::Http(info) => Some(info),
            Origin::Connection(_) => None,
        }
    }

    /// The WebSocket connection the call arrived on. Functions that push
    /// events to their caller (subscriptions) go through this handle.
    pub fn connection(&self) -> Option<&ConnectionHandle> {
        match &self.origin {
            Origin::Connection(handle) => Some(handle),
            Origin::Http(_) => None,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self.origin, Origin::Connection(_))
    }

    pub fn remote_addr(&self) -> Option<&str> {
        match &self.origin {
            Origin::Http(info) => info.remote_addr.as_deref(),
            Origin::Connection(handle) => Some(handle.remote_addr()),
        }
    }
}
