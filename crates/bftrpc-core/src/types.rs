//! JSON-RPC wire types shared by every transport.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ErrorCode;

// ==============================================================================
// Request Id
// ==============================================================================

/// A JSON-RPC request id. The empty string marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

impl RequestId {
    /// An empty id: notifications carry it, and error responses use it when
    /// the originating id could not be parsed.
    pub fn empty() -> Self {
        Self::Str(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

/// Missing and `null` ids both mean "notification".
fn nullable_id<'de, D>(deserializer: D) -> Result<RequestId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RequestId>::deserialize(deserializer)?.unwrap_or_default())
}

// ==============================================================================
// Request
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "nullable_id")]
    pub id: RequestId,
    #[serde(default)]
    pub method: String,
    /// Raw params: a mapping from parameter name to value, an ordered
    /// sequence of values, or absent.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_empty()
    }
}

// ==============================================================================
// Response
// ==============================================================================

/// The `error` member of a failure response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl RpcErrorObject {
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// A response envelope. Always carries the id of the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", from = "WireResponse")]
pub enum Response {
    Success { id: RequestId, result: Value },
    Failure { id: RequestId, error: RpcErrorObject },
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Success { id, result }
    }

    pub fn error(id: RequestId, code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::Failure {
            id,
            error: RpcErrorObject {
                code: code.code(),
                message: code.message().to_owned(),
                data: detail.to_string(),
            },
        }
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::error(RequestId::empty(), ErrorCode::ParseError, detail)
    }

    pub fn method_not_found(id: RequestId) -> Self {
        Self::error(id, ErrorCode::MethodNotFound, "")
    }

    pub fn id(&self) -> &RequestId {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The error class of a failure response, if it is one the engine knows.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => error.kind(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    jsonrpc: String,
    #[serde(default, deserialize_with = "nullable_id")]
    id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorObject>,
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        let (id, result, error) = match response {
            Response::Success { id, result } => (id, Some(result), None),
            Response::Failure { id, error } => (id, None, Some(error)),
        };
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result,
            error,
        }
    }
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        match wire.error {
            Some(error) => Self::Failure { id: wire.id, error },
            None => Self::Success {
                id: wire.id,
                result: wire.result.unwrap_or(Value::Null),
            },
        }
    }
}

// ==============================================================================
// Bytes
// ==============================================================================

/// A byte-sequence argument or result. JSON carries it as base64; query
/// strings carry it as `0x` hex or a quoted string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// Polymorphic Results
// ==============================================================================

/// A concrete type that can be returned behind an interface-shaped result.
pub trait Concrete: Serialize {
    /// Registered type name, e.g. `/auth.BaseAccount`.
    const TYPE_URL: &'static str;
}

/// An interface-shaped result that keeps its concrete type tag through
/// serialization, so a decoder can recover which variant was returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polymorphic {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub value: Value,
}

impl Polymorphic {
    pub fn new<T: Concrete>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            type_url: T::TYPE_URL.to_owned(),
            value: serde_json::to_value(value)?,
        })
    }
}
