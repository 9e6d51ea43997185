use std::time::Duration;

use crate::param::TypeTag;

// ==============================================================================
// Protocol Error Codes
// ==============================================================================

/// JSON-RPC 2.0 error classes produced by the engine.
///
/// Every one of these travels inside a `Failure` response; none of them is
/// ever surfaced as a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error. Invalid JSON",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        [
            Self::ParseError,
            Self::InvalidRequest,
            Self::MethodNotFound,
            Self::InvalidParams,
            Self::InternalError,
        ]
        .into_iter()
        .find(|candidate| candidate.code() == code)
    }
}

// ==============================================================================
// Engine Errors
// ==============================================================================

/// Registration failures. These surface while the registry is being built,
/// before any request is served.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("method `{0}` is already registered")]
    Duplicate(String),

    #[error("invalid method name `{0}`: must be non-empty and must not contain '/'")]
    InvalidName(String),

    #[error("method `{name}` takes {expected} parameters but {got} argument names were given")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Failures converting wire parameters into typed call arguments.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("parameter count mismatch: expected {expected} parameters {names:?}, got {got}")]
    ParamCount {
        expected: usize,
        got: usize,
        names: Vec<String>,
    },

    #[error("unknown type for JSON params: expected map or array, got {0}")]
    ParamsShape(&'static str),

    #[error("hex value given for non-byte/non-string type {0}")]
    HexTarget(TypeTag),

    #[error("byte value given for type {0}")]
    BytesTarget(TypeTag),

    #[error("invalid hex value: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("decoded bytes are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid integer literal `{0}`")]
    Integer(String),

    #[error("failed to decode argument: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures raised while running a registered function.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    Handler(String),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("bound arguments do not match the handler signature")]
    ArgumentShape,
}

/// Invalid connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ping period must be greater than zero")]
    ZeroPingPeriod,

    #[error("ping period {ping_period:?} must be shorter than read wait {read_wait:?}")]
    PingNotBeforeReadDeadline {
        ping_period: Duration,
        read_wait: Duration,
    },

    #[error("outbound queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("write wait must be greater than zero")]
    ZeroWriteWait,

    #[error("{setting} {wait:?} exceeds the maximum of {max:?}")]
    WaitTooLong {
        setting: &'static str,
        wait: Duration,
        max: Duration,
    },
}

/// Failures of the underlying frame duplex.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(Duration),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("transport failure: {0}")]
    Io(String),
}
