pub mod binder;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod param;
pub mod registry;
pub mod types;

#[cfg(test)]
mod test_util;

pub use connection::{Connection, ConnectionConfig, ConnectionHandle, Frame, FrameTransport};
pub use context::{CallContext, HttpRequestInfo, Origin};
pub use error::{BindError, CallError, ConfigError, ErrorCode, RegistryError, TransportError};
pub use param::{ArgValue, Param, TypeTag};
pub use registry::{FunctionDescriptor, Registry, RegistryBuilder};
pub use types::{Bytes, Concrete, Polymorphic, Request, RequestId, Response, RpcErrorObject};
