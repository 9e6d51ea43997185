//! Shared fixtures for unit tests across core modules.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::context::{CallContext, HttpRequestInfo, Origin};
use crate::registry::{BoundArgs, FunctionDescriptor, Registry};
use crate::types::{Bytes, Concrete, Polymorphic};

#[derive(Serialize)]
struct Variant {
    n: u32,
}

impl Concrete for Variant {
    const TYPE_URL: &'static str = "/test.Variant";
}

async fn echo(_ctx: CallContext, arg: String) -> Result<String, String> {
    Ok(arg)
}

async fn echo_bytes(_ctx: CallContext, arg: Bytes) -> Result<Bytes, String> {
    Ok(arg)
}

async fn pair(_ctx: CallContext, name: String, count: u32) -> Result<(String, u32), String> {
    Ok((name, count))
}

async fn fail(_ctx: CallContext, message: String) -> Result<Value, String> {
    Err(message)
}

async fn variant(_ctx: CallContext) -> Result<Polymorphic, serde_json::Error> {
    Polymorphic::new(&Variant { n: 1 })
}

async fn whoami(ctx: CallContext) -> Result<String, String> {
    ctx.json_request()
        .map(|request| request.method.clone())
        .ok_or_else(|| "no json request".to_owned())
}

async fn ws_only(ctx: CallContext) -> Result<String, String> {
    ctx.connection()
        .map(|conn| conn.remote_addr().to_owned())
        .ok_or_else(|| "not a websocket call".to_owned())
}

async fn explode(_ctx: CallContext, message: String) -> Result<Value, String> {
    panic!("{message}");
}

async fn hang(_ctx: CallContext) -> Result<Value, String> {
    std::future::pending().await
}

pub(crate) fn test_registry() -> Registry {
    let mut builder = Registry::builder();
    builder
        .func("echo", &["arg"], echo)
        .and_then(|b| b.func("echo_bytes", &["arg"], echo_bytes))
        .and_then(|b| b.func("pair", &["name", "count"], pair))
        .and_then(|b| b.func("fail", &["message"], fail))
        .and_then(|b| b.func("variant", &[], variant))
        .and_then(|b| b.func("whoami", &[], whoami))
        .and_then(|b| b.func("explode", &["message"], explode))
        .and_then(|b| b.func("hang", &[], hang))
        .and_then(|b| b.ws_func("ws_only", &[], ws_only))
        .expect("test registry must build");
    builder.build()
}

pub(crate) fn http_origin() -> Origin {
    Origin::Http(Arc::new(HttpRequestInfo {
        method: "POST".to_owned(),
        path: "/".to_owned(),
        ..HttpRequestInfo::default()
    }))
}

/// Invoke a descriptor directly and return its successful result.
pub(crate) async fn call(descriptor: &FunctionDescriptor, args: BoundArgs) -> Value {
    let ctx = CallContext::new(None, http_origin());
    descriptor
        .handler()
        .call(ctx, args)
        .await
        .expect("handler must succeed")
}
