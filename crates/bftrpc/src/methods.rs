//! Methods served by the demo node.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

use bftrpc_core::{
    Bytes, CallContext, Concrete, Polymorphic, Registry, RegistryError, RequestId,
    Response as RpcResponse,
};

const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Identity of the running node, shared by every call.
#[derive(Debug)]
pub struct NodeInfo {
    pub moniker: String,
    pub started: Instant,
}

#[derive(Debug, Serialize)]
struct Status {
    moniker: String,
    version: &'static str,
    uptime_secs: u64,
}

#[derive(Debug, Serialize)]
struct BaseAccount {
    address: String,
    sequence: u64,
}

impl Concrete for BaseAccount {
    const TYPE_URL: &'static str = "/auth.BaseAccount";
}

pub fn node_registry(node: Arc<NodeInfo>) -> Result<Registry, RegistryError> {
    let mut builder = Registry::builder();
    builder
        .func("health", &[], health)?
        .func("status", &[], move |ctx: CallContext| status(ctx, Arc::clone(&node)))?
        .func("echo", &["arg"], echo)?
        .func("echo_bytes", &["arg"], echo_bytes)?
        .func("echo_int", &["arg"], echo_int)?
        .func("echo_optional", &["arg"], echo_optional)?
        .func("account", &["address"], account)?
        .ws_func("subscribe_ticks", &["interval_ms"], subscribe_ticks)?;
    Ok(builder.build())
}

async fn health(_ctx: CallContext) -> Result<Value, String> {
    Ok(json!({}))
}

async fn status(_ctx: CallContext, node: Arc<NodeInfo>) -> Result<Status, String> {
    Ok(Status {
        moniker: node.moniker.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: node.started.elapsed().as_secs(),
    })
}

async fn echo(_ctx: CallContext, arg: String) -> Result<String, String> {
    Ok(arg)
}

async fn echo_bytes(_ctx: CallContext, arg: Bytes) -> Result<Bytes, String> {
    Ok(arg)
}

async fn echo_int(_ctx: CallContext, arg: i64) -> Result<i64, String> {
    Ok(arg)
}

async fn echo_optional(_ctx: CallContext, arg: Option<u64>) -> Result<Option<u64>, String> {
    Ok(arg)
}

async fn account(_ctx: CallContext, address: Bytes) -> Result<Polymorphic, String> {
    if address.as_slice().is_empty() {
        return Err("address is required".to_owned());
    }
    let account = BaseAccount {
        address: hex::encode(address.as_slice()),
        sequence: 0,
    };
    Polymorphic::new(&account).map_err(|err| err.to_string())
}

/// Pushes a tick event to the caller every `interval_ms` until the connection
/// closes. Ticks are dropped while the outbound queue is full.
async fn subscribe_ticks(ctx: CallContext, interval_ms: Option<u64>) -> Result<Value, String> {
    let conn = ctx
        .connection()
        .cloned()
        .ok_or_else(|| "subscriptions require a websocket connection".to_owned())?;
    let event_id = match ctx.json_request().map(|request| &request.id) {
        Some(id) => RequestId::Str(format!("{id}#event")),
        None => RequestId::from("#event"),
    };
    let period = Duration::from_millis(
        interval_ms
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS)
            .max(MIN_TICK_INTERVAL_MS),
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        let mut count: u64 = 0;
        loop {
            tokio::select! {
                _ = conn.closed() => break,
                _ = ticker.tick() => {
                    count += 1;
                    let event = RpcResponse::success(event_id.clone(), json!({ "tick": count }));
                    if !conn.try_write_response(event) {
                        tracing::debug!(remote = conn.remote_addr(), tick = count, "tick dropped");
                    }
                }
            }
        }
        tracing::debug!(remote = conn.remote_addr(), ticks = count, "tick subscription ended");
    });

    Ok(json!({}))
}
