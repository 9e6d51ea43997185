use clap::Parser;

/// bftrpc: JSON-RPC, HTTP, and WebSocket API server for a BFT node.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address to bind the server to.
    #[arg(long, default_value = "127.0.0.1", env = "BFTRPC_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "26657", env = "BFTRPC_PORT")]
    pub port: u16,

    /// Path of the WebSocket endpoint.
    #[arg(long, default_value = "/websocket")]
    pub ws_path: String,

    /// Node name reported by `status`.
    #[arg(long, default_value = "bftrpc-node", env = "BFTRPC_MONIKER")]
    pub moniker: String,

    /// Seconds allowed for each WebSocket write.
    #[arg(long, default_value = "10")]
    pub write_wait_secs: u64,

    /// Seconds a WebSocket peer may stay silent before it is dropped.
    #[arg(long, default_value = "30")]
    pub read_wait_secs: u64,

    /// Milliseconds between keepalive pings. Defaults to 9/10 of the read wait.
    #[arg(long)]
    pub ping_period_ms: Option<u64>,

    /// Responses buffered per WebSocket connection.
    #[arg(long, default_value = "1000")]
    pub queue_capacity: usize,

    /// Largest inbound WebSocket frame, in bytes. Unlimited if omitted.
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Largest HTTP request body, in bytes.
    #[arg(long, default_value = "1000000")]
    pub max_body_bytes: usize,

    /// Allow cross-origin requests from any origin.
    #[arg(long)]
    pub cors: bool,
}
