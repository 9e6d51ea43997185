mod cli;
mod methods;
mod server;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use eyre::WrapErr;

use bftrpc_core::ConnectionConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let node = Arc::new(methods::NodeInfo {
        moniker: args.moniker.clone(),
        started: Instant::now(),
    });
    let registry = Arc::new(methods::node_registry(node).context("register node methods")?);
    tracing::info!(methods = registry.len(), "registered rpc methods");

    let manager = server::WebsocketManager::new(Arc::clone(&registry), connection_config(&args))
        .context("configure websocket connections")?;
    tracing::info!(config = ?manager.config(), "websocket connections configured");

    let mut state = server::AppState::new(registry);
    state.max_body_bytes = args.max_body_bytes;

    let mut router = server::build_router(state, Some((args.ws_path.as_str(), manager)));
    if args.cors {
        router = router.layer(server::permissive_cors());
    }

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0, it is accessible from the network");
    }

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!(ws_path = %args.ws_path, "listening on {bind_addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("run HTTP server")?;

    Ok(())
}

fn connection_config(args: &cli::Cli) -> ConnectionConfig {
    let mut config = ConnectionConfig::default()
        .with_write_wait(Duration::from_secs(args.write_wait_secs))
        .with_read_wait(Duration::from_secs(args.read_wait_secs))
        .with_queue_capacity(args.queue_capacity)
        .with_on_disconnect(|remote| tracing::debug!(remote, "websocket client disconnected"));
    if let Some(ms) = args.ping_period_ms {
        config = config.with_ping_period(Duration::from_millis(ms));
    }
    if let Some(limit) = args.max_frame_size {
        config = config.with_max_frame_size(limit);
    }
    config
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
