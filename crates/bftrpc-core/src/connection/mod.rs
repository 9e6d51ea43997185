//! Long-lived WebSocket sessions.
//!
//! A connection runs two loops. The read loop decodes inbound frames and
//! dispatches each request in arrival order. The write loop is the only
//! writer on the socket: it drains the bounded response queue, answers pings,
//! and sends keepalive pings of its own. Either loop stopping stops both.

mod config;
mod frame;
mod handle;

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::context::Origin;
use crate::dispatch;
use crate::error::{ConfigError, TransportError};
use crate::registry::Registry;
use crate::types::{Request, Response};

pub use config::{
    ConnectionConfig, DisconnectHook, DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_WAIT,
    DEFAULT_WRITE_WAIT, MAX_WAIT,
};
pub use frame::{Frame, FrameTransport};
pub use handle::ConnectionHandle;

/// Latest ping payload awaiting a pong. Only the newest one is answered.
type PongSlot = Option<Vec<u8>>;

// ==============================================================================
// Connection
// ==============================================================================

pub struct Connection<T> {
    transport: T,
    handle: ConnectionHandle,
    queue: mpsc::Receiver<Response>,
    registry: Arc<Registry>,
    config: ConnectionConfig,
}

impl<T: FrameTransport> Connection<T> {
    pub fn new(
        transport: T,
        remote_addr: impl Into<Arc<str>>,
        registry: Arc<Registry>,
        config: ConnectionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (outbound, queue) = mpsc::channel(config.queue_capacity());
        let handle = ConnectionHandle::new(
            remote_addr.into(),
            outbound,
            tokio_util::sync::CancellationToken::new(),
        );
        Ok(Self {
            transport,
            handle,
            queue,
            registry,
            config,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Serve the connection until either side stops it. The disconnect hook
    /// fires exactly once, after both loops have finished.
    pub async fn run(self) {
        let Self {
            transport,
            handle,
            queue,
            registry,
            config,
        } = self;
        info!(remote = handle.remote_addr(), "websocket connection opened");

        let (sink, stream) = transport.split();
        let (pong_tx, pong_rx) = watch::channel::<PongSlot>(None);

        let reader = tokio::spawn(read_loop(
            stream,
            handle.clone(),
            registry,
            config.clone(),
            pong_tx,
        ));
        write_loop(sink, queue, pong_rx, &handle, &config).await;

        handle.stop();
        if let Err(err) = reader.await {
            error!(remote = handle.remote_addr(), error = %err, "websocket read task failed");
        }

        if let Some(hook) = config.on_disconnect() {
            hook(handle.remote_addr());
        }
        info!(remote = handle.remote_addr(), "websocket connection closed");
    }
}

// ==============================================================================
// Read Loop
// ==============================================================================

async fn read_loop<S>(
    mut stream: S,
    handle: ConnectionHandle,
    registry: Arc<Registry>,
    config: ConnectionConfig,
    pongs: watch::Sender<PongSlot>,
) where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    let remote = handle.remote_addr().to_owned();
    loop {
        let next = tokio::select! {
            biased;
            _ = handle.closed() => break,
            next = tokio::time::timeout(config.read_wait(), stream.next()) => next,
        };

        let frame = match next {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                debug!(remote = %remote, error = %err, "failed to read websocket frame");
                break;
            }
            Ok(None) => {
                debug!(remote = %remote, "websocket stream ended");
                break;
            }
            Err(_) => {
                debug!(remote = %remote, read_wait = ?config.read_wait(), "read deadline exceeded");
                break;
            }
        };

        if let Some(limit) = config.max_frame_size() {
            if frame.len() > limit {
                let err = TransportError::FrameTooLarge {
                    size: frame.len(),
                    limit,
                };
                warn!(remote = %remote, error = %err, "dropping websocket connection");
                break;
            }
        }

        match frame {
            Frame::Text(text) => handle_message(text.as_bytes(), &handle, &registry).await,
            Frame::Binary(data) => handle_message(&data, &handle, &registry).await,
            Frame::Ping(payload) => {
                pongs.send_replace(Some(payload));
            }
            Frame::Pong(_) => {}
            Frame::Close => {
                debug!(remote = %remote, "peer closed the websocket");
                break;
            }
        }
    }
    handle.stop();
}

/// Decode and serve one inbound message, queueing its response if it has one.
async fn handle_message(payload: &[u8], handle: &ConnectionHandle, registry: &Registry) {
    let request: Request = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(err) => {
            debug!(remote = handle.remote_addr(), error = %err, "malformed websocket request");
            handle
                .write_response(Response::parse_error(format!(
                    "error unmarshaling request: {err}"
                )))
                .await;
            return;
        }
    };

    let method = request.method.clone();
    // Handler panics are already turned into responses by the dispatcher.
    let served = dispatch::handle_request(registry, request, Origin::Connection(handle.clone()));
    let response = tokio::select! {
        biased;
        _ = handle.closed() => {
            debug!(remote = handle.remote_addr(), rpc.method = %method, "connection stopped while serving request");
            return;
        }
        response = served => response,
    };
    let Some(response) = response else { return };

    if !handle.write_response(response).await {
        debug!(remote = handle.remote_addr(), rpc.method = %method, "connection stopped before response was queued");
    }
}

// ==============================================================================
// Write Loop
// ==============================================================================

async fn write_loop<K>(
    mut sink: K,
    mut queue: mpsc::Receiver<Response>,
    mut pongs: watch::Receiver<PongSlot>,
    handle: &ConnectionHandle,
    config: &ConnectionConfig,
) where
    K: Sink<Frame, Error = TransportError> + Unpin,
{
    let remote = handle.remote_addr();
    let write_wait = config.write_wait();
    let ping_period = config.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pongs_open = true;

    loop {
        tokio::select! {
            biased;
            _ = handle.closed() => break,
            changed = pongs.changed(), if pongs_open => {
                if changed.is_err() {
                    pongs_open = false;
                    continue;
                }
                let payload = pongs.borrow_and_update().clone().unwrap_or_default();
                // A lost pong is recovered by the peer's next ping.
                if let Err(err) = send_frame(&mut sink, Frame::Pong(payload), write_wait).await {
                    debug!(remote, error = %err, "failed to send pong");
                }
            }
            _ = ping.tick() => {
                if let Err(err) = send_frame(&mut sink, Frame::Ping(Vec::new()), write_wait).await {
                    debug!(remote, error = %err, "failed to send ping");
                    break;
                }
            }
            response = queue.recv() => {
                let Some(response) = response else { break };
                let text = match serde_json::to_string_pretty(&response) {
                    Ok(text) => text,
                    Err(err) => {
                        error!(remote, rpc.id = %response.id(), error = %err, "failed to encode response");
                        continue;
                    }
                };
                if let Err(err) = send_frame(&mut sink, Frame::Text(text), write_wait).await {
                    debug!(remote, error = %err, "failed to send response");
                    break;
                }
            }
        }
    }

    handle.stop();
    match tokio::time::timeout(write_wait, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(remote, error = %err, "failed to close websocket"),
        Err(_) => debug!(remote, "timed out closing websocket"),
    }
}

async fn send_frame<K>(sink: &mut K, frame: Frame, write_wait: Duration) -> Result<(), TransportError>
where
    K: Sink<Frame, Error = TransportError> + Unpin,
{
    tokio::time::timeout(write_wait, sink.send(frame))
        .await
        .map_err(|_| TransportError::WriteTimeout(write_wait))?
}
