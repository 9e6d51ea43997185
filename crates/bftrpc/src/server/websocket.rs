use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::Instrument;

use bftrpc_core::{ConfigError, Connection, ConnectionConfig, Frame, Registry, TransportError};

// ==============================================================================
// Connection Manager
// ==============================================================================

/// Upgrades HTTP requests to WebSocket sessions. Every connection it accepts
/// shares the same registry and configuration.
#[derive(Debug, Clone)]
pub struct WebsocketManager {
    registry: Arc<Registry>,
    config: ConnectionConfig,
}

impl WebsocketManager {
    pub fn new(registry: Arc<Registry>, config: ConnectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Complete the upgrade and serve the session on a task of its own until
    /// it stops.
    pub fn accept(&self, upgrade: WebSocketUpgrade, remote_addr: String) -> Response {
        let upgrade = match self.config.max_frame_size() {
            Some(limit) => upgrade.max_frame_size(limit).max_message_size(limit),
            None => upgrade,
        };

        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        upgrade.on_upgrade(move |socket| {
            let span = tracing::info_span!("websocket", remote = %remote_addr);
            async move {
                let transport = AxumFrames { socket };
                match Connection::new(transport, remote_addr, registry, config) {
                    Ok(connection) => connection.run().await,
                    Err(err) => tracing::error!(error = %err, "rejected websocket connection"),
                }
            }
            .instrument(span)
        })
    }
}

// ==============================================================================
// Frame Adapter
// ==============================================================================

/// Presents an axum socket as a stream/sink of engine frames.
struct AxumFrames {
    socket: WebSocket,
}

fn transport_error(err: axum::Error) -> TransportError {
    TransportError::Io(err.to_string())
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(data) => Frame::Ping(data.to_vec()),
        Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

impl Stream for AxumFrames {
    type Item = Result<Frame, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.socket
            .poll_next_unpin(cx)
            .map(|next| next.map(|result| result.map(from_message).map_err(transport_error)))
    }
}

impl Sink<Frame> for AxumFrames {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_ready_unpin(cx).map_err(transport_error)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<(), Self::Error> {
        self.socket
            .start_send_unpin(into_message(frame))
            .map_err(transport_error)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_flush_unpin(cx).map_err(transport_error)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_close_unpin(cx).map_err(transport_error)
    }
}
