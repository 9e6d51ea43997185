use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::types::Response;

/// Cheap, cloneable handle onto a live connection.
///
/// Registered functions receive one through their call context and use it to
/// push responses (subscription events) to the peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    remote_addr: Arc<str>,
    outbound: mpsc::Sender<Response>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub(crate) fn new(
        remote_addr: Arc<str>,
        outbound: mpsc::Sender<Response>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            remote_addr,
            outbound,
            cancel,
        }
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Queue a response, waiting for room if the queue is full.
    ///
    /// Returns `false` if the connection stopped before the response could
    /// be queued.
    pub async fn write_response(&self, response: Response) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.outbound.send(response) => sent.is_ok(),
        }
    }

    /// Queue a response without waiting.
    ///
    /// Returns `false` if the queue is full or the connection has stopped.
    pub fn try_write_response(&self, response: Response) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.outbound.try_send(response) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => false,
        }
    }

    /// A token cancelled when the connection stops. Long-running calls
    /// select on it to end with their connection.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask the connection to shut down. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
