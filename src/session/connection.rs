//! Session Connections
//!
//! Write side of a live listener. Sends never block: each connection owns a
//! bounded outbox drained by its own writer task, so the registry can fan out
//! while holding its lock.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use log::debug;
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Frames a connection may queue before sends start failing
pub const OUTBOX_CAPACITY: usize = 64;

/// Per-session send failure during broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbox full")]
    Backlogged,

    #[error("connection closed")]
    Closed,
}

/// Failure while closing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("connection already closed")]
    AlreadyClosed,

    #[error("connection writer already gone")]
    WriterGone,
}

/// Outbound handle of one listener
pub trait Connection: Send + Sync {
    /// Queue an encoded message
    fn send(&self, payload: Arc<str>) -> Result<(), DeliveryError>;

    /// Close the underlying transport
    fn close(&self) -> Result<(), LifecycleError>;
}

/// WebSocket connection driven by a writer task
pub struct WsConnection {
    outbox: mpsc::Sender<Arc<str>>,
    /// Close switch - send to flush the outbox and close the socket
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl WsConnection {
    /// Spawn the writer task for a socket's write half
    pub fn spawn<S>(sink: S) -> Self
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
    {
        let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(write_loop(sink, outbox_rx, close_rx));

        Self {
            outbox,
            close_tx: Mutex::new(Some(close_tx)),
        }
    }
}

impl Connection for WsConnection {
    fn send(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.outbox.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self) -> Result<(), LifecycleError> {
        let close_tx = self.close_tx.lock().take().ok_or(LifecycleError::AlreadyClosed)?;
        close_tx.send(()).map_err(|_| LifecycleError::WriterGone)
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut outbox: mpsc::Receiver<Arc<str>>,
    mut close_rx: oneshot::Receiver<()>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    loop {
        tokio::select! {
            _ = &mut close_rx => {
                // flush what was queued before the close request
                while let Ok(payload) = outbox.try_recv() {
                    if sink.send(Message::Text(payload.to_string().into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            payload = outbox.recv() => {
                let Some(payload) = payload else { break };
                if let Err(e) = sink.send(Message::Text(payload.to_string().into())).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
            }
        }
    }

    outbox.close();
    let _ = sink.close().await;
}
