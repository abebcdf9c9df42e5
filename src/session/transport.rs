//! Boundary between the session controller and the remote backend.
//!
//! A [`Transport`] performs the handshake and hands back a [`Connection`]:
//! an unbounded lane for text (never dropped), a bounded lane for capture
//! frames (dropped when full) and an inbound event stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::audio::AudioChunk;
use crate::capture::frame::ImageFrame;
use crate::error::Result;
use crate::session::model::SessionRequest;

/// Capacity of the capture-frame lane.
pub const FRAME_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPayload {
    Text(String),
    Audio(AudioChunk),
    Image(ImageFrame),
}

impl InputPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            InputPayload::Text(_) => "text",
            InputPayload::Audio(_) => "audio",
            InputPayload::Image(_) => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub id: u64,
    pub payload: InputPayload,
}

/// Cumulative snapshot of one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingDelta {
    pub response_id: u64,
    pub text: String,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Delta(StreamingDelta),
    Error(String),
    /// The text input with this id reached the backend.
    Acknowledged(u64),
    SendFailed { id: u64, message: String },
    Closed { reason: String },
}

pub struct Connection {
    pub text_tx: mpsc::UnboundedSender<Outbound>,
    pub frame_tx: mpsc::Sender<Outbound>,
    pub inbound: mpsc::Receiver<InboundEvent>,
}

/// Backend-facing half of a connection, held by the transport task.
pub struct ConnectionEnd {
    pub text_rx: mpsc::UnboundedReceiver<Outbound>,
    pub frame_rx: mpsc::Receiver<Outbound>,
    pub inbound_tx: mpsc::Sender<InboundEvent>,
}

/// Builds both halves of a connection.
pub fn connection_pair() -> (Connection, ConnectionEnd) {
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let (inbound_tx, inbound) = mpsc::channel(256);
    (
        Connection {
            text_tx,
            frame_tx,
            inbound,
        },
        ConnectionEnd {
            text_rx,
            frame_rx,
            inbound_tx,
        },
    )
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticates and opens a stream. Rejected credentials yield `StealthError::Auth`.
    async fn connect(&self, request: &SessionRequest) -> Result<Connection>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSend {
    Queued,
    Dropped,
}

/// Live attachment of the controller to one connection. Dropping the senders
/// tells the transport task to stop; aborting the pump stops event delivery.
pub struct Subscription {
    id: u64,
    text_tx: mpsc::UnboundedSender<Outbound>,
    frame_tx: mpsc::Sender<Outbound>,
    pump: JoinHandle<()>,
}

impl Subscription {
    /// Starts forwarding the connection's inbound events through `forward`,
    /// tagged with `id`.
    pub fn subscribe<F, Fut>(id: u64, connection: Connection, forward: F) -> Self
    where
        F: Fn(u64, InboundEvent) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        let Connection {
            text_tx,
            frame_tx,
            mut inbound,
        } = connection;
        let pump = tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                if !forward(id, event).await {
                    break;
                }
            }
        });
        Self {
            id,
            text_tx,
            frame_tx,
            pump,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send_text(&self, outbound: Outbound) -> std::result::Result<(), String> {
        self.text_tx
            .send(outbound)
            .map_err(|_| "connection closed".to_string())
    }

    pub fn send_frame(&self, outbound: Outbound) -> FrameSend {
        match self.frame_tx.try_send(outbound) {
            Ok(()) => FrameSend::Queued,
            Err(_) => FrameSend::Dropped,
        }
    }

    pub fn unsubscribe(self) {
        self.pump.abort();
    }
}
