pub mod coordinator;
pub mod data_channel;
pub mod gathering_gate;
pub mod peer_connection;

use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::signaling::SessionDescription;

pub use self::{
    coordinator::{ConnectionCoordinator, SignalingPhase},
    data_channel::{ChannelState, DataChannelSession},
    gathering_gate::GatheringGate,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// `Failed` and `Closed` end the session. `Disconnected` may still recover.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}

/// Events of a single data channel, in the order the engine reports them.
#[derive(Debug)]
pub enum ChannelEvent {
    Open,
    Message(Bytes),
    Error(String),
    Close,
}

/// Events of the peer connection as a whole.
pub enum EngineEvent {
    ConnectionStateChanged(ConnectionState),
    GatheringComplete,
    DataChannel {
        handle: Arc<dyn ChannelHandle>,
        events: mpsc::Receiver<ChannelEvent>,
    },
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionStateChanged(state) => {
                f.debug_tuple("ConnectionStateChanged").field(state).finish()
            }
            Self::GatheringComplete => f.write_str("GatheringComplete"),
            Self::DataChannel { handle, .. } => f
                .debug_struct("DataChannel")
                .field("label", &handle.label())
                .field("id", &handle.id())
                .finish_non_exhaustive(),
        }
    }
}

/// The offer/answer capability of the underlying transport.
#[async_trait]
pub trait PeerEngine: Send + Sync {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;
    async fn create_answer(&self) -> Result<SessionDescription>;
    /// Starts gathering. Completion is reported as [`EngineEvent::GatheringComplete`].
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;
    async fn local_description(&self) -> Option<SessionDescription>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait ChannelHandle: Send + Sync {
    fn label(&self) -> &str;
    fn id(&self) -> u16;
    async fn send_text(&self, text: String) -> Result<()>;
    async fn close(&self) -> Result<()>;
}
