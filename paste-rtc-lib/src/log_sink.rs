use std::fmt;

use tracing::{error, info, warn};

use crate::connection::ConnectionState;

/// Everything the session reports to the operator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionEvent {
    ConnectionStateChanged(ConnectionState),
    ChannelCreated { label: String, id: u16 },
    ChannelOpened { label: String, id: u16 },
    ChannelClosed { label: String },
    Sending { label: String, message: String },
    Received { label: String, message: String },
    LocalDescriptionPublished,
    Copied { success: bool },
    Warning(String),
    Error(String),
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionStateChanged(state) => {
                write!(f, "Peer Connection State has changed: {}", state)?;
                match state {
                    ConnectionState::Failed => write!(f, " (session failed)"),
                    ConnectionState::Closed => write!(f, " (session closed)"),
                    _ => Ok(()),
                }
            }
            Self::ChannelCreated { label, id } => write!(f, "New DataChannel {} {}", label, id),
            Self::ChannelOpened { label, id } => write!(
                f,
                "Data channel '{}'-'{}' open. Random messages will now be sent periodically",
                label, id
            ),
            Self::ChannelClosed { label } => write!(f, "Data channel '{}' closed", label),
            Self::Sending { message, .. } => write!(f, "Sending '{}'", message),
            Self::Received { label, message } => {
                write!(f, "Message from DataChannel '{}': '{}'", label, message)
            }
            Self::LocalDescriptionPublished => write!(f, "Local description is ready"),
            Self::Copied { success: true } => write!(f, "Copying SDP was successful"),
            Self::Copied { success: false } => write!(f, "Copying SDP was unsuccessful"),
            Self::Warning(msg) | Self::Error(msg) => f.write_str(msg),
        }
    }
}

pub trait LogSink: Send + Sync {
    fn log(&self, event: SessionEvent);
}

/// Forwards session events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, event: SessionEvent) {
        match &event {
            SessionEvent::Error(_) | SessionEvent::Copied { success: false } => error!("{}", event),
            SessionEvent::Warning(_) => warn!("{}", event),
            SessionEvent::ConnectionStateChanged(state) if state.is_terminal() => {
                warn!("{}", event)
            }
            _ => info!("{}", event),
        }
    }
}
