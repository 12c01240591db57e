use std::{io, string::FromUtf8Error};

use thiserror::Error;

use crate::signaling::SdpKind;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("signaling code is empty")]
    Empty,
    #[error("failed to parse signaling code: {reason}")]
    Malformed { reason: String },
    #[error("unmatched tag: <{open}></{close}>")]
    UnmatchedTag { open: String, close: String },
    #[error("unknown tag: {0}")]
    UnknownKind(String),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("corrupt compressed description: {0}")]
    Inflate(#[source] io::Error),
    #[error("description is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("invalid description json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to compress description: {0}")]
    Deflate(#[source] io::Error),
    #[error("failed to serialize description: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Session Description must not be empty")]
    EmptyRemoteDescription,
    #[error("expected an offer but got an {0}")]
    NotAnOffer(SdpKind),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("failed to set remote description: {0:#}")]
    SetRemoteDescription(#[source] anyhow::Error),
    #[error("failed to create answer: {0:#}")]
    CreateAnswer(#[source] anyhow::Error),
    #[error("failed to set local description: {0:#}")]
    SetLocalDescription(#[source] anyhow::Error),
    #[error("failed to get local description")]
    MissingLocalDescription,
}

#[derive(Debug, Error)]
#[error("failed to send on DataChannel '{label}': {source:#}")]
pub struct SendError {
    pub label: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("gathering gate was released more than once")]
pub struct GateMisuseError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error("an offer has already been answered in this session")]
    AlreadyNegotiated,
    #[error("signaling was cancelled by session teardown")]
    Cancelled,
    #[error("session has been terminated")]
    Terminated,
}

impl SessionError {
    /// Whether the operator may submit a fresh offer after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Decode(_) | Self::Encode(_) | Self::Negotiation(_)
        )
    }
}
