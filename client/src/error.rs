//! Error types for the client library.

use shared::{PlayerId, ProtocolError};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Connection-level failures
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The channel closed while a handshake step was still waiting for its reply
    #[error("connection closed before {0} completed")]
    ClosedBeforeCompletion(&'static str),

    #[error("connection closed")]
    ConnectionClosed,
}

/// Voice subsystem failures. None of these stop gameplay.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    /// Microphone access was refused or no capture device exists
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("voice handshake closed before completion")]
    ClosedBeforeCompletion,

    #[error("no voice connection for {0}")]
    UnknownPeer(PlayerId),
}
