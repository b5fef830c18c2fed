//! Error types for the room server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::RoomCode;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// per-request errors (reported to the requesting connection).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// No live room holds the given code
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    /// Input is not a 6-character alphanumeric code
    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// No free code found within the retry budget
    #[error("Room code space exhausted after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },

    /// Client is not in any room
    #[error("Not in room")]
    NotInRoom,

    /// Shared file metadata without a name
    #[error("File name is empty")]
    EmptyFileName,

    /// The connection already disconnected
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// No connection is registered under the given id
    #[error("Unknown connection")]
    UnknownClient,
}
