//! Client struct definition
//!
//! Represents a connected client's outbound channel as seen by the transport.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::RoomCode;

/// Connected client information
///
/// Holds the server → client message channel and the broadcast group the
/// client is currently subscribed to. The transport keys clients by id.
#[derive(Debug)]
pub struct Client {
    /// Server → Client message channel
    pub sender: mpsc::UnboundedSender<ServerMessage>,
    /// Subscribed broadcast group
    pub group: Option<RoomCode>,
}

impl Client {
    /// Create a new client around its sender channel
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            sender,
            group: None,
        }
    }

    /// Queue a message for this client
    ///
    /// Never blocks; returns an error if the channel is closed (client disconnected).
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.send(msg).map_err(|_| SendError::ChannelClosed)
    }
}
