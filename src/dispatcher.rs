//! Broadcast dispatcher
//!
//! Fans presence and file events out through the transport. Fire-and-forget:
//! nothing here retries, delivery failures belong to the transport.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::membership::PresenceUpdate;
use crate::message::ServerMessage;
use crate::transport::Transport;
use crate::types::{ClientId, RoomCode};

pub struct BroadcastDispatcher {
    transport: Arc<dyn Transport>,
    /// Highest presence sequence sent, one slot per room
    delivered: Mutex<HashMap<RoomCode, Arc<Mutex<u64>>>>,
}

impl BroadcastDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            delivered: Mutex::new(HashMap::new()),
        }
    }

    /// Send a room's member count to everyone in the room
    ///
    /// Updates are computed under the room lock but dispatched after it is
    /// released, so they can arrive here out of order. An update older than
    /// the last one sent for the room is superseded and dropped. Only the
    /// room's own slot is held while the transport sends.
    pub async fn broadcast_presence(&self, update: &PresenceUpdate) {
        let slot = self.slot(&update.room).await;
        let mut last = slot.lock().await;

        if update.seq <= *last {
            debug!(
                room = %update.room,
                seq = update.seq,
                latest = *last,
                "Superseded presence update dropped"
            );
            return;
        }
        *last = update.seq;

        let sent = self
            .transport
            .send_to_room(&update.room, ServerMessage::RoomUpdate { count: update.count })
            .await;
        debug!(room = %update.room, count = update.count, recipients = sent, "Presence broadcast");
    }

    /// Send a message to each of the given connections
    pub async fn send_to_each(&self, recipients: &[ClientId], message: ServerMessage) {
        for &client_id in recipients {
            self.send_to(client_id, message.clone()).await;
        }
        debug!(recipients = recipients.len(), "Message fanned out");
    }

    /// Send an error event to exactly one connection
    ///
    /// Errors without a client-facing form are only logged.
    pub async fn send_error(&self, client_id: ClientId, err: &AppError) {
        match ServerMessage::from_error(err) {
            Some(message) => self.send_to(client_id, message).await,
            None => warn!("Not reporting {} to {}", err, client_id),
        }
    }

    /// Send a message to exactly one connection
    pub async fn send_to(&self, client_id: ClientId, message: ServerMessage) {
        if let Err(e) = self.transport.send_to(client_id, message).await {
            warn!("Failed to deliver to {}: {}", client_id, e);
        }
    }

    /// Drop ordering state for rooms that no longer exist
    pub async fn forget(&self, rooms: &[RoomCode]) {
        let mut delivered = self.delivered.lock().await;
        for room in rooms {
            delivered.remove(room);
        }
    }

    async fn slot(&self, room: &RoomCode) -> Arc<Mutex<u64>> {
        let mut delivered = self.delivered.lock().await;
        Arc::clone(delivered.entry(room.clone()).or_default())
    }
}
