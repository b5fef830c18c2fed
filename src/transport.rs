//! Transport seam
//!
//! The core only needs "send to one connection", "send to everyone in a
//! room's broadcast group" and group subscription. `ChannelTransport` is the
//! in-process implementation backing the WebSocket handler: each connection
//! owns an unbounded mpsc receiver drained by its writer task.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomCode};

/// Delivery primitives the core relies on
///
/// Implementations must not perform blocking I/O in these calls; they are
/// invoked while room state is locked.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Add a connection to a room's broadcast group
    async fn subscribe(&self, client_id: ClientId, room: &RoomCode);

    /// Remove a connection from a room's broadcast group
    async fn unsubscribe(&self, client_id: ClientId, room: &RoomCode);

    /// Deliver a message to exactly one connection
    async fn send_to(&self, client_id: ClientId, message: ServerMessage) -> Result<(), SendError>;

    /// Deliver a message to every connection in a room's broadcast group
    ///
    /// Returns the number of connections the message was queued for.
    async fn send_to_room(&self, room: &RoomCode, message: ServerMessage) -> usize;
}

/// Channel-backed transport
#[derive(Default)]
pub struct ChannelTransport {
    clients: RwLock<HashMap<ClientId, Client>>,
    groups: RwLock<HashMap<RoomCode, HashSet<ClientId>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection's outbound channel
    pub async fn register(&self, client_id: ClientId, sender: mpsc::UnboundedSender<ServerMessage>) {
        let mut clients = self.clients.write().await;
        clients.insert(client_id, Client::new(sender));
        debug!("Transport registered {} ({} total)", client_id, clients.len());
    }

    /// Drop a connection and its group subscription
    pub async fn deregister(&self, client_id: ClientId) {
        let removed = self.clients.write().await.remove(&client_id);
        if let Some(group) = removed.and_then(|c| c.group) {
            self.remove_from_group(client_id, &group).await;
        }
    }

    /// Number of registered connections
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Members of a room's broadcast group
    pub async fn group_members(&self, room: &RoomCode) -> HashSet<ClientId> {
        self.groups
            .read()
            .await
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    async fn remove_from_group(&self, client_id: ClientId, room: &RoomCode) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(room) {
            members.remove(&client_id);
            if members.is_empty() {
                groups.remove(room);
            }
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn subscribe(&self, client_id: ClientId, room: &RoomCode) {
        let previous = {
            let mut clients = self.clients.write().await;
            match clients.get_mut(&client_id) {
                Some(client) => client.group.replace(room.clone()),
                None => {
                    debug!("Subscribe for unknown client {}", client_id);
                    return;
                }
            }
        };

        if let Some(previous) = previous.filter(|p| p != room) {
            self.remove_from_group(client_id, &previous).await;
        }

        self.groups
            .write()
            .await
            .entry(room.clone())
            .or_default()
            .insert(client_id);
    }

    async fn unsubscribe(&self, client_id: ClientId, room: &RoomCode) {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            if client.group.as_ref() == Some(room) {
                client.group = None;
            }
        }
        self.remove_from_group(client_id, room).await;
    }

    async fn send_to(&self, client_id: ClientId, message: ServerMessage) -> Result<(), SendError> {
        let result = match self.clients.read().await.get(&client_id) {
            Some(client) => client.send(message),
            None => return Err(SendError::UnknownClient),
        };

        if result.is_err() {
            warn!("Delivery to {} failed, dropping connection", client_id);
            self.deregister(client_id).await;
        }
        result
    }

    async fn send_to_room(&self, room: &RoomCode, message: ServerMessage) -> usize {
        let members = self.group_members(room).await;
        let mut delivered = 0;
        let mut unreachable = Vec::new();

        {
            let clients = self.clients.read().await;
            for client_id in members {
                match clients.get(&client_id).map(|c| c.send(message.clone())) {
                    Some(Ok(())) => delivered += 1,
                    _ => unreachable.push(client_id),
                }
            }
        }

        for client_id in unreachable {
            warn!("Delivery to {} in room {} failed, dropping connection", client_id, room);
            self.deregister(client_id).await;
            self.remove_from_group(client_id, room).await;
        }

        delivered
    }
}
