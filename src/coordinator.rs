//! Session coordinator
//!
//! Entry point for every inbound action. Drives the per-connection state
//! machine (`Unjoined` → `Joined(code)` → closed) against the registry and
//! membership tracker, then decides what the dispatcher sends. Knows nothing
//! about sockets; the transport binding feeds it `SessionEvent`s.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::code::CodeGenerator;
use crate::config::Config;
use crate::dispatcher::BroadcastDispatcher;
use crate::error::AppError;
use crate::membership::{MembershipTracker, SessionState};
use crate::message::ServerMessage;
use crate::registry::RoomRegistry;
use crate::room::FileMetadata;
use crate::transport::Transport;
use crate::types::{ClientId, RoomCode};

/// Inbound events delivered by the transport binding
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// New client connected
    Connect { client_id: ClientId },
    /// Create a new room
    CreateRoom { client_id: ClientId },
    /// Join an existing room (raw user input)
    JoinRoom { client_id: ClientId, code: String },
    /// Register a shared file in the current room
    ShareFile {
        client_id: ClientId,
        name: String,
        size: u64,
    },
    /// Re-send the current room's files
    ListFiles { client_id: ClientId },
    /// Client disconnected
    Disconnect { client_id: ClientId },
}

pub struct SessionCoordinator {
    registry: Arc<RoomRegistry>,
    tracker: MembershipTracker,
    dispatcher: BroadcastDispatcher,
}

impl SessionCoordinator {
    /// Wire up a coordinator and its collaborators over the given transport
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let generator = CodeGenerator::new(config.code_attempts);
        let registry = Arc::new(RoomRegistry::new(generator, config.grace_period));
        Self::with_registry(registry, transport)
    }

    pub fn with_registry(registry: Arc<RoomRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            tracker: MembershipTracker::new(Arc::clone(&registry), Arc::clone(&transport)),
            dispatcher: BroadcastDispatcher::new(transport),
            registry,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Current state of a connection
    pub async fn session_state(&self, client_id: ClientId) -> SessionState {
        self.tracker.state(client_id).await
    }

    /// Process a single event
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connect { client_id } => {
                self.connect(client_id).await;
            }
            SessionEvent::CreateRoom { client_id } => {
                self.handle_create_room(client_id).await;
            }
            SessionEvent::JoinRoom { client_id, code } => {
                self.join(client_id, &code).await;
            }
            SessionEvent::ShareFile {
                client_id,
                name,
                size,
            } => {
                if let Err(e) = self.share_file(client_id, name, size).await {
                    // Benign: never reset a client over a stray share
                    warn!("Share from {} rejected: {}", client_id, e);
                }
            }
            SessionEvent::ListFiles { client_id } => {
                self.handle_list_files(client_id).await;
            }
            SessionEvent::Disconnect { client_id } => {
                self.disconnect(client_id).await;
            }
        }
    }

    /// Handle new client connection
    pub async fn connect(&self, client_id: ClientId) {
        self.tracker.register(client_id).await;
        debug!(
            "Client {} connected ({} tracked)",
            client_id,
            self.tracker.connection_count().await
        );
    }

    /// Create a room; the caller does not join it
    pub async fn create_room(&self) -> Result<RoomCode, AppError> {
        Ok(self.registry.create_room().await?.code)
    }

    async fn handle_create_room(&self, client_id: ClientId) {
        let reply = match self.create_room().await {
            Ok(code) => {
                info!("Client {} created room {}", client_id, code);
                ServerMessage::RoomCreated { code }
            }
            Err(e) => {
                warn!("Room creation for {} failed: {}", client_id, e);
                ServerMessage::CreateFailed {
                    message: e.to_string(),
                }
            }
        };
        self.dispatcher.send_to(client_id, reply).await;
    }

    /// Handle room joining
    ///
    /// Invalid or unknown codes get an error event to the caller only and
    /// leave every piece of state untouched.
    pub async fn join(&self, client_id: ClientId, raw_code: &str) {
        let code = match RoomCode::parse(raw_code) {
            Ok(code) => code,
            Err(e) => {
                debug!("Client {} sent invalid code {:?}", client_id, raw_code);
                self.dispatcher.send_error(client_id, &e).await;
                return;
            }
        };

        let outcome = match self.tracker.join(client_id, &code).await {
            Ok(outcome) => outcome,
            Err(AppError::ConnectionClosed) => {
                debug!("Join from closed connection {} discarded", client_id);
                return;
            }
            Err(e) => {
                info!("Client {} failed to join {}: {}", client_id, code, e);
                self.dispatcher.send_error(client_id, &e).await;
                return;
            }
        };

        if let Some(left) = &outcome.left {
            self.dispatcher.broadcast_presence(left).await;
        }
        self.dispatcher.broadcast_presence(&outcome.joined).await;

        // Taken with the membership change; later shares reach the client
        // as file_available instead
        self.dispatcher
            .send_to(
                client_id,
                ServerMessage::InitialFiles {
                    files: outcome.files,
                },
            )
            .await;
    }

    /// Register a shared file in the sender's current room and announce it
    pub async fn share_file(
        &self,
        client_id: ClientId,
        name: String,
        size: u64,
    ) -> Result<FileMetadata, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::EmptyFileName);
        }
        let code = self
            .tracker
            .room_of(client_id)
            .await
            .ok_or(AppError::NotInRoom)?;

        let file = FileMetadata::new(name, size, client_id);
        let recipients = self.registry.add_file(&code, file.clone()).await?;
        info!("Client {} shared '{}' in room {}", client_id, file.name, code);

        self.dispatcher
            .send_to_each(&recipients, ServerMessage::FileAvailable { file: file.clone() })
            .await;
        Ok(file)
    }

    /// Files shared in a room, in insertion order
    pub async fn list_files(&self, code: &RoomCode) -> Result<Vec<FileMetadata>, AppError> {
        self.registry.list_files(code).await
    }

    async fn handle_list_files(&self, client_id: ClientId) {
        let Some(code) = self.tracker.room_of(client_id).await else {
            debug!("List from unjoined client {} ignored", client_id);
            return;
        };

        match self.list_files(&code).await {
            Ok(files) => {
                self.dispatcher
                    .send_to(client_id, ServerMessage::InitialFiles { files })
                    .await;
            }
            Err(e) => debug!("No file list for {}: {}", code, e),
        }
    }

    /// Handle client disconnection
    pub async fn disconnect(&self, client_id: ClientId) {
        info!("Client {} disconnected", client_id);

        if let Some(update) = self.tracker.leave(client_id).await {
            self.dispatcher.broadcast_presence(&update).await;
        }
    }

    /// Evict rooms that stayed empty for the whole grace period
    pub async fn sweep_expired(&self, now: Instant) -> Vec<RoomCode> {
        let evicted = self.registry.evict_expired(now).await;
        if !evicted.is_empty() {
            self.dispatcher.forget(&evicted).await;
        }
        evicted
    }
}
