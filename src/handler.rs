//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing, and bidirectional communication with the coordinator.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::coordinator::{SessionCoordinator, SessionEvent};
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::transport::ChannelTransport;
use crate::types::ClientId;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, registers the connection with the
/// transport and coordinator, and manages the connection lifecycle.
pub async fn handle_connection(
    stream: TcpStream,
    coordinator: Arc<SessionCoordinator>,
    transport: Arc<ChannelTransport>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate client ID
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Queue the greeting first so it precedes anything the coordinator sends
    msg_tx
        .send(ServerMessage::Connected {
            client_id: client_id.to_string(),
        })
        .map_err(|_| AppError::ChannelSend)?;

    transport.register(client_id, msg_tx).await;
    coordinator
        .handle_event(SessionEvent::Connect { client_id })
        .await;

    // Spawn read task (WebSocket -> SessionEvent)
    let read_coordinator = Arc::clone(&coordinator);
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        let event = client_message_to_event(client_id, client_msg);
                        read_coordinator.handle_event(event).await;
                    }
                    Err(e) => {
                        // Benign: an error event would reset the client
                        warn!("Invalid JSON from {}: {}", client_id, e);
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", client_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", client_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", client_id);
        }
    }

    // Disconnect is terminal: joins still in flight from the read task are
    // either undone here or rejected afterwards
    coordinator
        .handle_event(SessionEvent::Disconnect { client_id })
        .await;
    transport.deregister(client_id).await;

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Convert a ClientMessage to a SessionEvent
fn client_message_to_event(client_id: ClientId, msg: ClientMessage) -> SessionEvent {
    match msg {
        ClientMessage::CreateRoom => SessionEvent::CreateRoom { client_id },
        ClientMessage::JoinRoom { code } => SessionEvent::JoinRoom { client_id, code },
        ClientMessage::ShareFile { name, size } => SessionEvent::ShareFile {
            client_id,
            name,
            size,
        },
        ClientMessage::ListFiles => SessionEvent::ListFiles { client_id },
    }
}
