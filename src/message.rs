//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::room::FileMetadata;
use crate::types::RoomCode;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new room (does not join it)
    CreateRoom,
    /// Join an existing room by code
    JoinRoom { code: String },
    /// Register a shared file in the current room
    ShareFile { name: String, size: u64 },
    /// Re-request the current room's files
    ListFiles,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful, client ID issued
    Connected { client_id: String },
    /// Room created successfully
    RoomCreated { code: RoomCode },
    /// Room could not be created
    CreateFailed { message: String },
    /// Presence changed in the joined room
    RoomUpdate { count: usize },
    /// Files already shared in the room
    InitialFiles { files: Vec<FileMetadata> },
    /// A file was shared in the room
    FileAvailable { file: FileMetadata },
    /// Error occurred; clients reset their room state on receipt
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Non-existent room code
    RoomNotFound,
    /// Malformed room code
    InvalidRoomCode,
}

impl ServerMessage {
    /// Error event for a client-facing error
    ///
    /// Only join failures reach clients; everything else is logged, since
    /// any error event makes the client drop its room state.
    pub fn from_error(err: &AppError) -> Option<Self> {
        let (code, message) = match err {
            AppError::RoomNotFound(_) => (ErrorCode::RoomNotFound, "room not found"),
            AppError::InvalidRoomCode(_) => (ErrorCode::InvalidRoomCode, "invalid room code"),
            _ => return None,
        };
        Some(ServerMessage::Error {
            code,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "join_room", "code": "ab12cd"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::JoinRoom { code } => assert_eq!(code, "ab12cd"),
            _ => panic!("Wrong variant"),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "create_room"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom));
    }

    #[test]
    fn test_share_file_deserialize() {
        let json = r#"{"type": "share_file", "name": "notes.txt", "size": 512}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::ShareFile { name, size } => {
                assert_eq!(name, "notes.txt");
                assert_eq!(size, 512);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type": "chat"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_room_update_serialize() {
        let json = serde_json::to_string(&ServerMessage::RoomUpdate { count: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"room_update","count":2}"#);
    }

    #[test]
    fn test_room_created_serialize() {
        let msg = ServerMessage::RoomCreated {
            code: RoomCode::parse("AB12CD").unwrap(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"room_created","code":"AB12CD"}"#);
    }

    #[test]
    fn test_file_available_serialize() {
        let file = FileMetadata::new("a.bin".into(), 7, ClientId::new());
        let value = serde_json::to_value(ServerMessage::FileAvailable { file }).unwrap();

        assert_eq!(value["type"], "file_available");
        assert_eq!(value["file"]["name"], "a.bin");
        assert_eq!(value["file"]["size"], 7);
        assert!(value["file"]["added_by"].is_string());
        assert!(value["file"]["added_at"].is_string());
    }

    #[test]
    fn test_room_not_found_message() {
        let err = AppError::RoomNotFound(RoomCode::parse("QQQQQQ").unwrap());
        let msg = ServerMessage::from_error(&err).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                code: ErrorCode::RoomNotFound,
                message: "room not found".to_string(),
            }
        );

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"room_not_found\""));
    }

    #[test]
    fn test_internal_errors_have_no_event() {
        assert!(ServerMessage::from_error(&AppError::NotInRoom).is_none());
        assert!(ServerMessage::from_error(&AppError::EmptyFileName).is_none());
        assert!(ServerMessage::from_error(&AppError::ConnectionClosed).is_none());
        assert!(ServerMessage::from_error(&AppError::CodeSpaceExhausted { attempts: 3 }).is_none());
    }
}
