//! Room Share Server Library
//!
//! A WebSocket server that coordinates short-lived file-sharing rooms:
//! it mints 6-character room codes, tracks which connections are in which
//! room, broadcasts member counts, and keeps per-room shared-file metadata.
//!
//! # Features
//! - Room creation with collision-checked 6-character codes
//! - Case-insensitive room joining, one room per connection
//! - Real-time presence counts pushed to every member
//! - Per-room shared-file registry in insertion order
//! - Grace-period eviction of abandoned rooms
//!
//! # Architecture
//! - `SessionCoordinator` receives every inbound event and drives the
//!   per-connection state machine
//! - `RoomRegistry` owns rooms; creation is serialized registry-wide, room
//!   mutation per room
//! - `MembershipTracker` moves connections between rooms and computes counts
//! - `BroadcastDispatcher` fans events out through a `Transport`
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use share_room_server::{Config, RoomServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     RoomServer::new(config).run(listener).await;
//! }
//! ```

pub mod client;
pub mod code;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod membership;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod sweeper;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use code::CodeGenerator;
pub use config::{Config, ConfigError};
pub use coordinator::{SessionCoordinator, SessionEvent};
pub use dispatcher::BroadcastDispatcher;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use membership::{JoinOutcome, MembershipTracker, PresenceUpdate, SessionState};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use registry::{RoomInfo, RoomRegistry};
pub use room::{FileMetadata, Lifecycle, Room};
pub use server::RoomServer;
pub use transport::{ChannelTransport, Transport};
pub use types::{ClientId, RoomCode};
