//! Room registry
//!
//! Owns every live room. Creation holds the registry write lock across
//! "generate free code + insert"; everything else takes the read lock just
//! long enough to clone the room handle, then works under the room's own lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::code::CodeGenerator;
use crate::error::AppError;
use crate::room::{FileMetadata, Room};
use crate::types::{ClientId, RoomCode};

/// Shared handle to a single room
pub type RoomHandle = Arc<Mutex<Room>>;

/// Point-in-time view of a room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub created_at: Instant,
    pub member_count: usize,
    pub files: Vec<FileMetadata>,
}

impl RoomInfo {
    fn of(room: &Room) -> Self {
        Self {
            code: room.code.clone(),
            created_at: room.created_at,
            member_count: room.member_count(),
            files: room.files().to_vec(),
        }
    }
}

/// Registry of live rooms
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    generator: CodeGenerator,
    grace_period: Duration,
}

impl RoomRegistry {
    pub fn new(generator: CodeGenerator, grace_period: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            generator,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Allocate a fresh code and insert an empty room under it
    pub async fn create_room(&self) -> Result<RoomInfo, AppError> {
        let mut rooms = self.rooms.write().await;
        let code = self.generator.generate(|c| rooms.contains_key(c))?;

        let room = Room::new(code.clone());
        let info = RoomInfo::of(&room);
        rooms.insert(code.clone(), Arc::new(Mutex::new(room)));

        info!(room = %code, total_rooms = rooms.len(), "Room created");
        Ok(info)
    }

    /// Look up a live room
    pub async fn get_room(&self, code: &RoomCode) -> Result<RoomInfo, AppError> {
        let handle = self.handle(code).await?;
        let room = handle.lock().await;
        if room.is_expired() {
            return Err(AppError::RoomNotFound(code.clone()));
        }
        Ok(RoomInfo::of(&room))
    }

    /// Clone the handle of a live room
    ///
    /// The room may still expire before the caller locks it; callers must
    /// check `Room::is_expired` under the lock.
    pub(crate) async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, AppError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::RoomNotFound(code.clone()))
    }

    /// Append file metadata to a room
    ///
    /// Returns the members at the moment of the append. Anyone joining later
    /// finds the file in the room's snapshot instead.
    pub async fn add_file(
        &self,
        code: &RoomCode,
        file: FileMetadata,
    ) -> Result<Vec<ClientId>, AppError> {
        let handle = self.handle(code).await?;
        let mut room = handle.lock().await;
        if room.is_expired() {
            return Err(AppError::RoomNotFound(code.clone()));
        }

        debug!(room = %code, file = %file.name, size = file.size, "File added");
        room.add_file(file);
        Ok(room.members())
    }

    /// Snapshot of a room's files in insertion order
    pub async fn list_files(&self, code: &RoomCode) -> Result<Vec<FileMetadata>, AppError> {
        let handle = self.handle(code).await?;
        let room = handle.lock().await;
        if room.is_expired() {
            return Err(AppError::RoomNotFound(code.clone()));
        }
        Ok(room.files().to_vec())
    }

    /// Remove rooms that have been empty for the whole grace period as of `now`
    ///
    /// Emptiness is rechecked under each room's lock, so a room that gained a
    /// member during the grace period is kept. Returns the evicted codes.
    pub async fn evict_expired(&self, now: Instant) -> Vec<RoomCode> {
        let mut rooms = self.rooms.write().await;
        let mut evicted = Vec::new();

        for (code, handle) in rooms.iter() {
            let mut room = handle.lock().await;
            if room.is_evictable(now, self.grace_period) {
                room.mark_expired();
                evicted.push(code.clone());
            }
        }

        for code in &evicted {
            rooms.remove(code);
            info!(room = %code, "Room expired and removed");
        }

        if !evicted.is_empty() {
            debug!(
                evicted = evicted.len(),
                remaining = rooms.len(),
                "Sweep finished"
            );
        }

        evicted
    }

    /// Number of live rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
