//! Room struct definition
//!
//! Represents a file-sharing room: its members, shared file metadata,
//! and where it stands in the empty/expired lifecycle.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ClientId, RoomCode};

/// Metadata for a file shared within a room
///
/// Immutable once added. The bytes themselves live elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub added_by: ClientId,
    pub added_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Create metadata stamped with the current time
    pub fn new(name: String, size: u64, added_by: ClientId) -> Self {
        Self {
            name,
            size,
            added_by,
            added_at: Utc::now(),
        }
    }
}

/// Where a room stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// At least one member
    Active,
    /// No members since the given instant
    Empty { since: Instant },
    /// Removed from the registry; the code may be reissued
    Expired,
}

/// File-sharing room
///
/// Owned by the registry. Members are a true set keyed by connection id.
#[derive(Debug)]
pub struct Room {
    /// Room code for identification
    pub code: RoomCode,
    /// Room creation time
    pub created_at: Instant,
    files: Vec<FileMetadata>,
    members: HashSet<ClientId>,
    lifecycle: Lifecycle,
}

impl Room {
    /// Create a new room; it starts out empty
    pub fn new(code: RoomCode) -> Self {
        let now = Instant::now();
        Self {
            code,
            created_at: now,
            files: Vec::new(),
            members: HashSet::new(),
            lifecycle: Lifecycle::Empty { since: now },
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_expired(&self) -> bool {
        self.lifecycle == Lifecycle::Expired
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Current members, in no particular order
    pub fn members(&self) -> Vec<ClientId> {
        self.members.iter().copied().collect()
    }

    /// Add a member
    ///
    /// Returns false if the client was already a member.
    pub fn add_member(&mut self, client_id: ClientId) -> bool {
        let inserted = self.members.insert(client_id);
        self.lifecycle = Lifecycle::Active;
        inserted
    }

    /// Remove a member
    ///
    /// Returns false if the client was not a member. The room becomes
    /// empty when the last member leaves.
    pub fn remove_member(&mut self, client_id: ClientId) -> bool {
        let removed = self.members.remove(&client_id);
        if self.members.is_empty() && self.lifecycle == Lifecycle::Active {
            self.lifecycle = Lifecycle::Empty {
                since: Instant::now(),
            };
        }
        removed
    }

    /// Whether the room has been empty for at least `grace` as of `now`
    pub fn is_evictable(&self, now: Instant, grace: Duration) -> bool {
        match self.lifecycle {
            Lifecycle::Empty { since } => {
                self.members.is_empty() && now.saturating_duration_since(since) >= grace
            }
            Lifecycle::Active | Lifecycle::Expired => false,
        }
    }

    pub(crate) fn mark_expired(&mut self) {
        self.lifecycle = Lifecycle::Expired;
    }

    /// Append file metadata, preserving insertion order
    pub fn add_file(&mut self, file: FileMetadata) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[FileMetadata] {
        &self.files
    }
}
