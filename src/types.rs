//! Basic type definitions for the room server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `RoomCode`: 6-character uppercase alphanumeric room code

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Number of characters in a room code
pub const CODE_LEN: usize = 6;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 issued by the transport layer on connect.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room code (6-character uppercase alphanumeric)
///
/// Always stored in uppercase; lookups are case-sensitive on that form.
/// Ordered so that two rooms can be locked in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate and normalize user input into a room code
    ///
    /// Surrounding whitespace is ignored and letters are uppercased.
    /// Anything that is not exactly six ASCII alphanumerics is rejected.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let trimmed = input.trim();
        let valid = trimmed.chars().count() == CODE_LEN
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric());

        if !valid {
            return Err(AppError::InvalidRoomCode(input.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Wrap a code produced by the generator (already uppercase)
    pub(crate) fn from_generated(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
