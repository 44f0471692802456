//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `Id`: opaque identifier for rooms, clients, users and messages
//! - `ConnectionId`: process-unique number of a single WebSocket connection

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

/// Longest identifier accepted from outside the process
pub const MAX_ID_LEN: usize = 64;

/// Opaque identifier (newtype pattern)
///
/// Freshly generated ids are UUID v4 strings, but callers may also supply
/// their own (room ids from the URL path, client ids from the query string).
/// The wire form is the plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Create a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an externally supplied identifier
    ///
    /// Accepts 1 to 64 characters from `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ChatError::InvalidId(raw.to_string()))
        }
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Identifies one physical connection
///
/// Two connections may present the same client id; the connection number
/// tells them apart so one can never unregister the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection number
    pub fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generate a display name for users who did not supply one
pub fn guest_name() -> String {
    use rand::Rng;
    let suffix: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("guest-{}", suffix)
}
