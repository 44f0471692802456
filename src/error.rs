//! Error types for the chat server
//!
//! Defines the application-level error taxonomy and its mapping to
//! HTTP-style status codes. Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Application-level errors
///
/// Transport and decode errors stay inside the connection pump; the rest are
/// returned to callers of the query surface.
#[derive(Debug, Error)]
pub enum ChatError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Identifier failed validation
    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    /// Decoded frame is well-formed but not allowed from a client
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Room name is empty after trimming
    #[error("Room name must not be empty")]
    InvalidName,

    /// Connect request did not match the expected path or query shape
    #[error("Invalid connect request: {0}")]
    InvalidConnect(String),

    /// Request path is not a chat endpoint
    #[error("No route for {0}")]
    UnknownRoute(String),

    /// No room with the given id
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// A client with this id is already registered in the room
    #[error("Client {0} is already registered")]
    DuplicateClient(String),

    /// The room actor did not answer within the query timeout
    #[error("Room query timed out")]
    QueryTimeout,

    /// The room actor is gone (command channel closed)
    #[error("Room actor closed")]
    RoomClosed,
}

impl ChatError {
    /// Status code reported at the HTTP boundary
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidId(_) | ChatError::InvalidName | ChatError::InvalidConnect(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::Json(_) | ChatError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            ChatError::RoomNotFound(_) | ChatError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ChatError::DuplicateClient(_) => StatusCode::CONFLICT,
            ChatError::QueryTimeout => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::WebSocket(_) | ChatError::Io(_) | ChatError::RoomClosed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ChatError::InvalidId("?".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ChatError::InvalidName.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ChatError::RoomNotFound("1".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ChatError::QueryTimeout.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ChatError::RoomClosed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
