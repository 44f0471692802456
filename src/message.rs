//! Message protocol definitions
//!
//! A single JSON shape is used for everything that crosses the WebSocket in
//! either direction. Routing is carried by the message itself: an empty `to`
//! set means "broadcast to the room", a non-empty one targets those clients
//! only, and `omit` is subtracted in both cases.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ChatError;
use crate::types::Id;

/// Message kind
///
/// Closed set; an unknown `type` string is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Server-originated hint, e.g. refetch keys
    System,
    /// Private greeting sent to a client right after it registers
    Connect,
    /// Ordinary chat text
    Chat,
    /// Chat text addressed to specific clients
    DirectMessage,
    /// Server-written chat line (join/leave notices)
    SystemChat,
}

impl MessageType {
    /// Whether clients are allowed to send this kind
    pub fn is_client_sendable(self) -> bool {
        matches!(self, MessageType::Chat | MessageType::DirectMessage)
    }
}

/// Wire message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: Id,
    /// Always overwritten with the owning room for inbound frames
    #[serde(rename = "roomID", default)]
    pub room_id: Id,
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Id>,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Id>,
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub to: BTreeSet<Id>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub omit: BTreeSet<Id>,
    #[serde(rename = "refetch", default, skip_serializing_if = "Vec::is_empty")]
    pub refetch_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `"payload": null` decodes as `Some(Value::Null)`, distinct from absent
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Message {
    /// Create an empty broadcast message of the given kind for a room
    pub fn new(kind: MessageType, room_id: Id) -> Self {
        Self {
            id: Id::new(),
            room_id,
            client_id: None,
            user_id: None,
            user_name: None,
            kind,
            to: BTreeSet::new(),
            omit: BTreeSet::new(),
            refetch_keys: Vec::new(),
            text: None,
            payload: None,
        }
    }

    /// Add a recipient, turning the message into a targeted one
    pub fn to(mut self, id: Id) -> Self {
        self.to.insert(id);
        self
    }

    /// Exclude a client from delivery
    pub fn omit(mut self, id: Id) -> Self {
        self.omit.insert(id);
        self
    }

    pub fn refetch<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refetch_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// True when the message goes to every member not in `omit`
    pub fn is_broadcast(&self) -> bool {
        self.to.is_empty()
    }

    /// Routing predicate for a single room member
    ///
    /// A broadcast never echoes back to its sender; a client only receives
    /// its own message when it lists itself in `to`.
    pub fn is_addressed_to(&self, client_id: &Id) -> bool {
        if self.omit.contains(client_id) {
            return false;
        }
        if self.is_broadcast() {
            return self.client_id.as_ref() != Some(client_id);
        }
        self.to.contains(client_id)
    }

    /// Check a decoded client frame before it is forwarded to the room
    pub fn validate_inbound(&self) -> Result<(), ChatError> {
        if !self.kind.is_client_sendable() {
            return Err(ChatError::InvalidMessage(format!(
                "clients may not send {:?} messages",
                self.kind
            )));
        }
        if self.kind == MessageType::DirectMessage && self.to.is_empty() {
            return Err(ChatError::InvalidMessage(
                "direct_message needs at least one recipient".to_string(),
            ));
        }
        Ok(())
    }
}

/// Public view of a room member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: Id,
    #[serde(rename = "userID")]
    pub user_id: Id,
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Id {
        Id::parse(raw).unwrap()
    }

    #[test]
    fn test_message_deserialize_minimal_chat() {
        let json = r#"{"type": "chat", "text": "hi"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageType::Chat);
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert!(msg.is_broadcast());
        assert!(msg.omit.is_empty());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = r#"{"id": "m1", "roomID": "r1", "type": "refetch"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());

        let json = r#"{"id": "m1", "roomID": "r1"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_every_type_round_trips() {
        let kinds = [
            MessageType::System,
            MessageType::Connect,
            MessageType::Chat,
            MessageType::DirectMessage,
            MessageType::SystemChat,
        ];
        for kind in kinds {
            let mut msg = Message::new(kind, id("r1"))
                .to(id("a"))
                .omit(id("b"))
                .refetch(["room", "rooms"])
                .text("hello")
                .payload(serde_json::json!({"client": {"id": "a"}}));
            msg.client_id = Some(id("c"));
            msg.user_id = Some(id("u"));
            msg.user_name = Some("Alice".to_string());

            let json = serde_json::to_string(&msg).unwrap();
            let back: Message = serde_json::from_str(&json).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn test_wire_field_names() {
        let mut msg = Message::new(MessageType::DirectMessage, id("r1"))
            .to(id("b"))
            .refetch(["room"]);
        msg.client_id = Some(id("a"));
        msg.user_name = Some("Alice".to_string());

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"direct_message\""));
        assert!(json.contains("\"roomID\":\"r1\""));
        assert!(json.contains("\"clientID\":\"a\""));
        assert!(json.contains("\"userName\":\"Alice\""));
        assert!(json.contains("\"to\":[\"b\"]"));
        assert!(json.contains("\"refetch\":[\"room\"]"));
        assert!(!json.contains("omit"));
        assert!(!json.contains("payload"));
    }

    #[test]
    fn test_routing_predicate() {
        let broadcast = Message::new(MessageType::Chat, id("r1")).omit(id("x"));
        assert!(broadcast.is_addressed_to(&id("y")));
        assert!(!broadcast.is_addressed_to(&id("x")));

        let targeted = Message::new(MessageType::DirectMessage, id("r1"))
            .to(id("y"))
            .to(id("x"))
            .omit(id("x"));
        assert!(targeted.is_addressed_to(&id("y")));
        assert!(!targeted.is_addressed_to(&id("x")));
        assert!(!targeted.is_addressed_to(&id("z")));
    }

    #[test]
    fn test_validate_inbound() {
        assert!(Message::new(MessageType::Chat, id("r1")).validate_inbound().is_ok());
        assert!(Message::new(MessageType::DirectMessage, id("r1"))
            .to(id("b"))
            .validate_inbound()
            .is_ok());
        assert!(Message::new(MessageType::DirectMessage, id("r1"))
            .validate_inbound()
            .is_err());
        assert!(Message::new(MessageType::Connect, id("r1"))
            .validate_inbound()
            .is_err());
        assert!(Message::new(MessageType::SystemChat, id("r1"))
            .validate_inbound()
            .is_err());
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let mut msg = Message::new(MessageType::Chat, id("r1"));
        msg.client_id = Some(id("a"));
        assert!(!msg.is_addressed_to(&id("a")));
        assert!(msg.is_addressed_to(&id("b")));

        // Listing yourself in `to` is an explicit opt-in.
        let msg = msg.to(id("a"));
        assert!(msg.is_addressed_to(&id("a")));
    }

    #[test]
    fn test_null_payload_round_trips() {
        let msg = Message::new(MessageType::System, id("r1")).payload(Value::Null);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"payload\":null"));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, Some(Value::Null));
        assert_eq!(back, msg);

        let absent: Message = serde_json::from_str(r#"{"type": "system"}"#).unwrap();
        assert_eq!(absent.payload, None);
    }
}
