//! Room state
//!
//! Membership, metadata and routing for one room. A `Room` is plain data
//! with synchronous methods; it is only ever touched from inside its own
//! actor task (see `actor`), so it needs no locking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::ChatError;
use crate::message::{ClientSummary, Message, MessageType};
use crate::types::{ConnectionId, Id};

/// Name given to rooms until someone renames them
pub const DEFAULT_ROOM_NAME: &str = "Untitled Room";

/// Refetch key for the current room's state
pub const REFETCH_ROOM: &str = "room";
/// Refetch key for the room list
pub const REFETCH_ROOMS: &str = "rooms";

/// Point-in-time copy of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: Id,
    pub name: String,
    /// Members in join order
    pub clients: Vec<ClientSummary>,
}

/// Chat room
#[derive(Debug)]
pub struct Room {
    pub id: Id,
    pub name: String,
    clients: HashMap<Id, Client>,
}

impl Room {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            name: DEFAULT_ROOM_NAME.to_string(),
            clients: HashMap::new(),
        }
    }

    /// Add a client keyed by its id
    ///
    /// An id that is already present is refused; the existing member is left
    /// alone and the rejected client is dropped by the caller.
    pub fn add_client(&mut self, client: Client) -> Result<(), ChatError> {
        if self.clients.contains_key(&client.id) {
            return Err(ChatError::DuplicateClient(client.id.to_string()));
        }
        self.clients.insert(client.id.clone(), client);
        Ok(())
    }

    /// Remove the client registered by `connection` under `id`
    ///
    /// Returns None if no such member exists, which makes unregistering
    /// idempotent. Dropping the returned client closes its mailbox.
    pub fn remove_client(&mut self, id: &Id, connection: ConnectionId) -> Option<Client> {
        match self.clients.get(id) {
            Some(client) if client.connection == connection => self.clients.remove(id),
            _ => None,
        }
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Route a message to its recipients
    ///
    /// Each push is non-blocking. Recipients whose mailbox is full or closed
    /// are removed from the room and returned so the caller can announce
    /// their departure. Absent recipients are skipped silently.
    pub fn deliver(&mut self, msg: &Message) -> Vec<Client> {
        let recipients: Vec<Id> = if msg.is_broadcast() {
            self.clients
                .keys()
                .filter(|id| msg.is_addressed_to(id))
                .cloned()
                .collect()
        } else {
            msg.to
                .iter()
                .filter(|id| msg.is_addressed_to(id) && self.clients.contains_key(*id))
                .cloned()
                .collect()
        };

        let mut evicted = Vec::new();
        for id in recipients {
            let Some(client) = self.clients.get(&id) else {
                continue;
            };
            if let Err(failure) = client.try_deliver(msg.clone()) {
                warn!(
                    "Evicting client {} from room {} ({:?} mailbox)",
                    id, self.id, failure
                );
                if let Some(client) = self.clients.remove(&id) {
                    evicted.push(client);
                }
            }
        }

        debug!("Message {} routed in room {}, {} evicted", msg.id, self.id, evicted.len());
        evicted
    }

    pub fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<&Client> = self.clients.values().collect();
        members.sort_by_key(|c| c.connection);

        RoomSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            clients: members.into_iter().map(Client::summary).collect(),
        }
    }

    /// Private greeting carrying the client's own identity
    pub fn connect_message(&self, client: &ClientSummary) -> Message {
        Message::new(MessageType::Connect, self.id.clone())
            .to(client.id.clone())
            .refetch([REFETCH_ROOM])
            .payload(json!(client))
    }

    /// Join notice for everyone except the newcomer
    pub fn join_notice(&self, client: &ClientSummary) -> Message {
        Message::new(MessageType::SystemChat, self.id.clone())
            .omit(client.id.clone())
            .refetch([REFETCH_ROOM])
            .text(format!("{} joined the room", client.user_name))
            .payload(json!({ "client": client }))
    }

    /// Leave notice for everyone except the departed client
    pub fn leave_notice(&self, client: &ClientSummary) -> Message {
        Message::new(MessageType::SystemChat, self.id.clone())
            .omit(client.id.clone())
            .refetch([REFETCH_ROOM])
            .text(format!("{} left the room", client.user_name))
            .payload(json!({ "client": client }))
    }

    /// Invalidation hint telling subscribers to re-pull derived state
    pub fn refetch_notice(&self, keys: &[&str]) -> Message {
        Message::new(MessageType::System, self.id.clone()).refetch(keys.iter().copied())
    }
}
