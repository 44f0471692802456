//! Client struct definition
//!
//! Represents a registered room member with its identity and the producer
//! half of its bounded outbound mailbox.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::message::{ClientSummary, Message};
use crate::types::{ConnectionId, Id};

/// Why a message could not be pushed into a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Mailbox at capacity (slow consumer)
    Full,
    /// Outbound loop has already gone away
    Closed,
}

/// Connected client information
///
/// Owned by the room actor once registered. Dropping it closes the mailbox,
/// which ends the connection's outbound loop.
#[derive(Debug)]
pub struct Client {
    /// Client identifier, unique within a room
    pub id: Id,
    /// Physical connection this client belongs to
    pub connection: ConnectionId,
    pub user_id: Id,
    pub user_name: String,
    /// Room → connection message channel
    mailbox: mpsc::Sender<Message>,
}

impl Client {
    pub fn new(
        id: Id,
        connection: ConnectionId,
        user_id: Id,
        user_name: String,
        mailbox: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            id,
            connection,
            user_id,
            user_name,
            mailbox,
        }
    }

    /// Push a message without waiting
    ///
    /// The room actor never blocks on a client; a failure here means the
    /// client must be evicted.
    pub fn try_deliver(&self, msg: Message) -> Result<(), DeliveryFailure> {
        self.mailbox.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Full,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        }
    }
}
