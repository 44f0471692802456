//! Room actor implementation
//!
//! One actor task per room owns the `Room` exclusively and processes
//! commands from a single mpsc channel, so every operation on a room is
//! totally ordered and membership needs no locks. Everything else talks to
//! the room through a cloneable `RoomHandle`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::Config;
use crate::error::ChatError;
use crate::message::Message;
use crate::room::{Room, RoomSnapshot, REFETCH_ROOM, REFETCH_ROOMS};
use crate::types::{ConnectionId, Id};

/// Commands sent to a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a client to the room
    Register { client: Client },
    /// Remove a client; no-op if it is not (or no longer) a member
    Unregister {
        client_id: Id,
        connection: ConnectionId,
    },
    /// Route a message to room members
    Dispatch { message: Message },
    /// Take a snapshot of the room
    Query { reply: oneshot::Sender<RoomSnapshot> },
    /// Change the room name, reply with the new snapshot
    Rename {
        name: String,
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// The per-room actor
pub struct RoomActor {
    room: Room,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    pub fn new(id: Id, receiver: mpsc::Receiver<RoomCommand>) -> Self {
        Self {
            room: Room::new(id),
            receiver,
        }
    }

    /// Create the command channel, spawn the actor task and return its handle
    pub fn spawn(id: Id, config: &Config) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(config.room_bound());
        let actor = RoomActor::new(id.clone(), receiver);
        tokio::spawn(actor.run());

        RoomHandle {
            id,
            sender,
            query_timeout: config.query_timeout,
        }
    }

    /// Run the room event loop
    ///
    /// Continuously receives and processes commands until all handles are
    /// dropped. A failing command is logged and never stops the loop.
    pub async fn run(mut self) {
        info!("Room {} started", self.room.id);

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Room {} shutting down", self.room.id);
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Register { client } => self.handle_register(client),
            RoomCommand::Unregister {
                client_id,
                connection,
            } => self.handle_unregister(&client_id, connection),
            RoomCommand::Dispatch { message } => self.route(message),
            RoomCommand::Query { reply } => {
                if reply.send(self.room.snapshot()).is_err() {
                    debug!("Query caller for room {} went away", self.room.id);
                }
            }
            RoomCommand::Rename { name, reply } => self.handle_rename(name, reply),
        }
    }

    /// Handle a new member
    fn handle_register(&mut self, client: Client) {
        let summary = client.summary();
        let connection = client.connection;

        if let Err(e) = self.room.add_client(client) {
            warn!(
                "Rejected registration of {} (connection {}) in room {}: {}",
                summary.id, connection, self.room.id, e
            );
            return;
        }

        info!(
            "Client {} ({}) joined room {}, {} members",
            summary.id,
            summary.user_name,
            self.room.id,
            self.room.len()
        );

        let greeting = self.room.connect_message(&summary);
        let notice = self.room.join_notice(&summary);
        self.route(greeting);
        self.route(notice);
    }

    /// Handle a departing member
    fn handle_unregister(&mut self, client_id: &Id, connection: ConnectionId) {
        let Some(client) = self.room.remove_client(client_id, connection) else {
            debug!("Client {} not in room {}, nothing to unregister", client_id, self.room.id);
            return;
        };

        let summary = client.summary();
        drop(client);

        info!(
            "Client {} left room {}, {} members",
            summary.id,
            self.room.id,
            self.room.len()
        );

        let notice = self.room.leave_notice(&summary);
        self.route(notice);
    }

    /// Handle a rename: reply first, then tell subscribers to refetch
    fn handle_rename(&mut self, name: String, reply: oneshot::Sender<RoomSnapshot>) {
        info!("Room {} renamed to '{}'", self.room.id, name);
        self.room.rename(name);

        if reply.send(self.room.snapshot()).is_err() {
            debug!("Rename caller for room {} went away", self.room.id);
        }

        let hint = self.room.refetch_notice(&[REFETCH_ROOM, REFETCH_ROOMS]);
        self.route(hint);
    }

    /// Deliver a message, then announce every eviction it caused
    ///
    /// Leave notices may evict further clients; the queue drains because
    /// every eviction shrinks the membership.
    fn route(&mut self, message: Message) {
        let mut pending = VecDeque::from([message]);

        while let Some(msg) = pending.pop_front() {
            for evicted in self.room.deliver(&msg) {
                let summary = evicted.summary();
                drop(evicted);
                pending.push_back(self.room.leave_notice(&summary));
            }
        }
    }
}

/// Cloneable reference to a running room actor
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: Id,
    sender: mpsc::Sender<RoomCommand>,
    query_timeout: Duration,
}

impl RoomHandle {
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Whether both handles refer to the same actor
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), ChatError> {
        self.sender.send(cmd).await.map_err(|_| ChatError::RoomClosed)
    }

    pub async fn register(&self, client: Client) -> Result<(), ChatError> {
        self.send(RoomCommand::Register { client }).await
    }

    pub async fn unregister(&self, client_id: Id, connection: ConnectionId) -> Result<(), ChatError> {
        self.send(RoomCommand::Unregister {
            client_id,
            connection,
        })
        .await
    }

    /// Enqueue an unregister without waiting
    ///
    /// Used from synchronous cleanup; if the command channel is full the
    /// send is moved onto a task of its own.
    pub fn unregister_later(&self, client_id: Id, connection: ConnectionId) {
        let cmd = RoomCommand::Unregister {
            client_id,
            connection,
        };
        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    let _ = sender.send(cmd).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Room {} closed before unregister", self.id);
            }
        }
    }

    pub async fn dispatch(&self, message: Message) -> Result<(), ChatError> {
        self.send(RoomCommand::Dispatch { message }).await
    }

    /// Snapshot of the room, bounded by the query timeout
    pub async fn snapshot(&self) -> Result<RoomSnapshot, ChatError> {
        let (reply, response) = oneshot::channel();
        self.request(RoomCommand::Query { reply }, response).await
    }

    /// Rename the room, bounded by the query timeout
    pub async fn rename(&self, name: String) -> Result<RoomSnapshot, ChatError> {
        let (reply, response) = oneshot::channel();
        self.request(RoomCommand::Rename { name, reply }, response)
            .await
    }

    async fn request(
        &self,
        cmd: RoomCommand,
        response: oneshot::Receiver<RoomSnapshot>,
    ) -> Result<RoomSnapshot, ChatError> {
        let exchange = async {
            self.send(cmd).await?;
            response.await.map_err(|_| ChatError::RoomClosed)
        };

        match timeout(self.query_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Room {} did not answer within {:?}", self.id, self.query_timeout);
                Err(ChatError::QueryTimeout)
            }
        }
    }
}
