//! Multi-room WebSocket Chat Server Library
//!
//! A WebSocket chat server built with tokio-tungstenite where every room is
//! an actor that owns its membership exclusively.
//!
//! # Features
//! - Rooms created lazily on first connect (`/chat/rooms/{roomID}/ws`)
//! - Broadcast and targeted delivery (`to` / `omit`)
//! - Join/leave notices and refetch hints for room state
//! - Keepalive pings with a read deadline refreshed by pongs
//! - Slow consumers evicted instead of stalling the room
//! - Get/list/rename room queries with a bounded wait
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomActor` owns one room and processes its commands in order
//! - `RoomDirectory` maps room ids to actor handles (the only lock)
//! - Each connection runs an inbound and an outbound loop that talk to the
//!   room through its `RoomHandle` and a bounded mailbox
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use room_chat::{handle_connection, Config, RoomDirectory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let directory = Arc::new(RoomDirectory::new(Config::default()));
//!     let listener = TcpListener::bind(&directory.config().addr).await.unwrap();
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, Arc::clone(&directory)));
//!     }
//! }
//! ```

pub mod actor;
pub mod api;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod types;

// Re-export main types for convenience
pub use actor::{RoomActor, RoomCommand, RoomHandle};
pub use api::{get_room, list_rooms, rename_room, RenameRoom};
pub use client::{Client, DeliveryFailure};
pub use config::Config;
pub use directory::RoomDirectory;
pub use error::ChatError;
pub use handler::{handle_connection, ConnectRequest};
pub use message::{ClientSummary, Message, MessageType};
pub use room::{Room, RoomSnapshot};
pub use types::{ConnectionId, Id};
