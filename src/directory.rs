//! Room directory
//!
//! Registry of room id → running room actor. This map is the only structure
//! shared between concurrent callers, so it is the only place with a lock.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use crate::actor::{RoomActor, RoomHandle};
use crate::config::Config;
use crate::types::Id;

/// Lazily populated set of rooms
///
/// Built once at startup and shared (`Arc`) with every connection handler.
/// Rooms are never removed; they live as long as the directory.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<Id, RoomHandle>>,
    config: Config,
}

impl RoomDirectory {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return the room for `id`, spawning its actor on first use
    ///
    /// At most one actor is ever spawned per id: a miss on the shared read
    /// path is re-checked under the write lock before spawning.
    pub async fn get_or_create(&self, id: &Id) -> RoomHandle {
        if let Some(room) = self.get(id).await {
            return room;
        }

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(id) {
            return room.clone();
        }

        let room = RoomActor::spawn(id.clone(), &self.config);
        rooms.insert(id.clone(), room.clone());
        info!("Created room {}, {} rooms total", id, rooms.len());
        room
    }

    pub async fn get(&self, id: &Id) -> Option<RoomHandle> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Handles to every known room, ordered by id
    pub async fn list_all(&self) -> Vec<RoomHandle> {
        let rooms = self.rooms.read().await;
        let mut handles: Vec<RoomHandle> = rooms.values().cloned().collect();
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        handles
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn id(raw: &str) -> Id {
        Id::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_room() {
        let directory = RoomDirectory::default();
        assert!(directory.is_empty().await);
        assert!(directory.get(&id("r1")).await.is_none());

        let first = directory.get_or_create(&id("r1")).await;
        let second = directory.get_or_create(&id("r1")).await;
        assert!(first.same_room(&second));
        assert_eq!(directory.len().await, 1);

        let other = directory.get_or_create(&id("r2")).await;
        assert!(!first.same_room(&other));
        assert_eq!(directory.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_spawns_once() {
        let directory = Arc::new(RoomDirectory::default());
        let room_id = id("brand-new");

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let directory = Arc::clone(&directory);
            let room_id = room_id.clone();
            tasks.push(tokio::spawn(async move {
                directory.get_or_create(&room_id).await
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(directory.len().await, 1);
        for handle in &handles {
            assert_eq!(handle.id(), &room_id);
            assert!(handle.same_room(&handles[0]));
        }
    }

    #[tokio::test]
    async fn test_list_all_sorted() {
        let directory = RoomDirectory::default();
        for raw in ["c", "a", "b"] {
            directory.get_or_create(&id(raw)).await;
        }

        let ids: Vec<String> = directory
            .list_all()
            .await
            .iter()
            .map(|room| room.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_zero_sized_channels_still_work() {
        let directory = RoomDirectory::new(Config {
            mailbox_capacity: 0,
            room_buffer: 0,
            ..Config::default()
        });

        let room = directory.get_or_create(&id("tiny")).await;
        let snapshot = room.snapshot().await.unwrap();
        assert!(snapshot.clients.is_empty());
    }

    #[tokio::test]
    async fn test_independent_directories() {
        let one = RoomDirectory::default();
        let two = RoomDirectory::default();
        one.get_or_create(&id("r1")).await;

        assert!(two.get(&id("r1")).await.is_none());
    }
}
