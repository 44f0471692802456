//! Room query surface
//!
//! The Get room / List rooms / Rename room operations, expressed over a
//! `RoomDirectory`. Whatever routing layer serves them maps `ChatError`
//! to a response with `ChatError::status()`.

use futures_util::future::join_all;
use serde::Deserialize;
use tracing::warn;

use crate::directory::RoomDirectory;
use crate::error::ChatError;
use crate::room::RoomSnapshot;
use crate::types::Id;

/// Rename request body
///
/// Clients may post a whole room object; only `name` is read.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRoom {
    pub name: String,
}

/// Snapshot of one room
pub async fn get_room(directory: &RoomDirectory, room_id: &str) -> Result<RoomSnapshot, ChatError> {
    let id = Id::parse(room_id)?;
    let room = directory
        .get(&id)
        .await
        .ok_or_else(|| ChatError::RoomNotFound(id.to_string()))?;
    room.snapshot().await
}

/// Snapshots of every known room, ordered by id
///
/// Rooms that fail to answer in time are left out of the listing.
pub async fn list_rooms(directory: &RoomDirectory) -> Vec<RoomSnapshot> {
    let rooms = directory.list_all().await;
    let results = join_all(rooms.iter().map(|room| room.snapshot())).await;

    rooms
        .iter()
        .zip(results)
        .filter_map(|(room, result)| match result {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Skipping room {} in listing: {}", room.id(), e);
                None
            }
        })
        .collect()
}

/// Rename an existing room and return its new snapshot
pub async fn rename_room(
    directory: &RoomDirectory,
    room_id: &str,
    request: RenameRoom,
) -> Result<RoomSnapshot, ChatError> {
    let id = Id::parse(room_id)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ChatError::InvalidName);
    }

    let room = directory
        .get(&id)
        .await
        .ok_or_else(|| ChatError::RoomNotFound(id.to_string()))?;
    room.rename(name.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::DEFAULT_ROOM_NAME;

    fn id(raw: &str) -> Id {
        Id::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_get_room() {
        let directory = RoomDirectory::default();
        directory.get_or_create(&id("7")).await;

        let snapshot = get_room(&directory, "7").await.unwrap();
        assert_eq!(snapshot.id, id("7"));
        assert_eq!(snapshot.name, DEFAULT_ROOM_NAME);
        assert!(snapshot.clients.is_empty());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["id"], "7");
        assert!(json["clients"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_room_errors() {
        let directory = RoomDirectory::default();
        assert!(matches!(
            get_room(&directory, "missing").await,
            Err(ChatError::RoomNotFound(_))
        ));
        assert!(matches!(
            get_room(&directory, "not valid").await,
            Err(ChatError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rooms() {
        let directory = RoomDirectory::default();
        assert!(list_rooms(&directory).await.is_empty());

        directory.get_or_create(&id("b")).await;
        directory.get_or_create(&id("a")).await;

        let ids: Vec<Id> = list_rooms(&directory).await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![id("a"), id("b")]);
    }

    #[tokio::test]
    async fn test_rename_room() {
        let directory = RoomDirectory::default();
        directory.get_or_create(&id("r1")).await;

        let body = r#"{"id": "r1", "name": "  Lounge ", "clients": []}"#;
        let request: RenameRoom = serde_json::from_str(body).unwrap();
        let snapshot = rename_room(&directory, "r1", request).await.unwrap();
        assert_eq!(snapshot.name, "Lounge");
        assert_eq!(get_room(&directory, "r1").await.unwrap().name, "Lounge");

        let blank = RenameRoom { name: "   ".to_string() };
        assert!(matches!(
            rename_room(&directory, "r1", blank).await,
            Err(ChatError::InvalidName)
        ));

        let unknown = RenameRoom { name: "x".to_string() };
        assert!(matches!(
            rename_room(&directory, "nope", unknown).await,
            Err(ChatError::RoomNotFound(_))
        ));
    }
}
