//! Unit tests for RoomsRepo.

use crate::models::CapturedMessage;
use crate::room::RoomKey;
use crate::storage::MessageStorage;
use crate::test_helpers::storage_with_limit;

const ROOM: &str = "foo_bar";

/// Fifteen rooms `foo_bar0` .. `foo_bar14`, two messages each.
async fn seed_rooms(storage: &MessageStorage) {
    for i in 0..15 {
        let repo = storage.messages_repo(&format!("{}{}", ROOM, i));
        repo.store(&CapturedMessage::new(i.to_string()))
            .await
            .expect("Failed to store message");
        repo.store(&CapturedMessage::new((i + 1).to_string()))
            .await
            .expect("Failed to store message");
    }
}

#[tokio::test]
async fn test_count() {
    let (storage, _) = storage_with_limit(100).await;
    seed_rooms(&storage).await;

    let count = storage.rooms_repo().count().await.expect("Failed to count rooms");
    assert_eq!(count, 15);
}

#[tokio::test]
async fn test_count_empty_store() {
    let (storage, _) = storage_with_limit(100).await;
    assert_eq!(storage.rooms_repo().count().await.unwrap(), 0);
    assert!(storage.rooms_repo().list(0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete() {
    let (storage, store) = storage_with_limit(100).await;
    seed_rooms(&storage).await;
    let rooms = storage.rooms_repo();

    for i in [1, 4, 7] {
        let removed = rooms
            .delete(&format!("{}{}", ROOM, i))
            .await
            .expect("Failed to delete room");
        assert_eq!(removed, 2);
    }

    assert_eq!(rooms.count().await.unwrap(), 12);
    assert_eq!(store.len("messages").await, 24);
}

#[tokio::test]
async fn test_delete_missing_room_is_ok() {
    let (storage, _) = storage_with_limit(100).await;
    seed_rooms(&storage).await;

    let removed = storage.rooms_repo().delete("no_such_room").await.unwrap();
    assert_eq!(removed, 0);
    assert_eq!(storage.rooms_repo().count().await.unwrap(), 15);
}

#[tokio::test]
async fn test_delete_default_room() {
    let (storage, _) = storage_with_limit(100).await;
    storage
        .messages_repo("")
        .store(&CapturedMessage::new("1"))
        .await
        .unwrap();
    storage
        .messages_repo("kept")
        .store(&CapturedMessage::new("1"))
        .await
        .unwrap();

    assert_eq!(storage.rooms_repo().delete("").await.unwrap(), 1);
    let rooms = storage.rooms_repo().list(0, 10).await.unwrap();
    assert_eq!(rooms, vec![RoomKey::from("kept")]);
}

/// Room keys sort as strings, so `foo_bar10` comes before `foo_bar2`.
#[tokio::test]
async fn test_list() {
    let (storage, _) = storage_with_limit(100).await;
    seed_rooms(&storage).await;

    let rooms = storage.rooms_repo().list(2, 6).await.expect("Failed to list rooms");
    let names: Vec<&str> = rooms.iter().map(RoomKey::as_str).collect();
    assert_eq!(
        names,
        vec!["foo_bar10", "foo_bar11", "foo_bar12", "foo_bar13", "foo_bar14", "foo_bar2"]
    );
}

#[tokio::test]
async fn test_list_paging_edges() {
    let (storage, _) = storage_with_limit(100).await;
    seed_rooms(&storage).await;
    let rooms = storage.rooms_repo();

    assert_eq!(rooms.list(0, 100).await.unwrap().len(), 15);
    assert_eq!(rooms.list(13, 100).await.unwrap().len(), 2);
    assert!(rooms.list(15, 10).await.unwrap().is_empty());
    assert!(rooms.list(0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_room_leaves_listing() {
    let (storage, _) = storage_with_limit(100).await;
    seed_rooms(&storage).await;
    let rooms = storage.rooms_repo();

    rooms.delete("foo_bar0").await.unwrap();
    let listed = rooms.list(0, 100).await.unwrap();
    assert_eq!(listed.len(), 14);
    assert!(!listed.contains(&RoomKey::from("foo_bar0")));
    assert_eq!(listed[0].as_str(), "foo_bar1");
}

#[tokio::test]
async fn test_per_call_timeout() {
    let store = crate::test_helpers::FlakyStore {
        delay: Some(std::time::Duration::from_millis(500)),
        ..Default::default()
    };
    let storage = MessageStorage::create(
        std::sync::Arc::new(store),
        crate::config::StorageConfig::default(),
    )
    .await
    .unwrap();

    let err = storage
        .rooms_repo()
        .with_timeout(std::time::Duration::from_millis(20))
        .count()
        .await
        .unwrap_err();
    assert!(matches!(err, crate::error::StorageError::Timeout(_)));
}
