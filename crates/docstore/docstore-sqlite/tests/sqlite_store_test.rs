//! Integration tests for [`docstore_sqlite::SqliteDocumentStore`].
//!
//! Covers persistence across reopen, unique expression indexes, filtered
//! find/count/delete and aggregation against a temporary SQLite file.

use docstore_core::{DocumentStore, Filter, FindOptions, IndexModel, SortSpec, Stage, StoreError};
use docstore_sqlite::SqliteDocumentStore;
use serde_json::json;
use tempfile::TempDir;

async fn open(dir: &TempDir) -> SqliteDocumentStore {
    let path = dir.path().join("docs.db");
    SqliteDocumentStore::new(path.to_str().expect("utf-8 path"))
        .await
        .expect("Failed to open store")
}

/// **Test: Documents survive closing and reopening the database file.**
///
/// **Setup:** Insert two documents, drop the store.
/// **Action:** Reopen the same file and count.
/// **Expected:** Both documents are still there.
#[tokio::test]
async fn test_documents_persist_across_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    {
        let store = open(&dir).await;
        store.insert_one("messages", json!({"room": "a", "id": "1"})).await.unwrap();
        store.insert_one("messages", json!({"room": "a", "id": "2"})).await.unwrap();
    }

    let store = open(&dir).await;
    let count = store.count_documents("messages", &Filter::All).await.unwrap();
    assert_eq!(count, 2);
}

/// **Test: Unique compound index rejects a duplicate key within a collection.**
///
/// **Setup:** Unique index on (room desc, id asc).
/// **Action:** Insert (a, 1), (b, 1), then (a, 1) again; insert (a, 1) into another collection.
/// **Expected:** Third insert fails with `DuplicateKey`; the other collection is unaffected.
#[tokio::test]
async fn test_unique_index_rejects_duplicate() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir).await;

    let name = store
        .create_index("messages", IndexModel::new().desc("room").asc("id").unique(true))
        .await
        .expect("Failed to create index");
    assert_eq!(name, "room_-1_id_1");

    store.insert_one("messages", json!({"room": "a", "id": "1"})).await.unwrap();
    store.insert_one("messages", json!({"room": "b", "id": "1"})).await.unwrap();
    let err = store
        .insert_one("messages", json!({"room": "a", "id": "1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));

    store.insert_one("archive", json!({"room": "a", "id": "1"})).await.unwrap();
}

/// **Test: find combines SQL narrowing with regex evaluation, sorting and paging.**
///
/// **Setup:** Five documents in two rooms with increasing dates and array `from` fields.
/// **Action:** Find room `a` with a regex on `from.address`, sorted by date desc, limit 2.
/// **Expected:** Only room-`a` matches, newest first, two results.
#[tokio::test]
async fn test_find_with_regex_sort_and_limit() {
    let store = SqliteDocumentStore::in_memory().await.expect("Failed to open store");
    for i in 0..5 {
        let room = if i % 2 == 0 { "a" } else { "b" };
        store
            .insert_one(
                "messages",
                json!({
                    "room": room,
                    "id": i.to_string(),
                    "date": i * 1000,
                    "from": [{"name": "", "address": format!("quix-{}@quib.com", i)}]
                }),
            )
            .await
            .unwrap();
    }

    let filter = Filter::and(vec![
        Filter::eq("room", "a"),
        Filter::or(vec![Filter::regex("from.address", "quix-")]),
    ]);
    let found = store
        .find(
            "messages",
            &filter,
            FindOptions::new().sort(SortSpec::desc("date")).limit(2),
        )
        .await
        .unwrap();

    let ids: Vec<_> = found.iter().map(|d| d["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["4", "2"]);
    assert_eq!(store.count_documents("messages", &filter).await.unwrap(), 3);
}

/// **Test: delete_one removes a single document; delete_many removes the rest.**
#[tokio::test]
async fn test_delete_one_and_many() {
    let store = SqliteDocumentStore::in_memory().await.expect("Failed to open store");
    for id in ["1", "2", "3"] {
        store.insert_one("messages", json!({"room": "a", "id": id})).await.unwrap();
    }

    let room = Filter::eq("room", "a");
    assert_eq!(store.delete_one("messages", &room).await.unwrap(), 1);
    let first = store.find_one("messages", &room).await.unwrap().expect("one left");
    assert_eq!(first["id"], "2");

    assert_eq!(store.delete_many("messages", &room).await.unwrap(), 2);
    assert_eq!(store.delete_many("messages", &room).await.unwrap(), 0);
    assert!(store.find_one("messages", &room).await.unwrap().is_none());
}

/// **Test: Group-then-count aggregation tolerates an empty collection.**
#[tokio::test]
async fn test_aggregate_group_count() {
    let store = SqliteDocumentStore::in_memory().await.expect("Failed to open store");
    let pipeline = [
        Stage::Group { key: "room".to_string() },
        Stage::Count { into: "count".to_string() },
    ];
    assert!(store.aggregate("messages", &pipeline).await.unwrap().is_empty());

    for (room, id) in [("b", "1"), ("a", "1"), ("b", "2")] {
        store.insert_one("messages", json!({"room": room, "id": id})).await.unwrap();
    }
    let out = store.aggregate("messages", &pipeline).await.unwrap();
    assert_eq!(out, vec![json!({"count": 2})]);

    let rooms = store
        .aggregate(
            "messages",
            &[
                Stage::Group { key: "room".to_string() },
                Stage::Sort(SortSpec::asc("_id")),
            ],
        )
        .await
        .unwrap();
    assert_eq!(rooms, vec![json!({"_id": "a"}), json!({"_id": "b"})]);
}

/// **Test: Concurrent writers on one database file do not fail with a locked database.**
///
/// **Setup:** SQLite file store; 8 tasks, each owning a room.
/// **Action:** Each task repeatedly inserts, counts and clears its room.
/// **Expected:** Every call succeeds and each room ends with exactly one document.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir).await;

    let mut handles = Vec::new();
    for task in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let room = Filter::eq("room", format!("room-{}", task % 4));
            let mine = Filter::and(vec![room.clone(), Filter::eq("task", task)]);
            for i in 0..20 {
                store
                    .insert_one("messages", json!({"room": format!("room-{}", task % 4), "task": task, "i": i}))
                    .await?;
                store.count_documents("messages", &room).await?;
                if i % 5 == 4 {
                    store.delete_many("messages", &mine).await?;
                } else {
                    store.delete_one("messages", &mine).await?;
                }
            }
            store
                .insert_one("messages", json!({"room": format!("solo-{}", task), "task": task}))
                .await?;
            Ok::<_, StoreError>(())
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked").expect("store call failed");
    }

    for task in 0..8 {
        let solo = Filter::eq("room", format!("solo-{}", task));
        assert_eq!(store.count_documents("messages", &solo).await.unwrap(), 1);
    }
    let leftovers = Filter::regex("room", "^room-");
    assert_eq!(store.count_documents("messages", &leftovers).await.unwrap(), 0);
}

async fn seed_both() -> (SqliteDocumentStore, docstore_inmemory::InMemoryDocumentStore) {
    let sqlite = SqliteDocumentStore::in_memory().await.expect("Failed to open store");
    let memory = docstore_inmemory::InMemoryDocumentStore::new();
    let docs = [
        json!({"room": "b", "id": "1", "date": 3000, "from": [{"address": "quix-1@quib.com"}]}),
        json!({"room": "a", "id": "2", "date": 1000, "from": [{"address": "foo@quib.com"}]}),
        json!({"room": "a", "id": "3", "date": 5000, "from": [{"address": "quix-3@quib.com"}]}),
        json!({"room": "c", "id": "4", "date": 3000, "from": []}),
        json!({"room": "a", "id": "5", "from": [{"address": "quix-5@quib.com"}]}),
        json!({"id": "6", "date": 2000}),
        json!({"room": "a", "id": "7", "date": 5000, "from": [{"address": "bar@quib.com"}]}),
    ];
    for doc in docs {
        sqlite.insert_one("messages", doc.clone()).await.unwrap();
        memory.insert_one("messages", doc).await.unwrap();
    }
    (sqlite, memory)
}

/// **Test: Queries answered in SQL agree with the shared evaluator.**
///
/// **Setup:** Same seven documents in the SQLite and in-memory stores, with
/// a missing room, a missing date, and tied dates.
/// **Action:** Run counts, paged finds and group pipelines on both.
/// **Expected:** Identical results, including order.
#[tokio::test]
async fn test_sql_queries_match_evaluator() {
    let (sqlite, memory) = seed_both().await;

    let filters = [
        Filter::All,
        Filter::eq("room", "a"),
        Filter::eq("date", 3000),
        Filter::or(vec![Filter::eq("room", "b"), Filter::eq("room", "c")]),
        Filter::or(vec![]),
        Filter::and(vec![]),
        Filter::and(vec![Filter::eq("room", "a"), Filter::regex("from.address", "^quix")]),
        Filter::eq("from.address", "bar@quib.com"),
    ];
    let options = [
        FindOptions::new(),
        FindOptions::new().sort(SortSpec::desc("date")),
        FindOptions::new().sort(SortSpec::asc("date")).skip(1).limit(3),
        FindOptions::new().sort(SortSpec::desc("date")).skip(10),
        FindOptions::new().limit(0),
    ];
    for filter in &filters {
        assert_eq!(
            sqlite.count_documents("messages", filter).await.unwrap(),
            memory.count_documents("messages", filter).await.unwrap(),
            "count {:?}",
            filter
        );
        assert_eq!(
            sqlite.find_one("messages", filter).await.unwrap(),
            memory.find_one("messages", filter).await.unwrap(),
            "find_one {:?}",
            filter
        );
        for opts in &options {
            assert_eq!(
                sqlite.find("messages", filter, opts.clone()).await.unwrap(),
                memory.find("messages", filter, opts.clone()).await.unwrap(),
                "find {:?} {:?}",
                filter,
                opts
            );
        }
    }

    let group = || Stage::Group { key: "room".to_string() };
    let pipelines = [
        vec![group(), Stage::Count { into: "count".to_string() }],
        vec![group(), Stage::Sort(SortSpec::asc("_id"))],
        vec![group(), Stage::Sort(SortSpec::desc("_id")), Stage::Skip(1), Stage::Limit(2)],
        vec![group(), Stage::Sort(SortSpec::asc("_id")), Stage::Limit(2), Stage::Skip(1)],
        vec![
            Stage::Match(Filter::eq("date", 3000)),
            group(),
            Stage::Count { into: "n".to_string() },
        ],
        vec![
            Stage::Match(Filter::eq("room", "zzz")),
            group(),
            Stage::Count { into: "n".to_string() },
        ],
    ];
    for pipeline in &pipelines {
        assert_eq!(
            sqlite.aggregate("messages", pipeline).await.unwrap(),
            memory.aggregate("messages", pipeline).await.unwrap(),
            "aggregate {:?}",
            pipeline
        );
    }
}

/// **Test: Deletes with regex clauses remove exactly the matching documents.**
#[tokio::test]
async fn test_delete_with_regex_filter() {
    let (sqlite, _) = seed_both().await;
    let quix = Filter::and(vec![Filter::eq("room", "a"), Filter::regex("from.address", "^quix")]);

    assert_eq!(sqlite.delete_one("messages", &quix).await.unwrap(), 1);
    let left = sqlite.find_one("messages", &quix).await.unwrap().expect("one left");
    assert_eq!(left["id"], "5");

    assert_eq!(sqlite.delete_many("messages", &quix).await.unwrap(), 1);
    assert_eq!(sqlite.delete_many("messages", &quix).await.unwrap(), 0);
    assert_eq!(sqlite.count_documents("messages", &Filter::eq("room", "a")).await.unwrap(), 2);
}
