mod common;

use common::{Fault, MemoryStore};
use dynamodb_mapper::{
    Error, Model, ModelConfig,
    common::{Attributes, batch::BatchOptions, retry::RetryPolicy},
    error::Unprocessed,
    model::schema::{Attribute, Schema},
    write::batch_write_item::BatchWriteRequest,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};

fn attributes(value: Value) -> Attributes {
    match value {
        Value::Object(attributes) => attributes,
        _ => unreachable!(),
    }
}

fn accounts(store: Arc<MemoryStore>) -> Arc<Model> {
    Model::new(
        "Account",
        ModelConfig {
            hash_key: "email".to_string(),
            schema: Schema::default()
                .attribute("email", Attribute::string().required())
                .attribute("age", Attribute::number()),
            retry: RetryPolicy::immediate(3),
            ..Default::default()
        },
        store,
    )
    .unwrap()
}

fn slow_retry() -> BatchOptions {
    BatchOptions {
        retry: Some(RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(20),
        }),
        ..Default::default()
    }
}

fn emails(count: usize) -> Vec<Attributes> {
    (0..count)
        .map(|index| attributes(json!({"email": format!("user{index}@example.com"), "age": index})))
        .collect()
}

#[tokio::test]
async fn test_batch_create_chunks_writes() {
    let store = Arc::new(MemoryStore::default().table("accounts", "email", None));
    let accounts = accounts(Arc::clone(&store));
    let created = accounts
        .batch_create(emails(60), BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(created.len(), 60);
    let mut sizes = store.request_sizes("batch_write_item");
    sizes.sort();
    assert_eq!(sizes, vec![10, 25, 25]);
    assert_eq!(store.items("accounts").len(), 60);
}

#[tokio::test]
async fn test_batch_write_retries_unprocessed_requests() {
    let store = Arc::new(
        MemoryStore::default()
            .table("accounts", "email", None)
            .batch_leftover(1),
    );
    let accounts = accounts(Arc::clone(&store));
    accounts
        .batch_write(
            emails(3).into_iter().map(BatchWriteRequest::Put),
            BatchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(store.request_sizes("batch_write_item"), vec![3, 1]);
    assert_eq!(store.items("accounts").len(), 3);
}

#[tokio::test]
async fn test_batch_write_reports_partial_failure() {
    let store = Arc::new(
        MemoryStore::default()
            .table("accounts", "email", None)
            .batch_leftover(usize::MAX),
    );
    let accounts = accounts(Arc::clone(&store));
    let error = accounts
        .batch_write(
            emails(2).into_iter().map(BatchWriteRequest::Put),
            BatchOptions::default(),
        )
        .await
        .unwrap_err();
    match error {
        Error::PartialFailure {
            unprocessed: Unprocessed::Writes(writes),
            attempts,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(
                writes,
                vec![BatchWriteRequest::Put(attributes(json!({
                    "email": "user1@example.com",
                    "age": 1,
                })))]
            );
        }
        error => panic!("unexpected error: {error}"),
    }
    assert_eq!(store.requests("batch_write_item"), 3);
}

#[tokio::test]
async fn test_get_items_reports_partial_failure() {
    let store = Arc::new(
        MemoryStore::default()
            .table("accounts", "email", None)
            .batch_leftover(usize::MAX),
    );
    let accounts = accounts(Arc::clone(&store));
    let error = accounts
        .get_items(
            ["a@example.com", "b@example.com"],
            BatchOptions {
                retry: Some(RetryPolicy::immediate(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    match error {
        Error::PartialFailure {
            unprocessed: Unprocessed::Keys(keys),
            attempts,
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(keys, vec![attributes(json!({"email": "b@example.com"}))]);
        }
        error => panic!("unexpected error: {error}"),
    }
}

#[tokio::test]
async fn test_invalid_put_rejects_whole_batch() {
    let store = Arc::new(MemoryStore::default().table("accounts", "email", None));
    let accounts = accounts(Arc::clone(&store));
    let mut items = emails(2);
    items.push(attributes(json!({"email": "x@example.com", "age": "old"})));
    let result = accounts.batch_create(items, BatchOptions::default()).await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(store.requests("batch_write_item"), 0);
}

#[tokio::test]
async fn test_batch_destroy() {
    let store = Arc::new(MemoryStore::default().table("accounts", "email", None));
    let accounts = accounts(Arc::clone(&store));
    accounts
        .batch_create(emails(4), BatchOptions::default())
        .await
        .unwrap();
    accounts
        .batch_destroy(
            ["user0@example.com", "user2@example.com"],
            BatchOptions::default(),
        )
        .await
        .unwrap();
    let remaining = accounts
        .get_items(
            ["user0@example.com", "user1@example.com", "user2@example.com", "user3@example.com"],
            BatchOptions::default(),
        )
        .await
        .unwrap();
    let present: Vec<_> = remaining.iter().map(Option::is_some).collect();
    assert_eq!(present, vec![false, true, false, true]);
}

#[tokio::test]
async fn test_fatal_batch_write_error_stops_every_chunk() {
    let store = Arc::new(
        MemoryStore::default()
            .table("accounts", "email", None)
            .batch_leftover(usize::MAX)
            .fail("batch_write_item", 1, Fault::Store),
    );
    let accounts = accounts(Arc::clone(&store));
    let result = accounts.batch_create(emails(60), slow_retry()).await;
    assert!(matches!(result, Err(Error::Store(_))));
    assert!(store.requests("batch_write_item") <= 3);
}

#[tokio::test]
async fn test_fatal_batch_get_error_stops_every_chunk() {
    let store = Arc::new(
        MemoryStore::default()
            .table("accounts", "email", None)
            .batch_leftover(usize::MAX)
            .fail("batch_get_item", 1, Fault::Store),
    );
    let accounts = accounts(Arc::clone(&store));
    let keys: Vec<_> = (0..250).map(|index| format!("user{index}@example.com")).collect();
    let result = accounts.get_items(keys, slow_retry()).await;
    assert!(matches!(result, Err(Error::Store(_))));
    assert!(store.requests("batch_get_item") <= 3);
}
