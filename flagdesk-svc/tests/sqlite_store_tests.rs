//! SQLite-backed store through the adapter
//!
//! Uses a file database in a temp dir so two adapters can share it the way
//! two service instances would.

use std::sync::Arc;

use flagdesk_common::table::{RecordTable, TableSnapshot};
use flagdesk_common::{Error, OrderRecord};
use flagdesk_svc::config::{StoreOptions, StoreTarget};
use flagdesk_svc::store::{open_table, StoreAdapter};

async fn open(dir: &tempfile::TempDir) -> Arc<dyn RecordTable> {
    open_table(&StoreTarget::Sqlite {
        path: dir.path().join("nested").join("flagdesk.db"),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_open_creates_database_and_merges() {
    let dir = tempfile::tempdir().unwrap();
    let store = StoreAdapter::new(open(&dir).await, StoreOptions::default()).unwrap();

    assert!(!store.read().await.unwrap().has_headers);

    store
        .merge_incoming(vec![
            OrderRecord::new("998877660351", "7", "IN-4", "Red"),
            OrderRecord::new("998877660351", "7", "IN-4", "Blue"),
        ])
        .await
        .unwrap();

    // Reopen: data survives the pool
    let reopened = StoreAdapter::new(open(&dir).await, StoreOptions::default()).unwrap();
    let records = reopened.read().await.unwrap().records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].color, "Blue");
    assert_eq!(records[0].order_number, "0351");
}

#[tokio::test]
async fn test_concurrent_writer_detected_with_optimistic_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let table = open(&dir).await;
    let options = StoreOptions {
        persist_order_number: false,
        optimistic_concurrency: true,
    };
    let store = StoreAdapter::new(table.clone(), options).unwrap();
    store
        .merge_incoming(vec![OrderRecord::new("1111", "1", "T", "Red")])
        .await
        .unwrap();

    // Another writer slips in between our read and write
    let stale = table.read().await.unwrap();
    table
        .write(
            TableSnapshot::from_records(&[OrderRecord::new("2222", "2", "T", "Blue")], false),
            None,
        )
        .await
        .unwrap();
    let result = table
        .write(TableSnapshot::from_records(&[], false), stale.version.as_ref())
        .await;
    assert!(matches!(result, Err(Error::VersionConflict { .. })));

    // The adapter re-reads each time, so its next merge succeeds
    store
        .merge_incoming(vec![OrderRecord::new("3333", "3", "T", "Green")])
        .await
        .unwrap();
    let full_orders: Vec<String> = store
        .read()
        .await
        .unwrap()
        .records
        .into_iter()
        .map(|r| r.full_order)
        .collect();
    assert_eq!(full_orders, vec!["2222", "3333"]);
}

#[tokio::test]
async fn test_clear_with_persisted_order_number() {
    let dir = tempfile::tempdir().unwrap();
    let table = open(&dir).await;
    let store = StoreAdapter::new(
        table.clone(),
        StoreOptions {
            persist_order_number: true,
            optimistic_concurrency: false,
        },
    )
    .unwrap();

    store
        .merge_incoming(vec![OrderRecord::new("998877660351", "7", "IN-4", "Red")])
        .await
        .unwrap();
    assert_eq!(table.read().await.unwrap().headers.len(), 5);

    store.clear().await.unwrap();
    let snapshot = table.read().await.unwrap();
    assert!(snapshot.rows.is_empty());
    assert!(snapshot.has_canonical_headers());
}
