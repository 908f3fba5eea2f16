//! Contract tests run against every `LinkStorage` implementation. The memory
//! variant always runs; the SQL and ORM variants are `#[ignore]`d unless
//! `TEST_DATABASE_URL` points at a live, migrated Postgres instance.

use std::env;

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;

use super::*;
use crate::migrations;

async fn pool_from_env() -> Pool {
    let url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    let mut cfg = PoolConfig::new();
    cfg.url = Some(url);
    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .expect("build pool");
    let mut client = pool.get().await.expect("get client");
    migrations::run_migrations(&mut client)
        .await
        .expect("run migrations");
    pool
}

async fn create_chat_rejects_unknown_chat(storage: &dyn LinkStorage) {
    let err = storage
        .add_link(999_999, "https://example.com/a", &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ChatNotFound));
}

async fn add_link_is_idempotent_per_chat(storage: &dyn LinkStorage) {
    storage.create_chat(1).await.unwrap();
    storage
        .add_link(1, "https://example.com/a", &["go".into()], &[])
        .await
        .unwrap();

    let err = storage
        .add_link(1, "https://example.com/a", &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::LinkAlreadyExists));
}

async fn remove_link_then_get_links_is_empty(storage: &dyn LinkStorage) {
    storage.create_chat(2).await.unwrap();
    storage
        .add_link(2, "https://example.com/b", &[], &[])
        .await
        .unwrap();
    storage.remove_link(2, "https://example.com/b").await.unwrap();

    let links = storage.get_links(2).await.unwrap();
    assert!(links.is_empty());
}

async fn remove_missing_link_is_not_found(storage: &dyn LinkStorage) {
    storage.create_chat(3).await.unwrap();
    let err = storage
        .remove_link(3, "https://example.com/never-added")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::LinkNotFound));
}

async fn batch_cursor_is_monotonic_and_exhaustive(storage: &dyn LinkStorage) {
    storage.create_chat(4).await.unwrap();
    for i in 0..5 {
        storage
            .add_link(4, &format!("https://example.com/batch/{i}"), &[], &[])
            .await
            .unwrap();
    }

    let mut after = 0i64;
    let mut seen = 0usize;
    loop {
        let (rows, new_after) = storage.get_batch_of_links(2, after).await.unwrap();
        if rows.is_empty() {
            break;
        }
        assert!(rows.iter().all(|r| r.id > after));
        seen += rows.len();
        after = new_after;
    }
    assert!(seen >= 5);
}

async fn run_full_contract(storage: &dyn LinkStorage) {
    create_chat_rejects_unknown_chat(storage).await;
    add_link_is_idempotent_per_chat(storage).await;
    remove_link_then_get_links_is_empty(storage).await;
    remove_missing_link_is_not_found(storage).await;
    batch_cursor_is_monotonic_and_exhaustive(storage).await;
}

#[tokio::test]
async fn memory_storage_satisfies_contract() {
    let storage = MemoryLinkStorage::new();
    run_full_contract(&storage).await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn sql_storage_satisfies_contract() {
    let pool = pool_from_env().await;
    let storage = SqlLinkStorage::new(pool);
    run_full_contract(&storage).await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn orm_storage_satisfies_contract() {
    let pool = pool_from_env().await;
    let storage = OrmLinkStorage::new(pool);
    run_full_contract(&storage).await;
}
