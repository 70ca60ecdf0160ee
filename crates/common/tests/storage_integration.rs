//! Integration tests for the pooled SQLite storage
//!
//! Covers concurrent checkouts, pragma application on every pooled
//! connection, and data visibility across connections.

#![cfg(feature = "platform")]

use std::sync::Arc;
use std::thread;

use stocksync_common::storage::{SqlitePool, SqlitePoolConfig, StorageError};
use tempfile::TempDir;

fn temp_pool(max_size: u32) -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool =
        SqlitePool::new(&dir.path().join("storage.db"), SqlitePoolConfig::with_max_size(max_size))
            .unwrap();
    (dir, pool)
}

#[test]
fn writes_are_visible_across_pooled_connections() {
    let (_dir, pool) = temp_pool(4);

    {
        let conn = pool.get().unwrap();
        conn.execute_batch("CREATE TABLE items (id TEXT PRIMARY KEY, qty INTEGER NOT NULL);")
            .unwrap();
        conn.execute("INSERT INTO items (id, qty) VALUES (?1, ?2)", ("sku-1", 7)).unwrap();
    }

    let conn = pool.get().unwrap();
    let qty: i64 =
        conn.query_row("SELECT qty FROM items WHERE id = ?1", ["sku-1"], |row| row.get(0)).unwrap();
    assert_eq!(qty, 7);
}

#[test]
fn every_connection_has_foreign_keys_enabled() {
    let (_dir, pool) = temp_pool(3);

    let held: Vec<_> = (0..3).map(|_| pool.get().unwrap()).collect();
    for conn in &held {
        let enabled: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();
        assert_eq!(enabled, 1);
    }
}

#[test]
fn concurrent_writers_do_not_lose_rows() {
    let (_dir, pool) = temp_pool(4);
    pool.get()
        .unwrap()
        .execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY AUTOINCREMENT, worker INTEGER);")
        .unwrap();

    let pool = Arc::new(pool);
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..25 {
                    let conn = pool.get().unwrap();
                    conn.execute("INSERT INTO events (worker) VALUES (?1)", [worker]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let count: i64 =
        pool.get().unwrap().query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0)).unwrap();
    assert_eq!(count, 100);
}

#[test]
fn exhausted_pool_reports_pool_exhausted() {
    let dir = TempDir::new().unwrap();
    let config = SqlitePoolConfig {
        max_size: 1,
        connection_timeout: std::time::Duration::from_millis(100),
        ..SqlitePoolConfig::default()
    };
    let pool = SqlitePool::new(&dir.path().join("busy.db"), config).unwrap();

    let _held = pool.get().unwrap();
    let err = pool.get().unwrap_err();

    assert!(matches!(err, StorageError::PoolExhausted));
    assert!(err.is_retryable());
}
