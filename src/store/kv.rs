// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Ordered key-value storage on SQLite
//!
//! A single `kv` table with binary keys. Keys sort bytewise, so a prefix
//! scan is a range query. Every read-modify-write goes through
//! [`KvStore::update`], which holds the connection lock for the whole
//! transaction.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key BLOB PRIMARY KEY,
    value BLOB NOT NULL
) WITHOUT ROWID;
"#;

/// Ordered binary key-value store
pub struct KvStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl KvStore {
    /// Open (or create) a store file. A corrupt file is discarded and
    /// recreated
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = match Self::open_checked(path) {
            Ok(conn) => conn,
            Err(e) if is_corruption(&e) => {
                warn!(path = %path.display(), error = %e, "store corrupt, truncating");
                remove_db_files(path)?;
                Self::open_checked(path)?
            }
            Err(e) => return Err(e),
        };

        debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing store file without creating, checking or
    /// truncating it. Every write through this handle fails
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %path.display(), "opened store read-only");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn open_checked(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let check: String = conn.query_row("PRAGMA quick_check", [], |r| r.get(0))?;
        if check != "ok" {
            return Err(Error::Store(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
                Some(check),
            )));
        }
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(conn)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside a write transaction; commits on `Ok`
    pub fn update<T>(&self, f: impl FnOnce(&KvTxn<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let out = f(&KvTxn { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` against a consistent snapshot
    pub fn view<T>(&self, f: impl FnOnce(&KvTxn<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&KvTxn { conn: &tx })?;
        tx.finish()?;
        Ok(out)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.view(|txn| txn.get(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(|txn| txn.put(key, value))
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.view(|txn| txn.exists(key))
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.view(|txn| txn.scan_prefix(prefix))
    }
}

/// Handle to an open transaction
pub struct KvTxn<'a> {
    conn: &'a Connection,
}

impl<'a> KvTxn<'a> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| {
                r.get::<_, Vec<u8>>(0)
            })
            .optional()?)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Insert only if absent; returns true when inserted
    pub fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(n == 1)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?
            .is_some())
    }

    /// All pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        match prefix_upper_bound(prefix) {
            Some(upper) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![prefix, upper], |r| Ok((r.get(0)?, r.get(1)?)))?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
                let rows = stmt.query_map(params![prefix], |r| Ok((r.get(0)?, r.get(1)?)))?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }
}

/// Smallest key greater than every key with this prefix
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < 0xff {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

fn is_corruption(err: &Error) -> bool {
    match err {
        Error::Store(rusqlite::Error::SqliteFailure(e, _)) => matches!(
            e.code,
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase
        ),
        _ => false,
    }
}

fn remove_db_files(path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut p = path.as_os_str().to_owned();
        p.push(suffix);
        let p = PathBuf::from(p);
        if p.exists() {
            std::fs::remove_file(&p)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound(b"id:"), Some(b"id;".to_vec()));
        assert_eq!(prefix_upper_bound(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_upper_bound(&[0xff, 0xff]), None);
    }

    #[test]
    fn test_scan_prefix_and_txn() {
        let kv = KvStore::in_memory().unwrap();
        kv.update(|txn| {
            txn.put(b"state:a", b"1")?;
            txn.put(b"state:b", b"2")?;
            txn.put(b"stat", b"x")?;
            txn.put(b"trig:a", b"y")?;
            Ok(())
        })
        .unwrap();

        let rows = kv.scan_prefix(b"state:").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, b"state:a".to_vec());

        assert!(kv.update(|txn| txn.put_if_absent(b"state:a", b"9")).map(|v| !v).unwrap());
        assert_eq!(kv.get(b"state:a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let kv = KvStore::in_memory().unwrap();
        let res: Result<()> = kv.update(|txn| {
            txn.put(b"k", b"v")?;
            Err(Error::other("abort"))
        });
        assert!(res.is_err());
        assert!(!kv.exists(b"k").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl");
        std::fs::write(&path, b"this is definitely not a sqlite database file at all....").unwrap();

        let kv = KvStore::open(&path).unwrap();
        kv.put(b"a", b"b").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_read_only_open_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl");
        let kv = KvStore::open(&path).unwrap();
        kv.put(b"a", b"b").unwrap();

        let ro = KvStore::open_read_only(&path).unwrap();
        assert_eq!(ro.get(b"a").unwrap(), Some(b"b".to_vec()));
        assert!(ro.put(b"c", b"d").is_err());
        assert!(!kv.exists(b"c").unwrap());
    }

    #[test]
    fn test_read_only_open_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(KvStore::open_read_only(&missing).and_then(|kv| kv.get(b"a")).is_err());
        assert!(!missing.exists());

        let garbage = b"this is definitely not a sqlite database file at all....";
        let path = dir.path().join("crawl");
        std::fs::write(&path, garbage).unwrap();
        assert!(KvStore::open_read_only(&path).and_then(|kv| kv.get(b"a")).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), garbage.to_vec());
    }
}
