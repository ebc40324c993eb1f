//! SQLite-backed document store.
//!
//! # Invariants
//! - Documents live in `documents(entity_set, entity_key, body)`.
//! - Natural order is `rowid` order, i.e. insertion order.
//! - `apply` runs inside one transaction; any failing change rolls back all.

use super::{validate_set_name, ChangeOp, DocumentStore, StoredChange, StoredDocument};
use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use log::{error, info};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

/// Document store over one SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens (and migrates) a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already went through `open_db`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::Closed)
    }
}

impl DocumentStore for SqliteStore {
    fn ensure_set(&mut self, set: &str) -> DbResult<()> {
        validate_set_name(set)?;
        self.conn()?;
        Ok(())
    }

    fn load_set(&self, set: &str) -> DbResult<Vec<StoredDocument>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT entity_key, body
             FROM documents
             WHERE entity_set = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([set])?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let body: String = row.get(1)?;
            documents.push(StoredDocument {
                key,
                body: serde_json::from_str(&body)?,
            });
        }

        Ok(documents)
    }

    fn load(&self, set: &str, key: &str) -> DbResult<Option<Value>> {
        let body = self
            .conn()?
            .query_row(
                "SELECT body FROM documents WHERE entity_set = ?1 AND entity_key = ?2;",
                params![set, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn apply(&mut self, changes: &[StoredChange]) -> DbResult<usize> {
        let started_at = Instant::now();
        let conn = self.conn.as_mut().ok_or(DbError::Closed)?;

        let tx = conn.transaction()?;
        let result = changes
            .iter()
            .try_for_each(|change| apply_change(&tx, change))
            .and_then(|()| tx.commit().map_err(DbError::from));

        match result {
            Ok(()) => {
                info!(
                    "event=store_apply module=store status=ok backend=sqlite changes={} duration_ms={}",
                    changes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(changes.len())
            }
            Err(err) => {
                error!(
                    "event=store_apply module=store status=error backend=sqlite changes={} duration_ms={} error={}",
                    changes.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn close(&mut self) -> DbResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| DbError::Sqlite(err)),
            None => Ok(()),
        }
    }
}

fn apply_change(tx: &Transaction<'_>, change: &StoredChange) -> DbResult<()> {
    let changed = match &change.op {
        ChangeOp::Insert(body) => tx
            .execute(
                "INSERT INTO documents (entity_set, entity_key, body) VALUES (?1, ?2, ?3);",
                params![change.set, change.key, body.to_string()],
            )
            .map_err(|err| map_insert_error(err, change))?,
        ChangeOp::Update(body) => tx.execute(
            "UPDATE documents
             SET
                body = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE entity_set = ?1 AND entity_key = ?2;",
            params![change.set, change.key, body.to_string()],
        )?,
        ChangeOp::Delete => tx.execute(
            "DELETE FROM documents WHERE entity_set = ?1 AND entity_key = ?2;",
            params![change.set, change.key],
        )?,
    };

    if changed == 0 {
        return Err(DbError::MissingRow {
            set: change.set.clone(),
            key: change.key.clone(),
        });
    }

    Ok(())
}

fn map_insert_error(err: rusqlite::Error, change: &StoredChange) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            DbError::DuplicateKey {
                set: change.set.clone(),
                key: change.key.clone(),
            }
        }
        other => DbError::Sqlite(other),
    }
}
