//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. The balance update and
//! transaction insert happen inside one storage transaction so a crash can
//! never leave the denormalized balance out of step with the ledger.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, NewTransaction, Transaction, User};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp write format: fixed-width RFC 3339 UTC, so string
/// comparison in SQL matches chronological order.
fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_ts(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

/// Map a libsql row to a User.
///
/// Column order: 0:id, 1:platform_id, 2:display_name, 3:username,
/// 4:balance, 5:last_activity, 6:created_at
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    let id: String = row.get(0)?;
    let platform_id: Option<i64> = row.get(1).ok();
    let display_name: String = row.get(2)?;
    let username: Option<String> = row.get(3).ok();
    let balance: i64 = row.get(4)?;
    let last_activity: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(User {
        id: parse_uuid(&id),
        platform_id,
        display_name,
        username,
        balance,
        last_activity: parse_ts(&last_activity),
        created_at: parse_ts(&created_at),
    })
}

/// Map a libsql row to a Transaction.
///
/// Column order: 0:id, 1:user_id, 2:amount, 3:kind, 4:source_game,
/// 5:description, 6:metadata, 7:created_at
fn row_to_transaction(row: &libsql::Row) -> Result<Transaction, libsql::Error> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let amount: i64 = row.get(2)?;
    let kind: String = row.get(3)?;
    let source_game: String = row.get(4)?;
    let description: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Transaction {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        amount,
        kind,
        source_game,
        description,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: parse_ts(&created_at),
    })
}

const USER_COLUMNS: &str =
    "id, platform_id, display_name, username, balance, last_activity, created_at";

const TX_COLUMNS: &str =
    "id, user_id, amount, kind, source_game, description, metadata, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        self.query_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
        )
        .await
    }

    async fn find_user_by_platform_id(
        &self,
        platform_id: i64,
    ) -> Result<Option<User>, DatabaseError> {
        self.query_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE platform_id = ?1"),
            params![platform_id],
        )
        .await
    }

    async fn find_user_by_display_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        // BINARY collation: exact, case-sensitive, by design.
        self.query_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE display_name = ?1 LIMIT 1"),
            params![name],
        )
        .await
    }

    async fn create_user(
        &self,
        display_name: &str,
        username: Option<&str>,
        platform_id: Option<i64>,
    ) -> Result<User, DatabaseError> {
        let user = User {
            id: Uuid::new_v4(),
            platform_id,
            display_name: display_name.to_string(),
            username: username.map(String::from),
            balance: 0,
            last_activity: Utc::now(),
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    user.id.to_string(),
                    user.platform_id,
                    user.display_name.clone(),
                    user.username.clone(),
                    user.balance,
                    format_ts(user.last_activity),
                    format_ts(user.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Constraint(format!("Failed to create user: {e}")))?;

        Ok(user)
    }

    async fn record_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<(Transaction, i64), DatabaseError> {
        let now = Utc::now();
        let row = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            amount: new.amount,
            kind: new.kind.clone(),
            source_game: new.source_game.clone(),
            description: new.description.clone(),
            metadata: new.metadata.clone(),
            created_at: now,
        };
        let metadata_json = serde_json::to_string(&row.metadata)
            .map_err(|e| DatabaseError::Serialization(format!("metadata: {e}")))?;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to begin transaction: {e}")))?;

        let affected = tx
            .execute(
                "UPDATE users SET balance = balance + ?1, last_activity = ?2 WHERE id = ?3",
                params![new.amount, format_ts(now), new.user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to update balance: {e}")))?;

        if affected == 0 {
            // Dropping `tx` rolls back.
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: new.user_id.to_string(),
            });
        }

        tx.execute(
            &format!("INSERT INTO transactions ({TX_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                row.id.to_string(),
                row.user_id.to_string(),
                row.amount,
                row.kind.clone(),
                row.source_game.clone(),
                row.description.clone(),
                metadata_json,
                format_ts(now),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to insert transaction: {e}")))?;

        let mut rows = tx
            .query(
                "SELECT balance FROM users WHERE id = ?1",
                params![new.user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read balance: {e}")))?;
        let balance: i64 = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read balance row: {e}")))?
        {
            Some(r) => r
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse balance: {e}")))?,
            None => {
                return Err(DatabaseError::NotFound {
                    entity: "user".into(),
                    id: new.user_id.to_string(),
                });
            }
        };

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to commit transaction: {e}")))?;

        Ok((row, balance))
    }

    async fn count_transactions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM transactions WHERE user_id = ?1 AND created_at >= ?2",
                params![user_id.to_string(), format_ts(since)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count transactions: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read count: {e}")))?
        {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("Failed to parse count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TX_COLUMNS} FROM transactions
                     WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                ),
                params![user_id.to_string(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to list transactions: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read transaction row: {e}")))?
        {
            out.push(
                row_to_transaction(&row)
                    .map_err(|e| DatabaseError::Query(format!("Failed to map transaction: {e}")))?,
            );
        }
        Ok(out)
    }

    async fn sum_transactions(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ?1",
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to sum transactions: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read sum: {e}")))?
        {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse sum: {e}"))),
            None => Ok(0),
        }
    }
}

impl LibSqlBackend {
    async fn query_user(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("User query failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read user row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_user(&row).map_err(|e| {
                DatabaseError::Query(format!("Failed to map user: {e}"))
            })?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn new_tx(user_id: Uuid, amount: i64) -> NewTransaction {
        NewTransaction {
            user_id,
            amount,
            kind: "fishing".into(),
            source_game: "fishing".into(),
            description: "test".into(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let db = backend().await;
        let user = db.create_user("alice", Some("alice"), Some(42)).await.unwrap();
        assert_eq!(user.balance, 0);

        let by_name = db.find_user_by_display_name("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        let by_platform = db.find_user_by_platform_id(42).await.unwrap().unwrap();
        assert_eq!(by_platform.id, user.id);

        let by_id = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.display_name, "alice");
    }

    #[tokio::test]
    async fn display_name_lookup_is_case_sensitive() {
        let db = backend().await;
        db.create_user("Alice", None, None).await.unwrap();
        assert!(db.find_user_by_display_name("alice").await.unwrap().is_none());
        assert!(db.find_user_by_display_name("Alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn record_transaction_moves_balance_atomically() {
        let db = backend().await;
        let user = db.create_user("bob", None, None).await.unwrap();

        let (tx1, balance1) = db.record_transaction(&new_tx(user.id, 5)).await.unwrap();
        assert_eq!(tx1.amount, 5);
        assert_eq!(balance1, 5);

        let (_, balance2) = db.record_transaction(&new_tx(user.id, -2)).await.unwrap();
        assert_eq!(balance2, 3);

        let stored = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 3);
        assert_eq!(db.sum_transactions(user.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn record_transaction_for_missing_user_fails_cleanly() {
        let db = backend().await;
        let err = db.record_transaction(&new_tx(Uuid::new_v4(), 5)).await;
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
        // Nothing was inserted.
        let mut rows = db
            .conn
            .query("SELECT COUNT(*) FROM transactions", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn count_in_window_sees_only_recent() {
        let db = backend().await;
        let user = db.create_user("carol", None, None).await.unwrap();
        db.record_transaction(&new_tx(user.id, 1)).await.unwrap();
        db.record_transaction(&new_tx(user.id, 1)).await.unwrap();

        let hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(db.count_transactions_since(user.id, hour_ago).await.unwrap(), 2);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(db.count_transactions_since(user.id, future).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_transactions_newest_first() {
        let db = backend().await;
        let user = db.create_user("dave", None, None).await.unwrap();
        for amount in [1, 2, 3] {
            db.record_transaction(&new_tx(user.id, amount)).await.unwrap();
        }
        let txs = db.list_transactions(user.id, 2).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs[0].created_at >= txs[1].created_at);
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let db = backend().await;
        let user = db.create_user("erin", None, None).await.unwrap();
        let mut tx = new_tx(user.id, 4);
        tx.metadata = serde_json::json!({"fish": "Окунь", "excerpt": "🎣"});
        let (stored, _) = db.record_transaction(&tx).await.unwrap();
        let listed = db.list_transactions(user.id, 1).await.unwrap();
        assert_eq!(listed[0].id, stored.id);
        assert_eq!(listed[0].metadata["fish"], "Окунь");
    }

    #[tokio::test]
    async fn local_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_user("frank", None, None).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.find_user_by_display_name("frank").await.unwrap().is_some());
    }
}
