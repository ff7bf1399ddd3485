//! Backend-agnostic storage trait for users and the transaction ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;

/// A bank account holder. Created on first sighting; never deleted.
///
/// `balance` is denormalized for cheap reads but only ever mutated together
/// with a transaction insert, inside one storage transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Chat-platform numeric id, when a collaborator supplied one.
    pub platform_id: Option<i64>,
    /// Exact display name as first seen (case-sensitive key).
    pub display_name: String,
    /// `@handle` the name was derived from, if any.
    pub username: Option<String>,
    pub balance: i64,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One immutable ledger row. Append-only; `amount` is signed so peer
/// subsystems (shop purchases) can debit through the same ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    /// Kind label, e.g. `"card_epic"`, `"crocodile_win"`.
    pub kind: String,
    /// Game label, e.g. `"fishing"`.
    pub source_game: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A transaction about to be written.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: String,
    pub source_game: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Backend-agnostic database trait covering users and the ledger.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_platform_id(
        &self,
        platform_id: i64,
    ) -> Result<Option<User>, DatabaseError>;

    /// Exact, case-sensitive display-name lookup.
    async fn find_user_by_display_name(&self, name: &str) -> Result<Option<User>, DatabaseError>;

    /// Create a user with balance 0.
    async fn create_user(
        &self,
        display_name: &str,
        username: Option<&str>,
        platform_id: Option<i64>,
    ) -> Result<User, DatabaseError>;

    // ── Ledger ──────────────────────────────────────────────────────

    /// Atomically insert the transaction row, apply its amount to the
    /// user's balance, and bump `last_activity`. Returns the row and the
    /// new balance. A crash can never separate the row from the balance.
    async fn record_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<(Transaction, i64), DatabaseError>;

    /// Number of the user's transactions created at or after `since`
    /// (the security-cap window read).
    async fn count_transactions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// The user's most recent transactions, newest first.
    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError>;

    /// Signed sum of all the user's transactions. Equals `User::balance`
    /// by construction; used for reconciliation and invariant checks.
    async fn sum_transactions(&self, user_id: Uuid) -> Result<i64, DatabaseError>;
}
