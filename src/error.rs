//! Error types for Game Bank.

use uuid::Uuid;

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Ledger write errors.
///
/// A parse miss is *not* an error — extractors return zero activities for
/// malformed announcements and the pipeline stays silent.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The activity carried the "unknown" actor sentinel. Dropped before
    /// any balance movement.
    #[error("activity actor is unknown")]
    UnknownActor,

    /// The user already has `count` transactions inside the trailing window
    /// (cap `cap`). The only security check that blocks the write.
    #[error("transaction cap reached for user {user_id}: {count} in window (cap {cap})")]
    SecurityRejected {
        user_id: Uuid,
        count: u64,
        cap: u32,
        /// Converted amount the write would have credited.
        amount: i64,
    },

    /// Storage failure; nothing was committed for this activity.
    #[error("storage failure: {source}")]
    Storage {
        /// Converted amount, when the failure happened after conversion.
        amount: Option<i64>,
        source: DatabaseError,
    },
}

impl LedgerError {
    /// The converted amount computed before the failure, if conversion had
    /// already happened. Rates are admin-editable at runtime, so this cannot
    /// be recomputed later; rejection results carry it for manual replay.
    pub fn converted_amount(&self) -> Option<i64> {
        match self {
            Self::UnknownActor => None,
            Self::SecurityRejected { amount, .. } => Some(*amount),
            Self::Storage { amount, .. } => *amount,
        }
    }
}
