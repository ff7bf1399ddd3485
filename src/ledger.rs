//! Ledger writer — turns a detected activity into a committed transaction.
//!
//! Steps per activity: resolve user → convert currency → security checks →
//! atomic balance update + transaction insert. The cap check and the write
//! hold a per-user lock so two concurrent applies for the same user cannot
//! both pass the cap.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use crate::activity::DetectedActivity;
use crate::config::SecurityConfig;
use crate::convert::RateTable;
use crate::error::LedgerError;
use crate::resolve::UserResolver;
use crate::store::{Database, NewTransaction, User};

/// Outcome of a successfully applied activity.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedActivity {
    pub user_id: Uuid,
    pub original_points: i64,
    pub converted_amount: i64,
    pub new_balance: i64,
    pub transaction_id: Uuid,
}

/// Per-activity result reported to the caller. Serializes to
/// `{"success": true, ...}` on success or `{"success": false, "error": ...,
/// "activity": ...}` on rejection, with enough context for manual replay.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<DetectedActivity>,
}

impl ActivityResult {
    pub fn applied(applied: AppliedActivity) -> Self {
        Self {
            success: true,
            user_id: Some(applied.user_id),
            original_points: Some(applied.original_points),
            converted_amount: Some(applied.converted_amount),
            new_balance: Some(applied.new_balance),
            transaction_id: Some(applied.transaction_id),
            error: None,
            activity: None,
        }
    }

    pub fn rejected(error: &LedgerError, activity: DetectedActivity) -> Self {
        Self {
            success: false,
            user_id: None,
            original_points: Some(activity.raw_points),
            // Kept for replay: rates may have changed by the time an
            // administrator looks at the rejection.
            converted_amount: error.converted_amount(),
            new_balance: None,
            transaction_id: None,
            error: Some(error.to_string()),
            activity: Some(activity),
        }
    }
}

/// Applies activities to the ledger under the security policy.
pub struct LedgerWriter {
    db: Arc<dyn Database>,
    resolver: UserResolver,
    rates: Arc<RateTable>,
    security: SecurityConfig,
    /// One lock per user id, serializing cap-check + write. Entries are
    /// never evicted; the map grows with the user base, a few words each.
    user_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LedgerWriter {
    pub fn new(db: Arc<dyn Database>, rates: Arc<RateTable>, security: SecurityConfig) -> Self {
        Self {
            resolver: UserResolver::new(db.clone()),
            db,
            rates,
            security,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one activity: resolve → convert → security checks → commit.
    ///
    /// Fails with [`LedgerError::UnknownActor`] for the sentinel actor (the
    /// pipeline normally drops those earlier), [`LedgerError::SecurityRejected`]
    /// when the trailing-window cap is met, or [`LedgerError::Storage`] on
    /// write failure. No balance moves on any failure path.
    pub async fn apply(&self, activity: &DetectedActivity) -> Result<AppliedActivity, LedgerError> {
        if activity.is_unknown_actor() {
            return Err(LedgerError::UnknownActor);
        }

        let user = self
            .resolver
            .resolve(&activity.actor, None)
            .await
            .map_err(|e| LedgerError::Storage {
                amount: None,
                source: e,
            })?;
        let converted = self
            .rates
            .convert(activity.raw_points, activity.source_game, &activity.kind);

        // Oversized single amounts are suspicious but legitimate rewards can
        // be large; log loudly, never block.
        if converted > self.security.max_single_amount {
            warn!(
                user_id = %user.id,
                actor = %activity.actor,
                amount = converted,
                max = self.security.max_single_amount,
                excerpt = %activity.excerpt,
                "converted amount exceeds configured maximum"
            );
        }

        let lock = self.user_lock(user.id).await;
        let _guard = lock.lock().await;

        self.check_rate_cap(&user, activity, converted).await?;

        let (transaction, new_balance) = self
            .db
            .record_transaction(&NewTransaction {
                user_id: user.id,
                amount: converted,
                kind: activity.kind.label().to_string(),
                source_game: activity.source_game.label().to_string(),
                description: format!(
                    "{} via {}",
                    activity.kind.label(),
                    activity.source_game.label()
                ),
                metadata: transaction_metadata(activity),
            })
            .await
            .map_err(|e| {
                error!(
                    user_id = %user.id,
                    actor = %activity.actor,
                    amount = converted,
                    excerpt = %activity.excerpt,
                    error = %e,
                    "ledger write failed"
                );
                LedgerError::Storage {
                    amount: Some(converted),
                    source: e,
                }
            })?;

        Ok(AppliedActivity {
            user_id: user.id,
            original_points: activity.raw_points,
            converted_amount: converted,
            new_balance,
            transaction_id: transaction.id,
        })
    }

    /// The trailing-window transaction cap — the only blocking check.
    /// Duplicate-amount detection is deliberately absent: identical
    /// legitimate rewards are common in these games.
    async fn check_rate_cap(
        &self,
        user: &User,
        activity: &DetectedActivity,
        converted: i64,
    ) -> Result<(), LedgerError> {
        let window = chrono::Duration::from_std(self.security.window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let since = Utc::now() - window;
        let count = self
            .db
            .count_transactions_since(user.id, since)
            .await
            .map_err(|e| LedgerError::Storage {
                amount: Some(converted),
                source: e,
            })?;
        if count >= u64::from(self.security.rate_cap) {
            warn!(
                user_id = %user.id,
                actor = %activity.actor,
                count,
                cap = self.security.rate_cap,
                amount = converted,
                excerpt = %activity.excerpt,
                "transaction cap reached, rejecting activity"
            );
            return Err(LedgerError::SecurityRejected {
                user_id: user.id,
                count,
                cap: self.security.rate_cap,
                amount: converted,
            });
        }
        Ok(())
    }

    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .clone()
    }

    /// The resolver, for callers that need user lookup without a write.
    pub fn resolver(&self) -> &UserResolver {
        &self.resolver
    }
}

/// Transaction metadata: the activity's free-form fields plus the bounded
/// raw-text excerpt, kept for manual administrator replay.
fn transaction_metadata(activity: &DetectedActivity) -> serde_json::Value {
    let mut map = activity.metadata.clone();
    map.insert("excerpt".into(), activity.excerpt.clone().into());
    map.insert("actor".into(), activity.actor.clone().into());
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityKind, SourceGame};
    use crate::convert::GameRates;
    use crate::store::LibSqlBackend;
    use rust_decimal_macros::dec;

    fn activity(actor: &str, points: i64) -> DetectedActivity {
        DetectedActivity::new(
            actor,
            ActivityKind::Fishing,
            points,
            SourceGame::Fishing,
            "🎣 test",
        )
    }

    async fn writer(security: SecurityConfig) -> LedgerWriter {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        LedgerWriter::new(db, Arc::new(RateTable::empty()), security)
    }

    #[tokio::test]
    async fn apply_credits_balance_and_appends_transaction() {
        let w = writer(SecurityConfig::default()).await;
        let applied = w.apply(&activity("alice", 5)).await.unwrap();
        assert_eq!(applied.original_points, 5);
        assert_eq!(applied.converted_amount, 5);
        assert_eq!(applied.new_balance, 5);

        let again = w.apply(&activity("alice", 3)).await.unwrap();
        assert_eq!(again.new_balance, 8);
        assert_eq!(again.user_id, applied.user_id);
    }

    #[tokio::test]
    async fn unknown_actor_is_rejected() {
        let w = writer(SecurityConfig::default()).await;
        let err = w.apply(&activity("unknown", 5)).await;
        assert!(matches!(err, Err(LedgerError::UnknownActor)));
    }

    #[tokio::test]
    async fn cap_blocks_the_next_write_only() {
        let w = writer(SecurityConfig {
            rate_cap: 2,
            ..SecurityConfig::default()
        })
        .await;

        // K-th succeeds...
        w.apply(&activity("bob", 1)).await.unwrap();
        let second = w.apply(&activity("bob", 1)).await.unwrap();
        assert_eq!(second.new_balance, 2);

        // ...the (K+1)-th fails and moves nothing.
        let err = w.apply(&activity("bob", 1)).await;
        assert!(matches!(err, Err(LedgerError::SecurityRejected { .. })));

        let user = w.resolver().resolve("bob", None).await.unwrap();
        assert_eq!(user.balance, 2);
    }

    #[tokio::test]
    async fn cap_is_per_user() {
        let w = writer(SecurityConfig {
            rate_cap: 1,
            ..SecurityConfig::default()
        })
        .await;
        w.apply(&activity("bob", 1)).await.unwrap();
        assert!(w.apply(&activity("bob", 1)).await.is_err());
        // A different user is unaffected.
        assert!(w.apply(&activity("carol", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_result_keeps_converted_amount() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let rates = RateTable::empty();
        rates.set(SourceGame::Fishing, GameRates::with_base(dec!(3.0)));
        let w = LedgerWriter::new(
            db,
            Arc::new(rates),
            SecurityConfig {
                rate_cap: 1,
                ..SecurityConfig::default()
            },
        );

        w.apply(&activity("alice", 1)).await.unwrap();
        let err = w.apply(&activity("alice", 5)).await.unwrap_err();
        // 5 raw points at base 3.0; the table is mutable, so the rejection
        // must keep the amount it was computed with.
        assert_eq!(err.converted_amount(), Some(15));

        let result = ActivityResult::rejected(&err, activity("alice", 5));
        assert!(!result.success);
        assert_eq!(result.converted_amount, Some(15));
        assert_eq!(result.original_points, Some(5));
    }

    #[tokio::test]
    async fn oversized_amount_logs_but_applies() {
        let w = writer(SecurityConfig {
            max_single_amount: 3,
            ..SecurityConfig::default()
        })
        .await;
        let applied = w.apply(&activity("alice", 100)).await.unwrap();
        assert_eq!(applied.converted_amount, 100);
        assert_eq!(applied.new_balance, 100);
    }

    #[tokio::test]
    async fn metadata_keeps_excerpt_and_actor() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let w = LedgerWriter::new(
            db.clone(),
            Arc::new(RateTable::empty()),
            SecurityConfig::default(),
        );
        let applied = w
            .apply(&activity("alice", 2).with_meta("fish", "Окунь"))
            .await
            .unwrap();
        let txs = db.list_transactions(applied.user_id, 1).await.unwrap();
        assert_eq!(txs[0].metadata["excerpt"], "🎣 test");
        assert_eq!(txs[0].metadata["actor"], "alice");
        assert_eq!(txs[0].metadata["fish"], "Окунь");
    }

    #[test]
    fn result_serialization_shapes() {
        let ok = ActivityResult::applied(AppliedActivity {
            user_id: Uuid::nil(),
            original_points: 3,
            converted_amount: 12,
            new_balance: 12,
            transaction_id: Uuid::nil(),
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["converted_amount"], 12);
        assert!(json.get("error").is_none());

        let err = ActivityResult::rejected(&LedgerError::UnknownActor, activity("unknown", 1));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("unknown"));
        assert_eq!(json["activity"]["actor"], "unknown");
    }
}
