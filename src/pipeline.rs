//! Message boundary — one announcement in, ordered ledger results out.
//!
//! Flow: route → extract → per activity: resolve → convert → write.
//! Activities from one message apply independently and sequentially in
//! extraction order; one rejection never suppresses its siblings.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::activity::DetectedActivity;
use crate::config::SecurityConfig;
use crate::convert::RateTable;
use crate::ledger::{ActivityResult, LedgerWriter};
use crate::router::ActivityRouter;
use crate::store::Database;

/// The ingestion core: recognizes announcements and posts them to the ledger.
pub struct AnnouncementProcessor {
    router: ActivityRouter,
    ledger: LedgerWriter,
    db: Arc<dyn Database>,
}

impl AnnouncementProcessor {
    pub fn new(db: Arc<dyn Database>, rates: Arc<RateTable>, security: SecurityConfig) -> Self {
        Self {
            router: ActivityRouter::new(),
            ledger: LedgerWriter::new(db.clone(), rates, security),
            db,
        }
    }

    /// Process one chat message.
    ///
    /// Returns one result per reward activity, in extraction order. Parse
    /// misses and unknown actors produce no result (silent no-reply);
    /// profile snapshots are diverted to reconciliation logging.
    pub async fn process(
        &self,
        text: &str,
        chat_id: &str,
        source_hint: Option<&str>,
    ) -> Vec<ActivityResult> {
        let activities = self.router.route(text, chat_id, source_hint);
        if activities.is_empty() {
            debug!(chat_id, "no activities detected");
            return Vec::new();
        }
        info!(chat_id, count = activities.len(), "processing activities");

        let mut results = Vec::with_capacity(activities.len());
        for activity in activities {
            if !activity.kind.is_reward() {
                self.reconcile_snapshot(&activity).await;
                continue;
            }
            if activity.is_unknown_actor() {
                warn!(
                    chat_id,
                    kind = activity.kind.label(),
                    excerpt = %activity.excerpt,
                    "dropping activity with unknown actor"
                );
                continue;
            }
            match self.ledger.apply(&activity).await {
                Ok(applied) => {
                    info!(
                        chat_id,
                        user_id = %applied.user_id,
                        kind = activity.kind.label(),
                        amount = applied.converted_amount,
                        balance = applied.new_balance,
                        "activity applied"
                    );
                    results.push(ActivityResult::applied(applied));
                }
                Err(e) => {
                    // Siblings keep going; context stays on the result.
                    results.push(ActivityResult::rejected(&e, activity));
                }
            }
        }
        results
    }

    /// Compare a profile snapshot's reported balance with ours. Read-only:
    /// a mismatch is an operator signal, not something to auto-correct.
    async fn reconcile_snapshot(&self, activity: &DetectedActivity) {
        let reported = activity.raw_points;
        match self.ledger.resolver().resolve(&activity.actor, None).await {
            Ok(user) => {
                if user.balance == reported {
                    debug!(actor = %activity.actor, balance = reported, "snapshot matches ledger");
                } else {
                    warn!(
                        actor = %activity.actor,
                        user_id = %user.id,
                        reported,
                        ledger = user.balance,
                        "snapshot balance differs from ledger"
                    );
                }
            }
            Err(e) => warn!(actor = %activity.actor, error = %e, "snapshot reconciliation failed"),
        }
    }

    /// The router, for session-state inspection.
    pub fn router(&self) -> &ActivityRouter {
        &self.router
    }

    /// The underlying store handle.
    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }
}
