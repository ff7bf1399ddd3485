//! User resolution — free-text identifiers to durable users.
//!
//! Lookup order: platform id (when a collaborator supplied one), then exact
//! case-sensitive display name with the `@` stripped, then create.
//!
//! Distinct spellings of the same human resolve to distinct users. That is
//! deliberate: fuzzy matching risks merging two real players, which is
//! worse than splitting one. Do not "fix" this here.

use std::sync::Arc;

use tracing::debug;

use crate::error::DatabaseError;
use crate::store::{Database, User};

/// Maps announcement identifiers to durable users, creating on first sight.
pub struct UserResolver {
    db: Arc<dyn Database>,
}

impl UserResolver {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Normalize an identifier into the display-name key: trim and strip a
    /// leading `@`. No case folding.
    pub fn normalize(identifier: &str) -> &str {
        identifier.trim().trim_start_matches('@')
    }

    /// Resolve an identifier to a user, creating one with balance 0 if
    /// nothing matches. Idempotent: the same inputs return the same user.
    pub async fn resolve(
        &self,
        identifier: &str,
        platform_id: Option<i64>,
    ) -> Result<User, DatabaseError> {
        if let Some(pid) = platform_id {
            if let Some(user) = self.db.find_user_by_platform_id(pid).await? {
                return Ok(user);
            }
        }

        let name = Self::normalize(identifier);
        if let Some(user) = self.db.find_user_by_display_name(name).await? {
            return Ok(user);
        }

        // First sighting. Remember the @handle when that's what we saw.
        let username = identifier.trim().starts_with('@').then_some(name);
        let user = self.db.create_user(name, username, platform_id).await?;
        debug!(user_id = %user.id, display_name = %name, "created user on first sighting");
        Ok(user)
    }
}
