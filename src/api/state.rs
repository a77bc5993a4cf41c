//! Application state for the API server.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::db::Database;

/// TTL for the volunteer-profile lookup cache.
const PROFILE_CACHE_TTL: Duration = Duration::from_secs(60);

/// TTL for the unread-count cache. Short: counts are poll-refreshed and
/// invalidated on the reader's own marks.
const UNREAD_CACHE_TTL: Duration = Duration::from_secs(5);

/// Shared application state: the database, boot configuration, and the
/// read-through caches. The store stays the system of record.
pub struct AppState<D> {
    db: Arc<D>,
    config: AppConfig,
    volunteer_ids: Arc<TtlCache<Option<String>>>,
    unread_counts: Arc<TtlCache<Vec<(String, i64)>>>,
}

impl<D> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            config: self.config.clone(),
            volunteer_ids: Arc::clone(&self.volunteer_ids),
            unread_counts: Arc::clone(&self.unread_counts),
        }
    }
}

impl<D: Database> AppState<D> {
    pub fn new(db: Arc<D>, config: AppConfig) -> Self {
        Self {
            db,
            config,
            volunteer_ids: Arc::new(TtlCache::new(PROFILE_CACHE_TTL)),
            unread_counts: Arc::new(TtlCache::new(UNREAD_CACHE_TTL)),
        }
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn db_arc(&self) -> Arc<D> {
        Arc::clone(&self.db)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cached user → volunteer-profile lookup.
    pub async fn volunteer_id_for(&self, user_id: &str) -> crate::db::DbResult<Option<String>> {
        if let Some(cached) = self.volunteer_ids.get(user_id) {
            return Ok(cached);
        }
        let volunteer_id = self
            .db
            .volunteers()
            .get_by_user(user_id)
            .await?
            .map(|v| v.id);
        self.volunteer_ids.put(user_id, volunteer_id.clone());
        Ok(volunteer_id)
    }

    /// Cached unread counts for a user.
    pub async fn cached_unread_counts(
        &self,
        user_id: &str,
    ) -> crate::db::DbResult<Vec<(String, i64)>> {
        if let Some(cached) = self.unread_counts.get(user_id) {
            return Ok(cached);
        }
        let counts = self.db.messages().unread_counts(user_id).await?;
        self.unread_counts.put(user_id, counts.clone());
        Ok(counts)
    }

    /// Drop a user's cached unread counts after their own read marks.
    pub fn invalidate_unread(&self, user_id: &str) {
        self.unread_counts.invalidate(user_id);
    }
}
