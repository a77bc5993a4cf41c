//! Match index rebuild.
//!
//! Recomputes every (volunteer, project) score from current claims and
//! requirements. Deterministic and re-runnable: the resulting index
//! depends only on the inputs at run time. Projects fan out onto a
//! bounded worker pool; one advisory lock serializes whole runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::utils::current_timestamp;
use crate::db::{Database, MatchRecord};
use crate::error::{Error, Result};
use crate::matching::retry_unavailable;
use crate::matching::score::score_pair;

/// Advisory lock name shared by all matcher processes.
const MATCHER_LOCK: &str = "matcher";

/// A held lock older than this is treated as abandoned.
const LOCK_STALE_SECONDS: i64 = 3600;

/// Counters from one matcher run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchRunSummary {
    pub projects_processed: usize,
    pub projects_failed: usize,
    pub volunteers_considered: usize,
    pub pairs_upserted: usize,
    pub pairs_deleted: usize,
}

/// The match index rebuild job.
pub struct Matcher<D> {
    db: Arc<D>,
    parallelism: usize,
    cancel: Arc<AtomicBool>,
}

impl<D: Database + 'static> Matcher<D> {
    pub fn new(db: Arc<D>, config: &AppConfig) -> Self {
        Self {
            db,
            parallelism: config.match_worker_parallelism.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that stops the run at the next project boundary; work
    /// already in flight finishes.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Rebuild the index over every matchable project.
    ///
    /// Holds the matcher advisory lock for the duration; a second
    /// concurrent run fails fast with a conflict.
    pub async fn run(&self) -> Result<MatchRunSummary> {
        let holder = uuid::Uuid::new_v4().to_string();
        let acquired = self
            .db
            .locks()
            .try_acquire(MATCHER_LOCK, &holder, LOCK_STALE_SECONDS)
            .await?;
        if !acquired {
            return Err(Error::conflict("another matcher run is in flight"));
        }

        let result = self.run_locked().await;
        if let Err(e) = self.db.locks().release(MATCHER_LOCK, &holder).await {
            warn!(error = %e, "failed to release matcher lock");
        }
        result
    }

    async fn run_locked(&self) -> Result<MatchRunSummary> {
        let projects = self.db.projects().list_matchable().await?;
        let volunteer_ids = self.db.volunteers().list_active_volunteer_ids().await?;

        // Claims are shared read-only across project workers.
        let mut claims: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for volunteer_id in &volunteer_ids {
            let active = self.db.volunteers().get_active_claims(volunteer_id).await?;
            claims.insert(
                volunteer_id.clone(),
                active
                    .into_iter()
                    .map(|c| (c.skill_id, c.weight))
                    .collect(),
            );
        }
        let claims = Arc::new(claims);

        let mut summary = MatchRunSummary {
            volunteers_considered: volunteer_ids.len(),
            ..MatchRunSummary::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut workers: JoinSet<(String, Result<(usize, usize)>)> = JoinSet::new();

        for project in projects {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Unavailable {
                    message: e.to_string(),
                })?;
            let db = Arc::clone(&self.db);
            let claims = Arc::clone(&claims);
            let project_id = project.id.clone();
            workers.spawn(async move {
                let _permit = permit;
                // Store hiccups retry with backoff at this worker
                // boundary; a re-scored project is a no-op.
                let result = {
                    let db_ref = db.as_ref();
                    let claims_ref = &*claims;
                    let pid = project_id.as_str();
                    retry_unavailable("matcher", move || score_project(db_ref, pid, claims_ref))
                        .await
                };
                (project_id, result)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok((upserted, deleted)))) => {
                    summary.projects_processed += 1;
                    summary.pairs_upserted += upserted;
                    summary.pairs_deleted += deleted;
                }
                Ok((project_id, Err(e))) => {
                    summary.projects_failed += 1;
                    warn!(project_id = %project_id, error = %e, "match rebuild failed for project");
                }
                Err(e) => {
                    summary.projects_failed += 1;
                    warn!(error = %e, "match worker panicked");
                }
            }
        }

        info!(
            projects = summary.projects_processed,
            failed = summary.projects_failed,
            volunteers = summary.volunteers_considered,
            upserted = summary.pairs_upserted,
            deleted = summary.pairs_deleted,
            "match rebuild finished"
        );
        Ok(summary)
    }
}

/// Score every active volunteer against one project. Returns
/// (pairs upserted, pairs deleted).
async fn score_project<D: Database + ?Sized>(
    db: &D,
    project_id: &str,
    claims: &HashMap<String, Vec<(String, f64)>>,
) -> Result<(usize, usize)> {
    let requirements: BTreeSet<String> = db
        .projects()
        .get_requirements(project_id)
        .await?
        .into_iter()
        .collect();

    let now = current_timestamp();
    let mut upserted = 0;
    let mut deleted = 0;
    for (volunteer_id, weights) in claims {
        match score_pair(weights, &requirements) {
            Some(pair) => {
                let matched_skill_count = pair.matched_skill_ids.len() as i32;
                db.matches()
                    .upsert(&MatchRecord {
                        volunteer_id: volunteer_id.clone(),
                        project_id: project_id.to_string(),
                        score: pair.score,
                        jaccard: pair.jaccard,
                        matched_skill_ids: pair.matched_skill_ids,
                        matched_skill_count,
                        computed_at: now.clone(),
                    })
                    .await?;
                upserted += 1;
            }
            None => {
                // The pair no longer intersects; converge the sparse
                // index to current inputs.
                db.matches().delete_pair(volunteer_id, project_id).await?;
                deleted += 1;
            }
        }
    }
    Ok((upserted, deleted))
}
