//! Candidate notification planner.
//!
//! One run is a batch: for every eligible project, the top-K visible
//! candidates above the score threshold are notified through the message
//! log, bounded by the per-pair suppression window, and the project lead
//! receives a summary of exactly the candidates notified in this batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::utils::{current_timestamp, generate_entity_id, timestamp_days_ago};
use crate::db::{Database, DbError, Message, MessageType, NotificationRecord, Project};
use crate::error::{Error, Result};
use crate::matching::retry_unavailable;

/// Counters from one planner batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlannerRunSummary {
    pub batch_id: String,
    pub projects_considered: usize,
    pub projects_failed: usize,
    pub candidates_notified: usize,
    pub leads_notified: usize,
}

/// The notification batch job.
pub struct NotificationPlanner<D> {
    db: Arc<D>,
    config: AppConfig,
    cancel: Arc<AtomicBool>,
}

impl<D: Database + 'static> NotificationPlanner<D> {
    pub fn new(db: Arc<D>, config: AppConfig) -> Self {
        Self {
            db,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that stops the batch at the next project boundary;
    /// per-project work in flight finishes so the (P, V, B) uniqueness
    /// guarantee holds.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run one batch with a fresh batch id.
    pub async fn run(&self) -> Result<PlannerRunSummary> {
        self.run_batch(&generate_entity_id()).await
    }

    /// Run one batch under the given id. Re-running the same id is a
    /// no-op: every (project, volunteer, batch) insert is at-most-once.
    pub async fn run_batch(&self, batch_id: &str) -> Result<PlannerRunSummary> {
        let mut summary = PlannerRunSummary {
            batch_id: batch_id.to_string(),
            ..PlannerRunSummary::default()
        };

        let projects = self.db.projects().list().await?;
        for project in projects {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            if !project.status.is_eligible_for_matching() || project.lead_user_id.is_none() {
                continue;
            }
            summary.projects_considered += 1;
            // Store hiccups retry with backoff here; already-notified
            // (project, volunteer) pairs are skipped on the re-attempt.
            let this = &*self;
            let project_ref = &project;
            let attempt =
                retry_unavailable("planner", move || this.notify_project(project_ref, batch_id))
                    .await;
            match attempt {
                Ok(notified) => {
                    summary.candidates_notified += notified;
                    summary.leads_notified += 1;
                }
                Err(e) => {
                    // One project's failure never stops the batch.
                    summary.projects_failed += 1;
                    warn!(project_id = %project.id, error = %e, "notification failed for project");
                }
            }
        }

        info!(
            batch_id = %summary.batch_id,
            projects = summary.projects_considered,
            failed = summary.projects_failed,
            candidates = summary.candidates_notified,
            leads = summary.leads_notified,
            "notification batch finished"
        );
        Ok(summary)
    }

    async fn notify_project(&self, project: &Project, batch_id: &str) -> Result<usize> {
        let lead_user_id = project
            .lead_user_id
            .as_deref()
            .ok_or_else(|| Error::state("project has no lead"))?;

        let candidates = self
            .db
            .matches()
            .top_visible_candidates(&project.id, self.config.match_min_score, self.config.notify_top_k)
            .await?;

        let cutoff = timestamp_days_ago(self.config.notify_suppression_days);
        let mut notified: Vec<(String, f64)> = Vec::new();

        for candidate in candidates {
            if let Some(last) = self
                .db
                .notifications()
                .last_notified_at(&project.id, &candidate.volunteer_id)
                .await?
                && last >= cutoff
            {
                continue;
            }

            let volunteer = self.db.volunteers().get(&candidate.volunteer_id).await?;
            let now = current_timestamp();
            let record = NotificationRecord {
                id: generate_entity_id(),
                project_id: project.id.clone(),
                volunteer_id: candidate.volunteer_id.clone(),
                score: candidate.score,
                sent_at: now.clone(),
                batch_id: batch_id.to_string(),
            };
            match self.db.notifications().insert(&record).await {
                Ok(()) => {}
                // Duplicate (P, V, B): already notified in this batch.
                Err(DbError::Constraint { .. }) => continue,
                Err(e) => return Err(e.into()),
            }

            self.db
                .messages()
                .insert(&Message {
                    id: generate_entity_id(),
                    project_id: project.id.clone(),
                    sender_user_id: self.config.system_sender_id.clone(),
                    recipient_user_id: Some(volunteer.user_id),
                    task_id: None,
                    message_type: MessageType::CandidateMatch,
                    body: format!(
                        "Your skills are a {:.0}% match for the project \"{}\". \
                         Apply from the project page if you are interested.",
                        candidate.score * 100.0,
                        project.title
                    ),
                    created_at: now,
                    edited_at: None,
                    deleted_at: None,
                })
                .await?;
            notified.push((candidate.volunteer_id.clone(), candidate.score));

            // Keeps senders under one message per millisecond so the
            // (created_at, id) ordering in the log stays stable.
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        self.db
            .messages()
            .insert(&Message {
                id: generate_entity_id(),
                project_id: project.id.clone(),
                sender_user_id: self.config.system_sender_id.clone(),
                recipient_user_id: Some(lead_user_id.to_string()),
                task_id: None,
                message_type: MessageType::TeamLeadSummary,
                body: summary_body(&project.title, &notified),
                created_at: current_timestamp(),
                edited_at: None,
                deleted_at: None,
            })
            .await?;

        Ok(notified.len())
    }
}

fn summary_body(title: &str, notified: &[(String, f64)]) -> String {
    if notified.is_empty() {
        return format!("No new candidates were notified for \"{}\" in this batch.", title);
    }
    let lines: Vec<String> = notified
        .iter()
        .map(|(volunteer_id, score)| format!("- volunteer {} ({:.0}% match)", volunteer_id, score * 100.0))
        .collect();
    format!(
        "{} candidate(s) notified for \"{}\":\n{}",
        notified.len(),
        title,
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::summary_body;

    #[test]
    fn summary_handles_empty_batch() {
        let body = summary_body("River Cleanup", &[]);
        assert!(body.contains("No new candidates"));
        assert!(body.contains("River Cleanup"));
    }

    #[test]
    fn summary_lists_each_candidate() {
        let body = summary_body(
            "River Cleanup",
            &[("v1".to_string(), 0.9), ("v2".to_string(), 0.75)],
        );
        assert!(body.starts_with("2 candidate(s)"));
        assert!(body.contains("volunteer v1 (90% match)"));
        assert!(body.contains("volunteer v2 (75% match)"));
    }
}
