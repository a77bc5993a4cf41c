//! The match-and-notify engine.
//!
//! - `score`: deterministic cosine/Jaccard scoring over skill sets
//! - `matcher`: rebuilds the materialized match index from claims and
//!   requirements
//! - `planner`: selects top-K candidates per recruiting project and fans
//!   notifications out through the message log

pub mod matcher;
pub mod planner;
pub mod score;

#[cfg(test)]
mod planner_test;

pub use matcher::{MatchRunSummary, Matcher};
pub use planner::{NotificationPlanner, PlannerRunSummary};

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Attempts per unit of batch work, including the first.
const RETRY_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt; doubles per retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Run one unit of batch work, retrying store unavailability with
/// bounded exponential backoff. Every other error kind surfaces on the
/// first failure.
pub(crate) async fn retry_unavailable<T, F, Fut>(label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e @ Error::Unavailable { .. }) if attempt < RETRY_ATTEMPTS => {
                warn!(%label, attempt, error = %e, "store unavailable, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}
