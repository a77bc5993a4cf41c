//! Application configuration.
//!
//! One `AppConfig` value is constructed at boot from the environment and
//! injected into each component. Malformed values are fatal: the server
//! refuses to start and batch jobs exit with the misconfiguration code.

use crate::error::Error;

/// Environment keys, one per tunable.
const KEY_MIN_SCORE: &str = "MATCH_MIN_SCORE";
const KEY_TOP_K: &str = "NOTIFY_TOP_K";
const KEY_SUPPRESSION_DAYS: &str = "NOTIFY_SUPPRESSION_DAYS";
const KEY_SYSTEM_SENDER: &str = "SYSTEM_SENDER_ID";
const KEY_DEFAULT_ROLE: &str = "ROLE_DEFAULT_ON_REGISTER";
const KEY_REQUIRE_VERIFIED: &str = "SESSION_REQUIRE_VERIFIED_EMAIL";
const KEY_WORKERS: &str = "MATCH_WORKER_PARALLELISM";
const KEY_AUTH_SECRET: &str = "CW_AUTH_SECRET";

/// Runtime configuration, environment-keyed.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Planner filter threshold, in [0, 1].
    pub match_min_score: f64,
    /// Candidate cap per project per batch.
    pub notify_top_k: usize,
    /// Minimum days between re-notifying the same (project, volunteer) pair.
    pub notify_suppression_days: i64,
    /// Synthetic author identity for planner-emitted messages.
    pub system_sender_id: String,
    /// Role granted to freshly registered users.
    pub role_default_on_register: String,
    /// When true, login fails until email verification completes.
    pub session_require_verified_email: bool,
    /// Bounded worker pool size for the matcher.
    pub match_worker_parallelism: usize,
    /// HMAC key for bearer tokens.
    pub auth_secret: String,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// `CW_AUTH_SECRET` is mandatory; everything else has a default.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            match_min_score: parse_or(KEY_MIN_SCORE, 0.6, |v: f64| (0.0..=1.0).contains(&v))?,
            notify_top_k: parse_or(KEY_TOP_K, 10, |_| true)?,
            notify_suppression_days: parse_or(KEY_SUPPRESSION_DAYS, 14, |v: i64| v >= 0)?,
            system_sender_id: std::env::var(KEY_SYSTEM_SENDER)
                .unwrap_or_else(|_| "system".to_string()),
            role_default_on_register: std::env::var(KEY_DEFAULT_ROLE)
                .unwrap_or_else(|_| "volunteer".to_string()),
            session_require_verified_email: parse_or(KEY_REQUIRE_VERIFIED, false, |_| true)?,
            match_worker_parallelism: parse_or(KEY_WORKERS, 4, |v: usize| v >= 1)?,
            auth_secret: std::env::var(KEY_AUTH_SECRET).map_err(|_| Error::FatalConfig {
                message: format!("{} must be set", KEY_AUTH_SECRET),
            })?,
        })
    }

    /// Fixed configuration for tests: defaults everywhere, a throwaway secret.
    pub fn for_tests() -> Self {
        Self {
            match_min_score: 0.6,
            notify_top_k: 10,
            notify_suppression_days: 14,
            system_sender_id: "system".to_string(),
            role_default_on_register: "volunteer".to_string(),
            session_require_verified_email: false,
            match_worker_parallelism: 4,
            auth_secret: "test-secret".to_string(),
        }
    }
}

fn parse_or<T>(key: &str, default: T, valid: impl Fn(T) -> bool) -> Result<T, Error>
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let parsed = raw.parse::<T>().map_err(|_| Error::FatalConfig {
                message: format!("{} has unparseable value '{}'", key, raw),
            })?;
            if !valid(parsed) {
                return Err(Error::FatalConfig {
                    message: format!("{} has out-of-range value '{}'", key, raw),
                });
            }
            Ok(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::for_tests();
        assert_eq!(config.match_min_score, 0.6);
        assert_eq!(config.notify_top_k, 10);
        assert_eq!(config.notify_suppression_days, 14);
        assert_eq!(config.role_default_on_register, "volunteer");
        assert_eq!(config.match_worker_parallelism, 4);
        assert!(!config.session_require_verified_email);
    }

    #[test]
    fn parse_or_rejects_out_of_range() {
        // SAFETY: test-local env mutation; no other test touches these keys.
        unsafe {
            std::env::set_var("CW_AUTH_SECRET", "secret");
            std::env::set_var("MATCH_MIN_SCORE", "1.5");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.kind(), "fatal-config");
        assert!(err.to_string().contains("MATCH_MIN_SCORE"));
        unsafe { std::env::remove_var("MATCH_MIN_SCORE") };
    }
}
