//! SQLite database connection and migration entry point.

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::lock::SqliteLockRepository;
use super::match_index::SqliteMatchRepository;
use super::message::SqliteMessageRepository;
use super::notification::SqliteNotificationRepository;
use super::project::SqliteProjectRepository;
use super::skill::SqliteSkillRepository;
use super::task::SqliteTaskRepository;
use super::user::SqliteUserRepository;
use super::volunteer::SqliteVolunteerRepository;
use crate::db::{
    Database, DbError, DbResult, LockRepository, MatchRepository, MessageRepository,
    NotificationRepository, ProjectRepository, SkillRepository, TaskRepository, UserRepository,
    VolunteerRepository,
};

/// SQLite database implementation.
///
/// Repositories share the pool; sqlx pools are cheap handle clones.
pub struct SqliteDatabase {
    pool: SqlitePool,
    skills: SqliteSkillRepository,
    users: SqliteUserRepository,
    volunteers: SqliteVolunteerRepository,
    projects: SqliteProjectRepository,
    matches: SqliteMatchRepository,
    notifications: SqliteNotificationRepository,
    messages: SqliteMessageRepository,
    tasks: SqliteTaskRepository,
    locks: SqliteLockRepository,
}

impl SqliteDatabase {
    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            skills: SqliteSkillRepository { pool: pool.clone() },
            users: SqliteUserRepository { pool: pool.clone() },
            volunteers: SqliteVolunteerRepository { pool: pool.clone() },
            projects: SqliteProjectRepository { pool: pool.clone() },
            matches: SqliteMatchRepository { pool: pool.clone() },
            notifications: SqliteNotificationRepository { pool: pool.clone() },
            messages: SqliteMessageRepository { pool: pool.clone() },
            tasks: SqliteTaskRepository { pool: pool.clone() },
            locks: SqliteLockRepository { pool: pool.clone() },
            pool,
        }
    }

    /// Open (creating if missing) a database at the given path.
    pub async fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            path.as_ref().display()
        ))
        .map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// Capped at a single connection: each SQLite in-memory connection is
    /// its own database.
    pub async fn in_memory() -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;
        Ok(Self::from_pool(pool))
    }

    /// The underlying pool, for the migration harness and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Database for SqliteDatabase {
    async fn migrate(&self) -> DbResult<()> {
        crate::migrate::apply_up(&self.pool, crate::RUNTIME_VERSION).await?;
        crate::migrate::check_compatibility(&self.pool, crate::RUNTIME_VERSION).await?;
        Ok(())
    }

    fn skills(&self) -> &dyn SkillRepository {
        &self.skills
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }

    fn volunteers(&self) -> &dyn VolunteerRepository {
        &self.volunteers
    }

    fn projects(&self) -> &dyn ProjectRepository {
        &self.projects
    }

    fn matches(&self) -> &dyn MatchRepository {
        &self.matches
    }

    fn notifications(&self) -> &dyn NotificationRepository {
        &self.notifications
    }

    fn messages(&self) -> &dyn MessageRepository {
        &self.messages
    }

    fn tasks(&self) -> &dyn TaskRepository {
        &self.tasks
    }

    fn locks(&self) -> &dyn LockRepository {
        &self.locks
    }
}
