//! Repository traits for data access abstraction.
//!
//! These traits define the contract for data access, allowing different
//! storage backends to be swapped without changing the matching, messaging,
//! or task logic.

use async_trait::async_trait;

use crate::db::{
    DbResult,
    models::{
        Application, ApplicationStatus, ClaimInput, MatchRecord, Message, MessageCursor,
        NotificationRecord, Project, Role, Skill, Task, TaskActivity, TaskComment, TaskTimeLog,
        TeamMember, User, Volunteer, VolunteerClaim, WeightOverride,
    },
};

/// Repository for the append-only skill taxonomy.
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Case-insensitive lookup by normalized name; insert if absent.
    /// Idempotent: repeated calls return the same row.
    async fn upsert(&self, name: &str, category: Option<&str>) -> DbResult<Skill>;

    /// Get a skill by id.
    async fn get(&self, id: &str) -> DbResult<Skill>;

    /// All skills, ordered by identifier.
    async fn list(&self) -> DbResult<Vec<Skill>>;
}

/// Repository for users and role bindings.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user. Fails with AlreadyExists on a duplicate email.
    async fn create(&self, user: &User) -> DbResult<()>;

    /// Get a user by id.
    async fn get(&self, id: &str) -> DbResult<User>;

    /// Look a user up by email.
    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// Flip the verified flag.
    async fn set_verified(&self, id: &str, verified: bool) -> DbResult<()>;

    /// Get a role by its unique name.
    async fn get_role_by_name(&self, name: &str) -> DbResult<Option<Role>>;

    /// Bind a role to a user. Idempotent.
    async fn assign_role(&self, user_id: &str, role_id: &str) -> DbResult<()>;

    /// All roles bound to a user.
    async fn roles_for_user(&self, user_id: &str) -> DbResult<Vec<Role>>;
}

/// Repository for volunteer profiles, claims, and the override audit trail.
#[async_trait]
pub trait VolunteerRepository: Send + Sync {
    async fn create(&self, volunteer: &Volunteer) -> DbResult<()>;

    async fn get(&self, id: &str) -> DbResult<Volunteer>;

    /// The volunteer profile owned by a user, if any.
    async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Volunteer>>;

    /// Full claim replacement within one transaction. Claims for skills
    /// absent from `claims` are deactivated, not deleted.
    async fn set_claims(&self, volunteer_id: &str, claims: &[ClaimInput]) -> DbResult<()>;

    /// Active claims only, the matcher's input.
    async fn get_active_claims(&self, volunteer_id: &str) -> DbResult<Vec<VolunteerClaim>>;

    /// One claim row, active or not.
    async fn get_claim(&self, volunteer_id: &str, skill_id: &str)
    -> DbResult<Option<VolunteerClaim>>;

    /// Set a claim's weight and append the audit override in one
    /// transaction. Fails with NotFound when the claim does not exist.
    async fn adjust_weight(
        &self,
        volunteer_id: &str,
        skill_id: &str,
        new_weight: f64,
        adjuster_user_id: &str,
        reason: Option<&str>,
    ) -> DbResult<WeightOverride>;

    /// Audit trail for one claim, oldest first.
    async fn list_overrides(
        &self,
        volunteer_id: &str,
        skill_id: &str,
    ) -> DbResult<Vec<WeightOverride>>;

    /// Ids of volunteers with at least one active claim.
    async fn list_active_volunteer_ids(&self) -> DbResult<Vec<String>>;
}

/// Repository for projects, requirements, applications, and team membership.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> DbResult<()>;

    async fn get(&self, id: &str) -> DbResult<Project>;

    async fn list(&self) -> DbResult<Vec<Project>>;

    async fn update(&self, project: &Project) -> DbResult<()>;

    /// Projects with status recruiting or active and a non-empty
    /// requirement set.
    async fn list_matchable(&self) -> DbResult<Vec<Project>>;

    /// Replace the project's requirement skill set in one transaction.
    async fn set_requirements(&self, project_id: &str, skill_ids: &[String]) -> DbResult<()>;

    /// Requirement skill ids, ordered.
    async fn get_requirements(&self, project_id: &str) -> DbResult<Vec<String>>;

    /// Create an application. Fails with Constraint when the volunteer
    /// already has a pending or accepted application for the project.
    async fn create_application(&self, application: &Application) -> DbResult<()>;

    async fn get_application(&self, id: &str) -> DbResult<Application>;

    async fn list_applications(&self, project_id: &str) -> DbResult<Vec<Application>>;

    /// Transition a pending application. When the target is `accepted`
    /// the team-member upsert commits in the same transaction. Returns
    /// false when the application was not pending at write time.
    async fn decide_application(
        &self,
        application_id: &str,
        to: ApplicationStatus,
    ) -> DbResult<bool>;

    async fn get_team_member(
        &self,
        project_id: &str,
        volunteer_id: &str,
    ) -> DbResult<Option<TeamMember>>;

    async fn list_team(&self, project_id: &str) -> DbResult<Vec<TeamMember>>;

    /// Whether the user leads any project whose requirements include the
    /// skill. Backs the claim-weight authority predicate.
    async fn leads_project_requiring(&self, user_id: &str, skill_id: &str) -> DbResult<bool>;
}

/// Repository for the materialized match index.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Per-pair upsert; per-row atomicity is the only write guarantee.
    async fn upsert(&self, record: &MatchRecord) -> DbResult<()>;

    /// Drop a pair whose intersection became empty.
    async fn delete_pair(&self, volunteer_id: &str, project_id: &str) -> DbResult<()>;

    async fn get(&self, volunteer_id: &str, project_id: &str) -> DbResult<Option<MatchRecord>>;

    /// Records for a project, descending score, volunteer id ascending
    /// as the stable tie-break.
    async fn for_project(
        &self,
        project_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>>;

    /// Symmetric to `for_project`.
    async fn for_volunteer(
        &self,
        volunteer_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>>;

    /// As `for_project`, restricted to volunteers with skills_visible=true.
    async fn top_visible_candidates(
        &self,
        project_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>>;
}

/// Repository for planner notification records.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert one record. Fails with Constraint on a duplicate
    /// (project, volunteer, batch) key.
    async fn insert(&self, record: &NotificationRecord) -> DbResult<()>;

    /// Most recent sent_at for a (project, volunteer) pair across batches.
    async fn last_notified_at(
        &self,
        project_id: &str,
        volunteer_id: &str,
    ) -> DbResult<Option<String>>;

    async fn list_for_batch(&self, batch_id: &str) -> DbResult<Vec<NotificationRecord>>;
}

/// Repository for the project message log and read receipts.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> DbResult<()>;

    async fn get(&self, id: &str) -> DbResult<Message>;

    /// Newest-first page. The cursor is exclusive: rows strictly older
    /// than (created_at, id).
    async fn list_page(
        &self,
        project_id: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
        include_deleted: bool,
    ) -> DbResult<Vec<Message>>;

    /// Messages with created_at strictly greater than `since`, ascending.
    async fn list_since(&self, project_id: &str, since: &str) -> DbResult<Vec<Message>>;

    async fn set_body(&self, id: &str, body: &str, edited_at: &str) -> DbResult<()>;

    async fn set_deleted(&self, id: &str, deleted_at: &str) -> DbResult<()>;

    /// Record a read receipt. Idempotent: re-marking is a no-op.
    async fn mark_read(&self, user_id: &str, message_id: &str, read_at: &str) -> DbResult<()>;

    /// Mark every unread message of the project read for the user.
    async fn mark_all_read(&self, user_id: &str, project_id: &str, read_at: &str) -> DbResult<()>;

    /// Whether a read receipt exists.
    async fn is_read(&self, user_id: &str, message_id: &str) -> DbResult<bool>;

    /// Per-project unread counts for the user: messages of projects the
    /// user's volunteer is an active member of (or leads), excluding the
    /// user's own messages and soft-deleted ones, minus read receipts.
    async fn unread_counts(&self, user_id: &str) -> DbResult<Vec<(String, i64)>>;
}

/// Repository for tasks, activity, comments, and time logs.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DbResult<Task>;

    async fn get(&self, id: &str) -> DbResult<Task>;

    async fn list_by_project(&self, project_id: &str) -> DbResult<Vec<Task>>;

    async fn update(&self, task: &Task) -> DbResult<()>;

    async fn insert_activity(&self, activity: &TaskActivity) -> DbResult<()>;

    /// Activity entries for a task, ordered by created_at ascending.
    async fn list_activity(&self, task_id: &str) -> DbResult<Vec<TaskActivity>>;

    async fn insert_comment(&self, comment: &TaskComment) -> DbResult<()>;

    async fn list_comments(&self, task_id: &str) -> DbResult<Vec<TaskComment>>;

    async fn insert_time_log(&self, log: &TaskTimeLog) -> DbResult<()>;

    async fn list_time_logs(&self, task_id: &str) -> DbResult<Vec<TaskTimeLog>>;

    async fn total_hours(&self, task_id: &str) -> DbResult<f64>;

    async fn project_hours(&self, project_id: &str) -> DbResult<f64>;

    async fn volunteer_project_hours(
        &self,
        volunteer_id: &str,
        project_id: &str,
    ) -> DbResult<f64>;
}

/// Process-wide advisory locks for batch jobs.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Try to take the named lock. A held lock older than
    /// `stale_after_seconds` is treated as abandoned and stolen.
    async fn try_acquire(&self, name: &str, holder: &str, stale_after_seconds: i64)
    -> DbResult<bool>;

    /// Release the named lock if this holder owns it.
    async fn release(&self, name: &str, holder: &str) -> DbResult<()>;
}

/// Combined database interface.
pub trait Database: Send + Sync {
    /// Apply pending migrations.
    fn migrate(&self) -> impl std::future::Future<Output = DbResult<()>>;

    fn skills(&self) -> &dyn SkillRepository;

    fn users(&self) -> &dyn UserRepository;

    fn volunteers(&self) -> &dyn VolunteerRepository;

    fn projects(&self) -> &dyn ProjectRepository;

    fn matches(&self) -> &dyn MatchRepository;

    fn notifications(&self) -> &dyn NotificationRepository;

    fn messages(&self) -> &dyn MessageRepository;

    fn tasks(&self) -> &dyn TaskRepository;

    fn locks(&self) -> &dyn LockRepository;
}
