//! Domain models.
//!
//! Storage-agnostic entities for the matching engine, the notification
//! pipeline, and the team workspace.

use serde::{Deserialize, Serialize};

// =============================================================================
// Limits
// =============================================================================

/// Hard maximum for a message body (bytes of UTF-8).
pub const MESSAGE_BODY_MAX: usize = 16 * 1024;

/// Window after creation during which the author may edit a message.
pub const MESSAGE_EDIT_WINDOW_MINUTES: i64 = 15;

/// Claim weight used when the caller does not supply one.
pub const DEFAULT_CLAIM_WEIGHT: f64 = 0.5;

// =============================================================================
// Role names
// =============================================================================

pub const ROLE_VOLUNTEER: &str = "volunteer";
pub const ROLE_TEAM_LEAD: &str = "team_lead";
pub const ROLE_CAMPAIGN_MANAGER: &str = "campaign_manager";
pub const ROLE_ADMIN: &str = "admin";

/// UUID string ID type used for all entities.
pub type Id = String;

// =============================================================================
// Identity
// =============================================================================

/// An authenticated account. The credential is stored digest-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub verified: bool,
    pub created_at: String,
}

/// A named role with its permission tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,
    pub name: String,
    pub permissions: Vec<String>,
}

/// A volunteer profile owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: Id,
    pub user_id: Id,
    /// When false the volunteer is excluded from candidate notification.
    pub skills_visible: bool,
    pub location: Option<String>,
    pub created_at: String,
}

// =============================================================================
// Skill taxonomy and claims
// =============================================================================

/// An entry in the append-only global skill catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Id,
    pub name: String,
    pub category: Option<String>,
    pub created_at: String,
}

/// A volunteer's weighted assertion of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolunteerClaim {
    pub volunteer_id: Id,
    pub skill_id: Id,
    /// In [0.0, 1.0]; clamped on write.
    pub weight: f64,
    /// In 1..=5; clamped on write.
    pub proficiency: i32,
    pub active: bool,
    pub updated_at: String,
}

/// Input for a full claim replacement.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimInput {
    pub skill_id: Id,
    pub weight: Option<f64>,
    pub proficiency: Option<i32>,
}

/// Append-only audit row for a claim weight adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightOverride {
    pub id: Id,
    pub volunteer_id: Id,
    pub skill_id: Id,
    pub adjuster_user_id: Id,
    pub previous_weight: f64,
    pub new_weight: f64,
    pub reason: Option<String>,
    pub created_at: String,
}

// =============================================================================
// Projects
// =============================================================================

/// A civic project recruiting and coordinating volunteers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub lead_user_id: Option<Id>,
    pub creator_user_id: Id,
    pub location: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub budget_total: Option<f64>,
    pub budget_spent: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Recruiting,
    Active,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    /// Projects in these states take part in matching and notification.
    pub fn is_eligible_for_matching(&self) -> bool {
        matches!(self, ProjectStatus::Recruiting | ProjectStatus::Active)
    }

    /// Restricted status edges. Completed and cancelled are terminal;
    /// an active project may fall back to recruiting.
    pub fn can_transition_to(&self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, to),
            (Draft, Recruiting)
                | (Draft, Cancelled)
                | (Recruiting, Active)
                | (Recruiting, Cancelled)
                | (Active, Recruiting)
                | (Active, Completed)
                | (Active, Cancelled)
        )
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Draft => write!(f, "draft"),
            ProjectStatus::Recruiting => write!(f, "recruiting"),
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "recruiting" => Ok(ProjectStatus::Recruiting),
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(format!("Unknown project status: {}", s)),
        }
    }
}

/// A volunteer's application to join a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: Id,
    pub project_id: Id,
    pub volunteer_id: Id,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub created_at: String,
    pub decided_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Accepted => write!(f, "accepted"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
            ApplicationStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "withdrawn" => Ok(ApplicationStatus::Withdrawn),
            _ => Err(format!("Unknown application status: {}", s)),
        }
    }
}

/// A volunteer's membership on a project team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub project_id: Id,
    pub volunteer_id: Id,
    pub status: MemberStatus,
    pub joined_at: String,
    pub left_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Removed,
    Completed,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Active => write!(f, "active"),
            MemberStatus::Removed => write!(f, "removed"),
            MemberStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "removed" => Ok(MemberStatus::Removed),
            "completed" => Ok(MemberStatus::Completed),
            _ => Err(format!("Unknown member status: {}", s)),
        }
    }
}

// =============================================================================
// Match index and notifications
// =============================================================================

/// Materialized score for one (volunteer, project) pair.
///
/// The matched skill set is always the intersection of the volunteer's
/// active claims and the project's requirements at compute time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub volunteer_id: Id,
    pub project_id: Id,
    /// Weighted cosine score in [0, 1].
    pub score: f64,
    /// Jaccard index of the skill id sets, in [0, 1].
    pub jaccard: f64,
    pub matched_skill_ids: Vec<Id>,
    pub matched_skill_count: i32,
    pub computed_at: String,
}

/// Durable record that a candidate was notified for a project in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Id,
    pub project_id: Id,
    pub volunteer_id: Id,
    pub score: f64,
    pub sent_at: String,
    pub batch_id: Id,
}

// =============================================================================
// Messages
// =============================================================================

/// A project-scoped message. Append-only apart from the bounded edit
/// window and soft deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub project_id: Id,
    pub sender_user_id: Id,
    /// None for broadcast to the whole team.
    pub recipient_user_id: Option<Id>,
    pub task_id: Option<Id>,
    pub message_type: MessageType,
    pub body: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    General,
    TaskDone,
    TaskBlocked,
    TaskTakeover,
    CandidateMatch,
    TeamLeadSummary,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::General => write!(f, "general"),
            MessageType::TaskDone => write!(f, "task_done"),
            MessageType::TaskBlocked => write!(f, "task_blocked"),
            MessageType::TaskTakeover => write!(f, "task_takeover"),
            MessageType::CandidateMatch => write!(f, "candidate_match"),
            MessageType::TeamLeadSummary => write!(f, "team_lead_summary"),
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(MessageType::General),
            "task_done" => Ok(MessageType::TaskDone),
            "task_blocked" => Ok(MessageType::TaskBlocked),
            "task_takeover" => Ok(MessageType::TaskTakeover),
            "candidate_match" => Ok(MessageType::CandidateMatch),
            "team_lead_summary" => Ok(MessageType::TeamLeadSummary),
            _ => Err(format!("Unknown message type: {}", s)),
        }
    }
}

impl MessageType {
    /// Message types that must reference a task in the same project.
    pub fn is_task_scoped(&self) -> bool {
        matches!(
            self,
            MessageType::TaskDone | MessageType::TaskBlocked | MessageType::TaskTakeover
        )
    }
}

/// Cursor for message pagination: strictly older than (created_at, id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCursor {
    pub created_at: String,
    pub id: Id,
}

// =============================================================================
// Tasks
// =============================================================================

/// An individual work item within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub project_id: Id,
    pub title: String,
    pub description: Option<String>,
    pub assignee_volunteer_id: Option<Id>,
    pub creator_user_id: Id,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<String>,
    pub labels: Vec<String>,
    pub started_at: Option<String>,
    pub blocked_at: Option<String>,
    pub completed_at: Option<String>,
    pub takeover_requested_at: Option<String>,
    pub blocked_reason: Option<String>,
    pub completion_note: Option<String>,
    pub takeover_reason: Option<String>,
    pub last_status_changed_by: Option<Id>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Blocked,
    TakeoverRequested,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::TakeoverRequested => write!(f, "takeover_requested"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            "takeover_requested" => Ok(TaskStatus::TakeoverRequested),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(format!("Invalid task priority: {}", s)),
        }
    }
}

/// Append-only record of one task status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskActivity {
    pub id: Id,
    pub task_id: Id,
    pub actor_user_id: Id,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    /// Free-form context (reason notes, reassignment detail).
    pub context: Option<serde_json::Value>,
    pub created_at: String,
}

/// A comment on a task, visible to all team members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: Id,
    pub task_id: Id,
    pub author_user_id: Id,
    pub body: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// Hours logged against a task by a volunteer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTimeLog {
    pub id: Id,
    pub task_id: Id,
    pub volunteer_id: Id,
    pub hours: f64,
    pub log_date: String,
    pub description: Option<String>,
    pub created_at: String,
}
