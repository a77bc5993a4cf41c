//! The ordered migration catalog.
//!
//! Every migration is idempotent (guarded DDL) so re-application is safe.
//! `min_runtime`/`max_runtime` declare the runtime versions the resulting
//! schema is compatible with.

use super::Migration;

pub fn catalog() -> &'static [Migration] {
    MIGRATIONS
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0.1.0",
        name: "identity_and_roles",
        min_runtime: "0.1.0",
        max_runtime: "1.0.0",
        up: r#"
CREATE TABLE IF NOT EXISTS user (
    id              TEXT PRIMARY KEY,
    email           TEXT NOT NULL UNIQUE,
    password_digest TEXT NOT NULL,
    verified        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    permissions TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS user_role (
    user_id     TEXT NOT NULL REFERENCES user(id),
    role_id     TEXT NOT NULL REFERENCES role(id),
    assigned_at TEXT NOT NULL,
    PRIMARY KEY (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS volunteer (
    id             TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL UNIQUE REFERENCES user(id),
    skills_visible INTEGER NOT NULL DEFAULT 1,
    location       TEXT,
    created_at     TEXT NOT NULL
);

INSERT OR IGNORE INTO role (id, name, permissions) VALUES
    ('role-volunteer', 'volunteer', '["apply","claim_skills","log_time"]'),
    ('role-team-lead', 'team_lead', '["manage_tasks","review_applications","adjust_weights"]'),
    ('role-campaign-manager', 'campaign_manager', '["create_projects","manage_taxonomy"]'),
    ('role-admin', 'admin', '["all"]');

INSERT OR IGNORE INTO user (id, email, password_digest, verified, created_at)
    VALUES ('system', 'system@civicweave.invalid', '!', 1, '1970-01-01 00:00:00');
"#,
        down: r#"
DROP TABLE IF EXISTS volunteer;
DROP TABLE IF EXISTS user_role;
DROP TABLE IF EXISTS role;
DROP TABLE IF EXISTS user;
"#,
    },
    Migration {
        version: "0.2.0",
        name: "taxonomy_and_claims",
        min_runtime: "0.1.0",
        max_runtime: "1.0.0",
        up: r#"
CREATE TABLE IF NOT EXISTS skill (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    category        TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS volunteer_claim (
    volunteer_id TEXT NOT NULL REFERENCES volunteer(id),
    skill_id     TEXT NOT NULL REFERENCES skill(id),
    weight       REAL NOT NULL,
    proficiency  INTEGER NOT NULL,
    active       INTEGER NOT NULL DEFAULT 1,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (volunteer_id, skill_id)
);

CREATE TABLE IF NOT EXISTS weight_override (
    id               TEXT PRIMARY KEY,
    volunteer_id     TEXT NOT NULL,
    skill_id         TEXT NOT NULL,
    adjuster_user_id TEXT NOT NULL,
    previous_weight  REAL NOT NULL,
    new_weight       REAL NOT NULL,
    reason           TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_claim_skill ON volunteer_claim(skill_id) WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_override_claim ON weight_override(volunteer_id, skill_id);
"#,
        down: r#"
DROP TABLE IF EXISTS weight_override;
DROP TABLE IF EXISTS volunteer_claim;
DROP TABLE IF EXISTS skill;
"#,
    },
    Migration {
        version: "0.3.0",
        name: "projects_and_enrollment",
        min_runtime: "0.1.0",
        max_runtime: "1.0.0",
        up: r#"
CREATE TABLE IF NOT EXISTS project (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    description     TEXT,
    status          TEXT NOT NULL DEFAULT 'draft',
    lead_user_id    TEXT REFERENCES user(id),
    creator_user_id TEXT NOT NULL REFERENCES user(id),
    location        TEXT,
    starts_on       TEXT,
    ends_on         TEXT,
    budget_total    REAL,
    budget_spent    REAL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_requirement (
    project_id TEXT NOT NULL REFERENCES project(id),
    skill_id   TEXT NOT NULL REFERENCES skill(id),
    PRIMARY KEY (project_id, skill_id)
);

CREATE TABLE IF NOT EXISTS application (
    id           TEXT PRIMARY KEY,
    project_id   TEXT NOT NULL REFERENCES project(id),
    volunteer_id TEXT NOT NULL REFERENCES volunteer(id),
    status       TEXT NOT NULL DEFAULT 'pending',
    message      TEXT,
    created_at   TEXT NOT NULL,
    decided_at   TEXT
);

CREATE TABLE IF NOT EXISTS team_member (
    project_id   TEXT NOT NULL REFERENCES project(id),
    volunteer_id TEXT NOT NULL REFERENCES volunteer(id),
    status       TEXT NOT NULL DEFAULT 'active',
    joined_at    TEXT NOT NULL,
    left_at      TEXT,
    PRIMARY KEY (project_id, volunteer_id)
);

CREATE INDEX IF NOT EXISTS idx_project_status ON project(status);
CREATE INDEX IF NOT EXISTS idx_application_project ON application(project_id, status);
"#,
        down: r#"
DROP TABLE IF EXISTS team_member;
DROP TABLE IF EXISTS application;
DROP TABLE IF EXISTS project_requirement;
DROP TABLE IF EXISTS project;
"#,
    },
    Migration {
        version: "0.4.0",
        name: "workspace",
        min_runtime: "0.1.0",
        max_runtime: "1.0.0",
        up: r#"
CREATE TABLE IF NOT EXISTS task (
    id                     TEXT PRIMARY KEY,
    project_id             TEXT NOT NULL REFERENCES project(id),
    title                  TEXT NOT NULL,
    description            TEXT,
    assignee_volunteer_id  TEXT REFERENCES volunteer(id),
    creator_user_id        TEXT NOT NULL REFERENCES user(id),
    status                 TEXT NOT NULL DEFAULT 'todo',
    priority               TEXT NOT NULL DEFAULT 'medium',
    due_at                 TEXT,
    labels                 TEXT NOT NULL DEFAULT '[]',
    started_at             TEXT,
    blocked_at             TEXT,
    completed_at           TEXT,
    takeover_requested_at  TEXT,
    blocked_reason         TEXT,
    completion_note        TEXT,
    takeover_reason        TEXT,
    last_status_changed_by TEXT,
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_activity (
    id            TEXT PRIMARY KEY,
    task_id       TEXT NOT NULL REFERENCES task(id),
    actor_user_id TEXT NOT NULL,
    from_status   TEXT NOT NULL,
    to_status     TEXT NOT NULL,
    context       TEXT,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_comment (
    id             TEXT PRIMARY KEY,
    task_id        TEXT NOT NULL REFERENCES task(id),
    author_user_id TEXT NOT NULL,
    body           TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    edited_at      TEXT
);

CREATE TABLE IF NOT EXISTS task_time_log (
    id           TEXT PRIMARY KEY,
    task_id      TEXT NOT NULL REFERENCES task(id),
    volunteer_id TEXT NOT NULL REFERENCES volunteer(id),
    hours        REAL NOT NULL CHECK (hours > 0),
    log_date     TEXT NOT NULL,
    description  TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message (
    id                TEXT PRIMARY KEY,
    project_id        TEXT NOT NULL REFERENCES project(id),
    sender_user_id    TEXT NOT NULL REFERENCES user(id),
    recipient_user_id TEXT,
    task_id           TEXT,
    message_type      TEXT NOT NULL DEFAULT 'general',
    body              TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    edited_at         TEXT,
    deleted_at        TEXT
);

CREATE TABLE IF NOT EXISTS message_read (
    user_id    TEXT NOT NULL,
    message_id TEXT NOT NULL REFERENCES message(id),
    read_at    TEXT NOT NULL,
    PRIMARY KEY (user_id, message_id)
);

CREATE INDEX IF NOT EXISTS idx_task_project ON task(project_id);
CREATE INDEX IF NOT EXISTS idx_activity_task ON task_activity(task_id, created_at);
CREATE INDEX IF NOT EXISTS idx_time_log_task ON task_time_log(task_id);
CREATE INDEX IF NOT EXISTS idx_message_project ON message(project_id, created_at, id);
"#,
        down: r#"
DROP TABLE IF EXISTS message_read;
DROP TABLE IF EXISTS message;
DROP TABLE IF EXISTS task_time_log;
DROP TABLE IF EXISTS task_comment;
DROP TABLE IF EXISTS task_activity;
DROP TABLE IF EXISTS task;
"#,
    },
    Migration {
        version: "0.5.0",
        name: "match_pipeline",
        min_runtime: "0.2.0",
        max_runtime: "1.0.0",
        up: r#"
CREATE TABLE IF NOT EXISTS match_record (
    volunteer_id        TEXT NOT NULL REFERENCES volunteer(id),
    project_id          TEXT NOT NULL REFERENCES project(id),
    score               REAL NOT NULL,
    jaccard             REAL NOT NULL,
    matched_skill_ids   TEXT NOT NULL DEFAULT '[]',
    matched_skill_count INTEGER NOT NULL DEFAULT 0,
    computed_at         TEXT NOT NULL,
    PRIMARY KEY (volunteer_id, project_id)
);

CREATE TABLE IF NOT EXISTS notification_record (
    id           TEXT PRIMARY KEY,
    project_id   TEXT NOT NULL REFERENCES project(id),
    volunteer_id TEXT NOT NULL REFERENCES volunteer(id),
    score        REAL NOT NULL,
    sent_at      TEXT NOT NULL,
    batch_id     TEXT NOT NULL,
    UNIQUE (project_id, volunteer_id, batch_id)
);

CREATE TABLE IF NOT EXISTS batch_lock (
    name        TEXT PRIMARY KEY,
    holder      TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_match_project_score ON match_record(project_id, score);
CREATE INDEX IF NOT EXISTS idx_notification_pair ON notification_record(project_id, volunteer_id, sent_at);
"#,
        down: r#"
DROP TABLE IF EXISTS batch_lock;
DROP TABLE IF EXISTS notification_record;
DROP TABLE IF EXISTS match_record;
"#,
    },
];
