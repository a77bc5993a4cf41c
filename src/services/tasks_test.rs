//! Task lifecycle tests: the transition matrix and its side effects.

use crate::auth::RequestContext;
use crate::db::sqlite::test_support::{
    create_project, create_user, create_volunteer, ctx, enroll, setup_db, volunteer_ctx,
};
use crate::db::{Database, MessageType, ProjectStatus, SqliteDatabase, Task, TaskStatus};
use crate::services::TaskService;
use crate::services::tasks::NewTask;

struct Fixture {
    db: SqliteDatabase,
    project_id: String,
    lead: RequestContext,
    assignee: RequestContext,
    peer: RequestContext,
}

/// Project with a lead and two enrolled volunteers; the first is the
/// task assignee.
async fn fixture() -> (Fixture, Task) {
    let db = setup_db().await;
    let lead_user = create_user(&db, "lead@example.org").await;
    let assignee_user = create_user(&db, "assignee@example.org").await;
    let peer_user = create_user(&db, "peer@example.org").await;
    let assignee_volunteer = create_volunteer(&db, &assignee_user.id).await;
    let peer_volunteer = create_volunteer(&db, &peer_user.id).await;
    let project =
        create_project(&db, &lead_user.id, Some(&lead_user.id), ProjectStatus::Active).await;
    enroll(&db, &project.id, &assignee_volunteer.id).await;
    enroll(&db, &project.id, &peer_volunteer.id).await;

    let lead = ctx(&lead_user.id, &["team_lead"]);
    let assignee = volunteer_ctx(&assignee_user.id, &assignee_volunteer.id, &["volunteer"]);
    let peer = volunteer_ctx(&peer_user.id, &peer_volunteer.id, &["volunteer"]);

    let task = TaskService::new(&db)
        .create_task(
            &lead,
            &project.id,
            NewTask {
                title: "Design flyers".to_string(),
                assignee_volunteer_id: Some(assignee_volunteer.id.clone()),
                ..NewTask::default()
            },
        )
        .await
        .expect("create task");

    (
        Fixture {
            db,
            project_id: project.id,
            lead,
            assignee,
            peer,
        },
        task,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn only_leads_create_tasks() {
    let (f, _) = fixture().await;
    let err = TaskService::new(&f.db)
        .create_task(
            &f.peer,
            &f.project_id,
            NewTask {
                title: "Nope".to_string(),
                ..NewTask::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");
}

#[tokio::test(flavor = "multi_thread")]
async fn start_sets_started_at_once() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);

    let started = service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");
    assert_eq!(started.status, TaskStatus::InProgress);
    let first_started_at = started.started_at.clone().expect("stamped");

    // Block and resume; the original start time survives.
    service
        .transition(&f.assignee, &task.id, TaskStatus::Blocked, Some("waiting"))
        .await
        .expect("block");
    let resumed = service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("resume");
    assert_eq!(resumed.started_at, Some(first_started_at));
    assert!(resumed.blocked_at.is_none());
    assert!(resumed.blocked_reason.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn blocked_transition_records_everything() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");

    let blocked = service
        .transition(
            &f.assignee,
            &task.id,
            TaskStatus::Blocked,
            Some("waiting on asset"),
        )
        .await
        .expect("block");
    assert_eq!(blocked.status, TaskStatus::Blocked);
    assert!(blocked.blocked_at.is_some());
    assert_eq!(blocked.blocked_reason.as_deref(), Some("waiting on asset"));
    assert!(blocked.completed_at.is_none());
    assert!(blocked.takeover_requested_at.is_none());

    // Exactly one activity row for this edge.
    let activity = f.db.tasks().list_activity(&task.id).await.expect("activity");
    let edges: Vec<(TaskStatus, TaskStatus)> = activity
        .iter()
        .map(|a| (a.from_status, a.to_status))
        .collect();
    assert_eq!(
        edges,
        vec![
            (TaskStatus::Todo, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Blocked),
        ]
    );

    // Exactly one task_blocked message, authored by the assignee and
    // linked to the task.
    let messages = f
        .db
        .messages()
        .list_page(&f.project_id, None, 100, false)
        .await
        .expect("messages");
    let blocked_messages: Vec<_> = messages
        .iter()
        .filter(|m| m.message_type == MessageType::TaskBlocked)
        .collect();
    assert_eq!(blocked_messages.len(), 1);
    assert_eq!(blocked_messages[0].sender_user_id, f.assignee.user_id);
    assert_eq!(blocked_messages[0].task_id.as_deref(), Some(task.id.as_str()));
    assert!(blocked_messages[0].body.contains("waiting on asset"));
}

#[tokio::test(flavor = "multi_thread")]
async fn done_is_lead_or_assignee_and_stamps_completed_at() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");

    // A peer may not complete someone else's task.
    let err = service
        .transition(&f.peer, &task.id, TaskStatus::Done, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");
    // Denied attempts leave no trace.
    assert_eq!(
        f.db.tasks().get(&task.id).await.unwrap().status,
        TaskStatus::InProgress
    );

    let done = service
        .transition(&f.lead, &task.id, TaskStatus::Done, Some("shipped"))
        .await
        .expect("done");
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.completed_at.is_some());
    assert_eq!(done.completion_note.as_deref(), Some("shipped"));

    let messages = f
        .db
        .messages()
        .list_page(&f.project_id, None, 100, false)
        .await
        .expect("messages");
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.message_type == MessageType::TaskDone)
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_edges_are_state_violations() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);

    for to in [TaskStatus::Done, TaskStatus::Blocked, TaskStatus::TakeoverRequested] {
        let err = service
            .transition(&f.assignee, &task.id, to, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state-violation", "todo -> {} should fail", to);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn only_the_assignee_blocks() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");

    // Not even the lead.
    let err = service
        .transition(&f.lead, &task.id, TaskStatus::Blocked, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");
}

#[tokio::test(flavor = "multi_thread")]
async fn unassigned_todo_start_self_assigns() {
    let (f, _) = fixture().await;
    let service = TaskService::new(&f.db);
    let task = service
        .create_task(
            &f.lead,
            &f.project_id,
            NewTask {
                title: "Unowned".to_string(),
                ..NewTask::default()
            },
        )
        .await
        .expect("create");

    let started = service
        .transition(&f.peer, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("self-assigning start");
    assert_eq!(started.status, TaskStatus::InProgress);
    assert_eq!(
        started.assignee_volunteer_id,
        f.peer.volunteer_id.clone()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn takeover_flow_hands_the_task_over() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");

    let requested = service
        .transition(
            &f.assignee,
            &task.id,
            TaskStatus::TakeoverRequested,
            Some("out of time"),
        )
        .await
        .expect("request");
    assert!(requested.takeover_requested_at.is_some());
    assert_eq!(requested.takeover_reason.as_deref(), Some("out of time"));

    // Another member volunteer picks it up and becomes the assignee.
    let taken = service
        .transition(&f.peer, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("takeover");
    assert_eq!(taken.assignee_volunteer_id, f.peer.volunteer_id.clone());
    assert!(taken.takeover_requested_at.is_none());
    assert!(taken.takeover_reason.is_none());

    let messages = f
        .db
        .messages()
        .list_page(&f.project_id, None, 100, false)
        .await
        .expect("messages");
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.message_type == MessageType::TaskTakeover)
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn lead_reassign_returns_to_the_todo_pool() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");
    service
        .transition(&f.assignee, &task.id, TaskStatus::TakeoverRequested, None)
        .await
        .expect("request");

    let reset = service
        .transition(&f.lead, &task.id, TaskStatus::Todo, None)
        .await
        .expect("reassign");
    assert_eq!(reset.status, TaskStatus::Todo);
    assert!(reset.assignee_volunteer_id.is_none());
    assert!(reset.takeover_requested_at.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn reopen_is_lead_only_and_clears_done_stamps() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);
    service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("start");
    service
        .transition(&f.assignee, &task.id, TaskStatus::Done, None)
        .await
        .expect("done");

    let err = service
        .transition(&f.assignee, &task.id, TaskStatus::InProgress, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");

    let reopened = service
        .transition(&f.lead, &task.id, TaskStatus::InProgress, None)
        .await
        .expect("reopen");
    assert_eq!(reopened.status, TaskStatus::InProgress);
    assert!(reopened.completed_at.is_none());
    assert!(reopened.completion_note.is_none());
    assert!(reopened.started_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn timestamp_invariants_hold_through_the_lifecycle() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);

    let check = |task: &Task| {
        assert_eq!(task.completed_at.is_some(), task.status == TaskStatus::Done);
        assert_eq!(task.blocked_at.is_some(), task.status == TaskStatus::Blocked);
        assert_eq!(
            task.takeover_requested_at.is_some(),
            task.status == TaskStatus::TakeoverRequested
        );
    };

    let steps = [
        (TaskStatus::InProgress, &f.assignee),
        (TaskStatus::Blocked, &f.assignee),
        (TaskStatus::InProgress, &f.assignee),
        (TaskStatus::Done, &f.assignee),
        (TaskStatus::InProgress, &f.lead),
    ];
    for (to, actor) in steps {
        let task = service
            .transition(actor, &task.id, to, None)
            .await
            .expect("transition");
        check(&task);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn time_logging_is_assignee_only() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);

    let err = service
        .log_time(&f.peer, &task.id, 1.0, "2026-07-01", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");

    let err = service
        .log_time(&f.assignee, &task.id, 0.0, "2026-07-01", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-input");

    service
        .log_time(&f.assignee, &task.id, 2.5, "2026-07-01", Some("setup"))
        .await
        .expect("log");
    assert_eq!(service.total_hours(&task.id).await.expect("total"), 2.5);
}

#[tokio::test(flavor = "multi_thread")]
async fn comments_are_member_scoped() {
    let (f, task) = fixture().await;
    let service = TaskService::new(&f.db);

    let outsider_user = create_user(&f.db, "outsider@example.org").await;
    let outsider_volunteer = create_volunteer(&f.db, &outsider_user.id).await;
    let outsider = volunteer_ctx(&outsider_user.id, &outsider_volunteer.id, &["volunteer"]);

    let err = service
        .add_comment(&outsider, &task.id, "hi")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");

    service
        .add_comment(&f.peer, &task.id, "need anything?")
        .await
        .expect("comment");
    let comments = service
        .list_comments(&f.assignee, &task.id)
        .await
        .expect("list");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body, "need anything?");
}
