//! Message log handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::RequestContext;
use crate::db::{Database, Message, MessageCursor, MessageType};
use crate::services::MessageService;
use crate::services::messages::SendOptions;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub project_id: String,
    pub sender_user_id: String,
    pub recipient_user_id: Option<String>,
    pub task_id: Option<String>,
    #[schema(example = "general")]
    pub message_type: String,
    pub body: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            sender_user_id: m.sender_user_id,
            recipient_user_id: m.recipient_user_id,
            task_id: m.task_id,
            message_type: m.message_type.to_string(),
            body: m.body,
            created_at: m.created_at,
            edited_at: m.edited_at,
            deleted_at: m.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
    pub recipient_user_id: Option<String>,
    pub task_id: Option<String>,
    /// One of general, task_done, task_blocked, task_takeover. Defaults
    /// to general.
    #[schema(example = "general")]
    pub message_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMessagesQuery {
    /// Page size (default 50, max 200)
    pub limit: Option<usize>,
    /// Cursor: created_at of the last message seen
    pub cursor_created_at: Option<String>,
    /// Cursor: id of the last message seen
    pub cursor_id: Option<String>,
    /// Poll mode: return messages strictly newer than this timestamp
    pub since: Option<String>,
    /// Include soft-deleted messages (author or admin)
    pub include_deleted: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct UnreadCountsResponse {
    /// project id → unread message count
    pub counts: std::collections::BTreeMap<String, i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Send a message into the project log (team members).
#[utoipa::path(
    post,
    path = "/projects/{id}/messages",
    tag = "messages",
    params(("id" = String, Path, description = "Project ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Sent", body = MessageResponse),
        (status = 400, description = "Empty or oversized body", body = ErrorResponse),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn send_message<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let message_type = request
        .message_type
        .as_deref()
        .map(|t| t.parse::<MessageType>())
        .transpose()
        .map_err(|e| ApiError::bad_request(e))?;

    let message = MessageService::new(state.db())
        .send(
            &ctx,
            &id,
            &request.body,
            SendOptions {
                recipient_user_id: request.recipient_user_id,
                task_id: request.task_id,
                message_type,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Page through the project log newest-first, or poll with `since`.
#[utoipa::path(
    get,
    path = "/projects/{id}/messages",
    tag = "messages",
    params(("id" = String, Path, description = "Project ID"), ListMessagesQuery),
    responses(
        (status = 200, description = "Messages", body = [MessageResponse]),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_messages<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let service = MessageService::new(state.db());

    let messages = match query.since.as_deref() {
        Some(since) => service.list_since(&ctx, &id, since).await?,
        None => {
            let cursor = match (query.cursor_created_at, query.cursor_id) {
                (Some(created_at), Some(cursor_id)) => Some(MessageCursor {
                    created_at,
                    id: cursor_id,
                }),
                _ => None,
            };
            service
                .list(
                    &ctx,
                    &id,
                    cursor.as_ref(),
                    query.limit.unwrap_or(50),
                    query.include_deleted.unwrap_or(false),
                )
                .await?
        }
    };
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Mark one message read. Idempotent.
#[utoipa::path(
    post,
    path = "/messages/{id}/read",
    tag = "messages",
    params(("id" = String, Path, description = "Message ID")),
    responses(
        (status = 204, description = "Read receipt recorded"),
        (status = 403, description = "No access to this message", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn mark_read<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    MessageService::new(state.db()).mark_read(&ctx, &id).await?;
    state.invalidate_unread(&ctx.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Mark every message of the project read. Idempotent.
#[utoipa::path(
    post,
    path = "/projects/{id}/messages/read-all",
    tag = "messages",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Read receipts recorded"),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn mark_all_read<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    MessageService::new(state.db()).mark_all_read(&ctx, &id).await?;
    state.invalidate_unread(&ctx.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Edit a message (author only, within 15 minutes of creation).
#[utoipa::path(
    patch,
    path = "/messages/{id}",
    tag = "messages",
    params(("id" = String, Path, description = "Message ID")),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Edited", body = MessageResponse),
        (status = 409, description = "Window closed or message deleted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn edit_message<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = MessageService::new(state.db())
        .edit(&ctx, &id, &request.body)
        .await?;
    Ok(Json(message.into()))
}

/// Soft-delete a message (author or admin). Content and read receipts
/// stay for audit.
#[utoipa::path(
    delete,
    path = "/messages/{id}",
    tag = "messages",
    params(("id" = String, Path, description = "Message ID")),
    responses(
        (status = 204, description = "Soft-deleted"),
        (status = 403, description = "Not the author or an admin", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn delete_message<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    MessageService::new(state.db()).soft_delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Per-project unread counts for the caller.
#[utoipa::path(
    get,
    path = "/messages/unread-counts",
    tag = "messages",
    responses(
        (status = 200, description = "project id to unread count", body = UnreadCountsResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn unread_counts<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
) -> Result<Json<UnreadCountsResponse>, ApiError> {
    let counts = state.cached_unread_counts(&ctx.user_id).await?;
    Ok(Json(UnreadCountsResponse {
        counts: counts.into_iter().collect(),
    }))
}
