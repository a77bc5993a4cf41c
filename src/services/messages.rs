//! Project message log.
//!
//! Append-only except for the bounded edit window and soft deletion.
//! Reads are receipt-tracked per user; unread counts fan in per project.

use crate::auth::{RequestContext, is_team_member};
use crate::db::utils::{current_timestamp, generate_entity_id, minutes_since};
use crate::db::{
    Database, MESSAGE_BODY_MAX, MESSAGE_EDIT_WINDOW_MINUTES, Message, MessageCursor, MessageType,
};
use crate::error::{Error, Result};

/// Options for sending a message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub recipient_user_id: Option<String>,
    pub task_id: Option<String>,
    pub message_type: Option<MessageType>,
}

/// Message domain service.
pub struct MessageService<'a, D> {
    db: &'a D,
}

impl<'a, D: Database> MessageService<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db }
    }

    pub async fn send(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        body: &str,
        options: SendOptions,
    ) -> Result<Message> {
        ctx.ensure_live()?;
        validate_body(body)?;
        let project = self.db.projects().get(project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }

        let message_type = options.message_type.unwrap_or_default();
        if let Some(task_id) = options.task_id.as_deref() {
            let task = self.db.tasks().get(task_id).await?;
            if task.project_id != project.id {
                return Err(Error::invalid_input(
                    "referenced task belongs to a different project",
                ));
            }
        } else if message_type.is_task_scoped() {
            return Err(Error::invalid_input(
                "task-typed messages must reference a task",
            ));
        }

        let message = Message {
            id: generate_entity_id(),
            project_id: project.id.clone(),
            sender_user_id: ctx.user_id.clone(),
            recipient_user_id: options.recipient_user_id,
            task_id: options.task_id,
            message_type,
            body: body.to_string(),
            created_at: current_timestamp(),
            edited_at: None,
            deleted_at: None,
        };
        self.db.messages().insert(&message).await?;
        Ok(message)
    }

    /// Newest-first page. Soft-deleted messages appear only when
    /// `include_deleted` is set, and then only to an admin or to their
    /// own author.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
        include_deleted: bool,
    ) -> Result<Vec<Message>> {
        let project = self.db.projects().get(project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }

        let messages = self
            .db
            .messages()
            .list_page(project_id, cursor, limit.clamp(1, 200), include_deleted)
            .await?;
        if !include_deleted || ctx.is_admin() {
            return Ok(messages);
        }
        Ok(messages
            .into_iter()
            .filter(|m| m.deleted_at.is_none() || m.sender_user_id == ctx.user_id)
            .collect())
    }

    /// Poll endpoint: messages strictly newer than `since`, oldest first.
    pub async fn list_since(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        since: &str,
    ) -> Result<Vec<Message>> {
        let project = self.db.projects().get(project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }
        Ok(self.db.messages().list_since(project_id, since).await?)
    }

    pub async fn mark_read(&self, ctx: &RequestContext, message_id: &str) -> Result<()> {
        ctx.ensure_live()?;
        let message = self.db.messages().get(message_id).await?;
        let project = self.db.projects().get(&message.project_id).await?;
        let is_recipient = message.recipient_user_id.as_deref() == Some(ctx.user_id.as_str());
        if !is_recipient && !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller cannot read this message"));
        }
        self.db
            .messages()
            .mark_read(&ctx.user_id, message_id, &current_timestamp())
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, ctx: &RequestContext, project_id: &str) -> Result<()> {
        ctx.ensure_live()?;
        let project = self.db.projects().get(project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }
        self.db
            .messages()
            .mark_all_read(&ctx.user_id, project_id, &current_timestamp())
            .await?;
        Ok(())
    }

    pub async fn unread_counts(&self, ctx: &RequestContext) -> Result<Vec<(String, i64)>> {
        Ok(self.db.messages().unread_counts(&ctx.user_id).await?)
    }

    /// Author-only, inside the edit window, and never after deletion.
    pub async fn edit(
        &self,
        ctx: &RequestContext,
        message_id: &str,
        body: &str,
    ) -> Result<Message> {
        ctx.ensure_live()?;
        validate_body(body)?;
        let message = self.db.messages().get(message_id).await?;
        if message.sender_user_id != ctx.user_id {
            return Err(Error::denied("only the author can edit a message"));
        }
        if message.deleted_at.is_some() {
            return Err(Error::state("message has been deleted"));
        }
        let age = minutes_since(&message.created_at)
            .ok_or_else(|| Error::state("message has an unreadable timestamp"))?;
        if age >= MESSAGE_EDIT_WINDOW_MINUTES {
            return Err(Error::state("edit window has closed"));
        }

        let edited_at = current_timestamp();
        self.db
            .messages()
            .set_body(message_id, body, &edited_at)
            .await?;
        Ok(Message {
            body: body.to_string(),
            edited_at: Some(edited_at),
            ..message
        })
    }

    /// Soft delete by the author or an admin; content and read receipts
    /// are preserved for audit.
    pub async fn soft_delete(&self, ctx: &RequestContext, message_id: &str) -> Result<()> {
        ctx.ensure_live()?;
        let message = self.db.messages().get(message_id).await?;
        if message.sender_user_id != ctx.user_id && !ctx.is_admin() {
            return Err(Error::denied("only the author or an admin can delete a message"));
        }
        if message.deleted_at.is_some() {
            return Ok(());
        }
        self.db
            .messages()
            .set_deleted(message_id, &current_timestamp())
            .await?;
        Ok(())
    }
}

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::invalid_input("message body cannot be empty"));
    }
    if body.len() > MESSAGE_BODY_MAX {
        return Err(Error::invalid_input(format!(
            "message body exceeds {} bytes",
            MESSAGE_BODY_MAX
        )));
    }
    Ok(())
}
