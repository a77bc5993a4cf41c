//! SQLite UserRepository implementation: users, roles, role bindings.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::utils::current_timestamp;
use crate::db::{DbError, DbResult, Role, User, UserRepository};

/// SQLx-backed user repository.
pub struct SqliteUserRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_digest: row.get("password_digest"),
        verified: row.get("verified"),
        created_at: row.get("created_at"),
    }
}

fn row_to_role(row: &sqlx::sqlite::SqliteRow) -> Role {
    let permissions_json: String = row.get("permissions");
    Role {
        id: row.get("id"),
        name: row.get("name"),
        permissions: serde_json::from_str(&permissions_json).unwrap_or_default(),
    }
}

const USER_COLS: &str = "id, email, password_digest, verified, created_at";

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO user (id, email, password_digest, verified, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.verified)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from_sqlx(e) {
            DbError::Constraint { .. } => DbError::AlreadyExists {
                entity_type: "User".to_string(),
                id: user.email.clone(),
            },
            other => other,
        })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<User> {
        let row = sqlx::query(&format!("SELECT {} FROM user WHERE id = ?", USER_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "User".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_user(&row))
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM user WHERE email = ?", USER_COLS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn set_verified(&self, id: &str, verified: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE user SET verified = ? WHERE id = ?")
            .bind(verified)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "User".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_role_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, permissions FROM role WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_role))
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_role (user_id, role_id, assigned_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(current_timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn roles_for_user(&self, user_id: &str) -> DbResult<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.permissions FROM role r
             JOIN user_role ur ON ur.role_id = r.id
             WHERE ur.user_id = ?
             ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_role).collect())
    }
}
