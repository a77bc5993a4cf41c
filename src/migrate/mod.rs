//! Migration harness.
//!
//! Forward (`up`) and backward (`down`) migrations keyed by a semantic
//! version, recorded in a `schema_migrations` ledger with a sha2 checksum
//! and the runtime version at application time. A compatibility predicate
//! checks the current runtime against the window declared by the highest
//! applied migration, and drift detection compares the live schema's
//! structural fingerprint against a scratch replay of the ledger.

mod catalog;

#[cfg(test)]
mod migrate_test;

use semver::Version;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::db::{DbError, DbResult};

pub use catalog::catalog;

/// One schema migration step.
pub struct Migration {
    /// Semantic version of the schema this migration produces.
    pub version: &'static str,
    pub name: &'static str,
    /// Idempotent forward DDL.
    pub up: &'static str,
    /// Idempotent backward DDL.
    pub down: &'static str,
    /// Lowest runtime version compatible with the resulting schema.
    pub min_runtime: &'static str,
    /// Highest runtime version compatible with the resulting schema.
    pub max_runtime: &'static str,
}

impl Migration {
    /// Checksum over the migration text, hex-encoded.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.up.as_bytes());
        hasher.update(self.down.as_bytes());
        hex_encode(&hasher.finalize())
    }

    fn semver(&self) -> DbResult<Version> {
        Version::parse(self.version).map_err(|e| DbError::Migration {
            message: format!("bad migration version '{}': {}", self.version, e),
        })
    }
}

/// A row of the `schema_migrations` ledger.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub version: String,
    pub checksum: String,
    pub applied_at: String,
    pub runtime_version: String,
}

/// Outcome of a drift check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftReport {
    Clean,
    /// The live schema fingerprint differs from the fingerprint implied
    /// by the applied ledger.
    Drifted { expected: String, actual: String },
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

async fn ensure_ledger(pool: &SqlitePool) -> DbResult<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version         TEXT PRIMARY KEY,
            checksum        TEXT NOT NULL,
            applied_at      TEXT NOT NULL,
            runtime_version TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(DbError::from_sqlx)?;
    Ok(())
}

/// Read the ledger, ordered by semantic version ascending.
pub async fn applied_migrations(pool: &SqlitePool) -> DbResult<Vec<AppliedMigration>> {
    ensure_ledger(pool).await?;
    let rows = sqlx::query(
        "SELECT version, checksum, applied_at, runtime_version FROM schema_migrations",
    )
    .fetch_all(pool)
    .await
    .map_err(DbError::from_sqlx)?;

    let mut applied: Vec<AppliedMigration> = rows
        .iter()
        .map(|row| AppliedMigration {
            version: row.get("version"),
            checksum: row.get("checksum"),
            applied_at: row.get("applied_at"),
            runtime_version: row.get("runtime_version"),
        })
        .collect();
    applied.sort_by_key(|m| Version::parse(&m.version).unwrap_or_else(|_| Version::new(0, 0, 0)));
    Ok(applied)
}

/// Apply every pending migration in version order.
///
/// Already-applied migrations are checksum-verified against the catalog;
/// a mismatch means the migration text changed after application and is
/// reported as a migration error rather than silently re-run.
pub async fn apply_up(pool: &SqlitePool, runtime_version: &str) -> DbResult<usize> {
    ensure_ledger(pool).await?;
    let applied = applied_migrations(pool).await?;
    let now = crate::db::utils::current_timestamp();
    let mut count = 0;

    for migration in catalog() {
        migration.semver()?;
        if let Some(row) = applied.iter().find(|a| a.version == migration.version) {
            if row.checksum != migration.checksum() {
                return Err(DbError::Migration {
                    message: format!(
                        "checksum mismatch for applied migration {}: ledger {}, catalog {}",
                        migration.version,
                        row.checksum,
                        migration.checksum()
                    ),
                });
            }
            continue;
        }

        let mut tx = pool.begin().await.map_err(DbError::from_sqlx)?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration {
                message: format!("migration {} failed: {}", migration.version, e),
            })?;
        sqlx::query(
            "INSERT INTO schema_migrations (version, checksum, applied_at, runtime_version)
             VALUES (?, ?, ?, ?)",
        )
        .bind(migration.version)
        .bind(migration.checksum())
        .bind(&now)
        .bind(runtime_version)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from_sqlx)?;
        tx.commit().await.map_err(DbError::from_sqlx)?;
        count += 1;
    }
    Ok(count)
}

/// Revert applied migrations newer than `target`, newest first.
pub async fn apply_down_to(pool: &SqlitePool, target: &str) -> DbResult<usize> {
    let target = Version::parse(target).map_err(|e| DbError::Migration {
        message: format!("bad target version '{}': {}", target, e),
    })?;
    let applied = applied_migrations(pool).await?;
    let mut count = 0;

    for row in applied.iter().rev() {
        let version = Version::parse(&row.version).map_err(|e| DbError::Migration {
            message: format!("bad ledger version '{}': {}", row.version, e),
        })?;
        if version <= target {
            continue;
        }
        let migration = catalog()
            .iter()
            .find(|m| m.version == row.version)
            .ok_or_else(|| DbError::Migration {
                message: format!("applied migration {} missing from catalog", row.version),
            })?;

        let mut tx = pool.begin().await.map_err(DbError::from_sqlx)?;
        sqlx::raw_sql(migration.down)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration {
                message: format!("down migration {} failed: {}", migration.version, e),
            })?;
        sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
            .bind(&row.version)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        tx.commit().await.map_err(DbError::from_sqlx)?;
        count += 1;
    }
    Ok(count)
}

/// Check that `runtime_version` lies within the `[min, max]` window
/// declared by the highest applied migration.
pub async fn check_compatibility(pool: &SqlitePool, runtime_version: &str) -> DbResult<()> {
    let runtime = Version::parse(runtime_version).map_err(|e| DbError::Migration {
        message: format!("bad runtime version '{}': {}", runtime_version, e),
    })?;
    let applied = applied_migrations(pool).await?;
    let Some(highest) = applied.last() else {
        return Ok(());
    };
    let migration = catalog()
        .iter()
        .find(|m| m.version == highest.version)
        .ok_or_else(|| DbError::Migration {
            message: format!("applied migration {} missing from catalog", highest.version),
        })?;

    let min = Version::parse(migration.min_runtime).map_err(|e| DbError::Migration {
        message: format!("bad min_runtime '{}': {}", migration.min_runtime, e),
    })?;
    let max = Version::parse(migration.max_runtime).map_err(|e| DbError::Migration {
        message: format!("bad max_runtime '{}': {}", migration.max_runtime, e),
    })?;
    if runtime < min || runtime > max {
        return Err(DbError::Migration {
            message: format!(
                "runtime {} outside compatibility window [{}, {}] of schema {}",
                runtime, min, max, migration.version
            ),
        });
    }
    Ok(())
}

/// Structural fingerprint of the live schema: a checksum over the
/// normalized DDL of every non-internal table and index.
pub async fn schema_fingerprint(pool: &SqlitePool) -> DbResult<String> {
    let rows = sqlx::query(
        "SELECT type, name, COALESCE(sql, '') AS sql FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%' AND name != 'schema_migrations'
         ORDER BY type, name",
    )
    .fetch_all(pool)
    .await
    .map_err(DbError::from_sqlx)?;

    let mut hasher = Sha256::new();
    for row in rows {
        let kind: String = row.get("type");
        let name: String = row.get("name");
        let sql: String = row.get("sql");
        let normalized: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        hasher.update(kind.as_bytes());
        hasher.update(b"|");
        hasher.update(name.as_bytes());
        hasher.update(b"|");
        hasher.update(normalized.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Compare the live schema against a scratch replay of the applied ledger.
pub async fn detect_drift(pool: &SqlitePool) -> DbResult<DriftReport> {
    let applied = applied_migrations(pool).await?;

    let scratch = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(DbError::from_sqlx)?;
    for row in &applied {
        let migration = catalog()
            .iter()
            .find(|m| m.version == row.version)
            .ok_or_else(|| DbError::Migration {
                message: format!("applied migration {} missing from catalog", row.version),
            })?;
        sqlx::raw_sql(migration.up)
            .execute(&scratch)
            .await
            .map_err(|e| DbError::Migration {
                message: format!("replay of {} failed: {}", migration.version, e),
            })?;
    }

    let expected = schema_fingerprint(&scratch).await?;
    let actual = schema_fingerprint(pool).await?;
    if expected == actual {
        Ok(DriftReport::Clean)
    } else {
        Ok(DriftReport::Drifted { expected, actual })
    }
}
