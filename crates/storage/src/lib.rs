use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{DisplayId, OrganizationId, WorkoutId},
    protocol::{SessionPatch, SessionState},
    workout::{Workout, WorkoutSummary},
};

mod memory;

pub use memory::{MemorySessionStore, MemoryWorkoutStore, StoreWrite, WriteOp};

/// Every snapshot of one display's document, starting with the current one.
/// `None` is the cleared (destroyed) session.
pub type SessionStream = BoxStream<'static, Option<SessionState>>;

/// Per-display shared session documents keyed by (organization, display).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
    ) -> Result<Option<SessionState>>;

    /// Merge `patch` into the document, creating it if the session was cleared.
    async fn patch(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
        patch: SessionPatch,
    ) -> Result<()>;

    /// Full null write: the session ends.
    async fn clear(&self, organization_id: &OrganizationId, display_id: &DisplayId)
        -> Result<()>;

    async fn subscribe(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
    ) -> Result<SessionStream>;
}

#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn save(&self, workout: &Workout) -> Result<WorkoutId>;
    async fn load(&self, workout_id: &WorkoutId) -> Result<Option<Workout>>;
}

/// Durable workout catalog backed by SQLite.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if database_url.contains(":memory:") {
            // Every connection to an in-memory database sees its own empty
            // database, so keep exactly one alive for the pool's lifetime.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open workout database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_workouts(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<WorkoutSummary>> {
        let rows = sqlx::query(
            "SELECT body_json FROM workouts WHERE organization_id = ?1 ORDER BY created_at, id",
        )
        .bind(organization_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let workout = decode_workout(&row.get::<String, _>("body_json"))?;
                Ok(WorkoutSummary {
                    block_count: workout.blocks.len(),
                    id: workout.id,
                    title: workout.title,
                })
            })
            .collect()
    }

    /// Removes controller-synthesized workouts; catalog workouts are untouched.
    pub async fn delete_freestanding(&self, organization_id: &OrganizationId) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM workouts WHERE organization_id = ?1 AND is_freestanding = 1",
        )
        .bind(organization_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl WorkoutStore for Storage {
    async fn save(&self, workout: &Workout) -> Result<WorkoutId> {
        let body = serde_json::to_string(workout)
            .with_context(|| format!("failed to encode workout {}", workout.id))?;
        sqlx::query(
            r#"
            INSERT INTO workouts (id, organization_id, title, is_freestanding, body_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                organization_id = excluded.organization_id,
                title = excluded.title,
                is_freestanding = excluded.is_freestanding,
                body_json = excluded.body_json,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(workout.id.as_str())
        .bind(workout.organization_id.as_str())
        .bind(&workout.title)
        .bind(workout.is_freestanding())
        .bind(body)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store workout {}", workout.id))?;
        Ok(workout.id.clone())
    }

    async fn load(&self, workout_id: &WorkoutId) -> Result<Option<Workout>> {
        let row = sqlx::query("SELECT body_json FROM workouts WHERE id = ?1")
            .bind(workout_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_workout(&row.get::<String, _>("body_json")))
            .transpose()
    }
}

fn decode_workout(body: &str) -> Result<Workout> {
    serde_json::from_str(body).context("stored workout body is not valid JSON")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
