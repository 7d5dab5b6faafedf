//! Update-quota policy tier (optional): caps manual updates per user per rolling
//! window and records positive score deltas as growth points. Postgres-only,
//! mirroring the original's `backend_update_user`, which reaches into the Postgres
//! storage module directly rather than going through the generic backend trait.

use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::backend::StorageError;

#[derive(Debug, Clone)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub used: i64,
    pub limit: i64,
}

pub async fn ensure_quota_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            github_login TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS update_usage (
            user_id TEXT NOT NULL,
            used_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            user_id TEXT NOT NULL,
            total DOUBLE PRECISION NOT NULL,
            taken_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS growth_points (
            user_id TEXT NOT NULL,
            points DOUBLE PRECISION NOT NULL,
            awarded_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_user(pool: &PgPool, user_id: &str, github_login: &str) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, github_login) VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET github_login = EXCLUDED.github_login
        "#,
    )
    .bind(user_id)
    .bind(github_login)
    .execute(pool)
    .await?;
    Ok(())
}

/// Checks whether `user_id` has room left under `limit` updates per `window`.
pub async fn can_perform_update(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
    window: chrono::Duration,
) -> Result<QuotaDecision, StorageError> {
    let since = Utc::now() - window;
    let row = sqlx::query(
        "SELECT COUNT(*) AS used FROM update_usage WHERE user_id = $1 AND used_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    let used: i64 = row.get("used");

    if used >= limit {
        return Ok(QuotaDecision {
            allowed: false,
            reason: Some(format!("update quota exceeded: {used}/{limit}")),
            used,
            limit,
        });
    }

    Ok(QuotaDecision { allowed: true, reason: None, used, limit })
}

pub async fn record_update_usage(pool: &PgPool, user_id: &str) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO update_usage (user_id, used_at) VALUES ($1, now())")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn save_snapshot(pool: &PgPool, user_id: &str, total: f64) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO snapshots (user_id, total, taken_at) VALUES ($1, $2, now())")
        .bind(user_id)
        .bind(total)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_growth_points(pool: &PgPool, user_id: &str, points: f64) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO growth_points (user_id, points, awarded_at) VALUES ($1, $2, now())")
        .bind(user_id)
        .bind(points)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn latest_snapshot_total(pool: &PgPool, user_id: &str) -> Result<f64, StorageError> {
    let row = sqlx::query(
        "SELECT total FROM snapshots WHERE user_id = $1 ORDER BY taken_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.get::<f64, _>("total")).unwrap_or(0.0))
}
