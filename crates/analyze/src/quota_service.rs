//! End-to-end update flow for the optional update-quota tier: quota check,
//! persist, snapshot, and growth-point delta — mirrors the original's
//! `backend_update_user`.

use chrono::Duration;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::service::{AnalysisResult, AnalyzeError, AnalyzeService, ApiMode};

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub user_id: String,
    pub github_login: String,
    pub prev_total: f64,
    pub new_total: f64,
    pub awarded_points: f64,
    pub used: i64,
    pub limit: i64,
}

/// Runs a full quota-gated update for `user_id`/`github_login`: checks the update
/// quota, analyzes, persists scores, snapshots the new total, and records the
/// positive delta (if any) as growth points.
#[allow(clippy::too_many_arguments)]
pub async fn backend_update_user(
    pool: &PgPool,
    service: &AnalyzeService,
    user_id: &str,
    github_login: &str,
    since: Option<chrono::DateTime<chrono::Utc>>,
    manual: bool,
    quota_limit: i64,
    quota_window: Duration,
) -> Result<UpdateOutcome, UpdateError> {
    storage::quota::ensure_quota_schema(pool).await?;
    storage::quota::upsert_user(pool, user_id, github_login).await?;

    let decision = storage::quota::can_perform_update(pool, user_id, quota_limit, quota_window).await?;
    if !decision.allowed {
        return Ok(UpdateOutcome {
            ok: false,
            reason: decision.reason,
            user_id: user_id.to_string(),
            github_login: github_login.to_string(),
            prev_total: 0.0,
            new_total: 0.0,
            awarded_points: 0.0,
            used: decision.used,
            limit: decision.limit,
        });
    }

    let mut result: AnalysisResult = service.analyze(github_login, since, ApiMode::Auto, None).await?;

    // Scores come back keyed by the forge login (`result.scores[].subject_id`);
    // rewrite to our internal `user_id` before persisting so `get_latest_total`
    // (keyed on `user_id`) finds the rows this run just wrote.
    for score in result.scores.iter_mut() {
        score.subject_id = user_id.to_string();
    }

    let prev_total = storage::quota::latest_snapshot_total(pool, user_id).await?;
    service.persist(&result).await?;
    let new_total = storage::postgres::get_latest_total(pool, user_id).await?;

    let delta = (new_total - prev_total).max(0.0);
    if delta > 0.0 {
        storage::quota::insert_growth_points(pool, user_id, delta).await?;
    }
    storage::quota::save_snapshot(pool, user_id, new_total).await?;
    if manual {
        storage::quota::record_update_usage(pool, user_id).await?;
    }

    info!(
        "updated {} ({}): prev={:.2} new={:.2} awarded={:.2}",
        github_login, user_id, prev_total, new_total, delta
    );

    Ok(UpdateOutcome {
        ok: true,
        reason: None,
        user_id: user_id.to_string(),
        github_login: github_login.to_string(),
        prev_total,
        new_total,
        awarded_points: delta,
        used: decision.used + if manual { 1 } else { 0 },
        limit: decision.limit,
    })
}
