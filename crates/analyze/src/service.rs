//! The Analyze Service (C9): orchestrates fetch → score → persist, applies the
//! update-quota policy, and computes growth-point deltas.

use std::collections::HashMap;
use std::sync::Arc;

use common::models::{ContributionEvent, RuleSet, Score};
use github::{ClientError, GitHubFetcher, RepoFetchWarning};
use scoring::{score_events, ScoringContext};
use storage::StorageBackend;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::info;

/// Which API surface to collect through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Rest,
    GraphQl,
    Auto,
}

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("GitHub error: {0}")]
    GitHub(#[from] ClientError),
    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),
    #[error("analysis cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisSummary {
    pub login: String,
    pub total_events: usize,
    pub scores_by_dimension: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub login: String,
    pub events_count: usize,
    pub events: Vec<ContributionEvent>,
    pub scores: Vec<Score>,
    pub summary: AnalysisSummary,
    pub warnings: Vec<RepoFetchWarning>,
}

fn summarize(login: &str, events: &[ContributionEvent], scores: &[Score]) -> AnalysisSummary {
    let mut scores_by_dimension: HashMap<String, f64> = HashMap::new();
    for score in scores {
        *scores_by_dimension.entry(score.dimension.clone()).or_insert(0.0) += score.value;
    }
    AnalysisSummary {
        login: login.to_string(),
        total_events: events.len(),
        scores_by_dimension,
    }
}

/// Orchestrates a single subject's analysis. One instance is typically built per
/// run; it owns the fetcher and an optional storage backend.
pub struct AnalyzeService {
    fetcher: Arc<GitHubFetcher>,
    storage: Option<Arc<dyn StorageBackend>>,
    rules: RuleSet,
    ctx: ScoringContext,
    concurrency: usize,
    max_repos: usize,
}

impl AnalyzeService {
    pub fn new(
        fetcher: Arc<GitHubFetcher>,
        storage: Option<Arc<dyn StorageBackend>>,
        rules: RuleSet,
        ctx: ScoringContext,
        concurrency: usize,
        max_repos: usize,
    ) -> Self {
        Self { fetcher, storage, rules, ctx, concurrency, max_repos }
    }

    /// Runs a full fetch+score pass for `login`. `since` bounds how far back events
    /// are collected; `mode` picks the REST or GraphQL collection path (`Auto`
    /// always takes the concurrent REST path, matching the fetcher's default).
    pub async fn analyze(
        &self,
        login: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
        mode: ApiMode,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let fetch = self.collect_events(login, since, mode);

        let events = match cancel {
            Some(cancel_rx) => {
                tokio::select! {
                    result = fetch => result?,
                    _ = cancel_rx => return Err(AnalyzeError::Cancelled),
                }
            }
            None => fetch.await?,
        };

        let (events, warnings) = events;
        let scores = score_events(&events, &self.rules, &self.ctx);
        let summary = summarize(login, &events, &scores);

        info!(
            "analyzed {}: {} events, {} scored dimensions",
            login,
            events.len(),
            summary.scores_by_dimension.len()
        );

        Ok(AnalysisResult {
            login: login.to_string(),
            events_count: events.len(),
            events,
            scores,
            summary,
            warnings,
        })
    }

    async fn collect_events(
        &self,
        login: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
        mode: ApiMode,
    ) -> Result<(Vec<ContributionEvent>, Vec<RepoFetchWarning>), ClientError> {
        match mode {
            // `Auto` prefers the concurrent REST path for breadth, per spec §4.4.
            ApiMode::Rest | ApiMode::Auto => {
                self.fetcher
                    .fetch_user_contributions(login, self.max_repos, since, self.concurrency)
                    .await
            }
            ApiMode::GraphQl => {
                let events = self
                    .fetcher
                    .fetch_user_contributions_graphql(login, since, self.max_repos, self.concurrency)
                    .await?;
                Ok((events, Vec::new()))
            }
        }
    }

    /// Persists `result`'s scores (and events, if a backend is configured) and
    /// returns the number of score rows written. A no-op when no storage backend
    /// was configured.
    pub async fn persist(&self, result: &AnalysisResult) -> Result<u64, AnalyzeError> {
        let Some(storage) = &self.storage else { return Ok(0) };
        storage.ensure_schema().await?;
        storage.save_events(&result.events).await?;
        let n = storage.save_scores(&result.scores).await?;
        Ok(n)
    }
}
