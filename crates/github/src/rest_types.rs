//! Shapes of the GitHub REST API responses this fetcher consumes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: GithubUser,
}

/// A single item from `GET /repos/{owner}/{repo}/issues?state=all` — may be a plain
/// issue or a pull request (indicated by the presence of `pull_request`).
#[derive(Debug, Deserialize)]
pub struct GithubIssueOrPr {
    pub id: i64,
    pub number: i32,
    pub user: Option<GithubUser>,
    pub created_at: DateTime<Utc>,
    pub pull_request: Option<serde_json::Value>,
}

impl GithubIssueOrPr {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GithubCommitDetail,
    pub author: Option<GithubUser>,
    pub committer: Option<GithubUser>,
}

#[derive(Debug, Deserialize)]
pub struct GithubCommitDetail {
    pub author: GithubCommitAuthor,
}

#[derive(Debug, Deserialize)]
pub struct GithubCommitAuthor {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GithubPr {
    pub number: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GithubReview {
    pub id: i64,
    pub user: Option<GithubUser>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}
