//! The forge fetcher (C4): maps GitHub REST/GraphQL responses to canonical
//! [`ContributionEvent`]s, with bot filtering and bounded per-repo concurrency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::botfilter::is_bot_login;
use common::models::{ContributionEvent, Kind, Repo};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::{ClientError, GitHubClient};
use crate::pagination::parse_link_next;
use crate::rest_types::{GithubCommit, GithubIssueOrPr, GithubPr, GithubRepo, GithubReview};

const PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 50;

/// A non-fatal failure fetching one repo's contributions, returned instead of
/// aborting the whole fan-out.
#[derive(Debug, Clone)]
pub struct RepoFetchWarning {
    pub repo_id: String,
    pub message: String,
}

pub struct GitHubFetcher {
    client: GitHubClient,
    exclude_bots: bool,
}

impl GitHubFetcher {
    pub fn new(client: GitHubClient, exclude_bots: bool) -> Self {
        Self { client, exclude_bots }
    }

    pub(crate) fn client(&self) -> &GitHubClient {
        &self.client
    }

    fn keep_login(&self, login: &str) -> bool {
        !(self.exclude_bots && is_bot_login(login))
    }

    /// Fetches repo metadata.
    pub async fn fetch_repo(&self, repo: &Repo) -> Result<(), ClientError> {
        let url = format!("https://api.github.com/repos/{}", repo.full_name());
        let _: GithubRepo = self.client.get(&url).await?;
        Ok(())
    }

    /// Paginates `issues?state=all`, classifying each item as `pr` or `issue`.
    pub async fn fetch_repo_issues_and_prs(
        &self,
        repo: &Repo,
    ) -> Result<Vec<ContributionEvent>, ClientError> {
        let mut events = Vec::new();
        let mut url = Some(format!(
            "https://api.github.com/repos/{}/issues?state=all&per_page={PER_PAGE}",
            repo.full_name()
        ));
        let mut pages = 0;

        while let Some(u) = url.take() {
            pages += 1;
            let (items, headers): (Vec<GithubIssueOrPr>, _) =
                self.client.get_with_headers(&u).await?;

            for item in items {
                let login = item.user.map(|u| u.login).unwrap_or_else(|| "unknown".to_string());
                if !self.keep_login(&login) {
                    continue;
                }
                let kind = if item.is_pull_request() { Kind::Pr } else { Kind::Issue };
                events.push(ContributionEvent {
                    id: item.id.to_string(),
                    kind,
                    repo_id: repo.id(),
                    user_id: login,
                    created_at: item.created_at,
                    lines_added: 0,
                    lines_removed: 0,
                });
            }

            if pages >= MAX_PAGES {
                warn!("hit pagination limit fetching issues/prs for {}", repo.id());
                break;
            }
            url = parse_link_next(&headers);
        }

        Ok(events)
    }

    /// Fetches commit history on the default branch, optionally since a cutoff.
    pub async fn fetch_repo_commits(
        &self,
        repo: &Repo,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContributionEvent>, ClientError> {
        let mut events = Vec::new();
        let base = format!(
            "https://api.github.com/repos/{}/commits?per_page={PER_PAGE}",
            repo.full_name()
        );
        let mut url = Some(match since {
            Some(s) => format!("{base}&since={}", s.to_rfc3339()),
            None => base,
        });
        let mut pages = 0;

        while let Some(u) = url.take() {
            pages += 1;
            let (items, headers): (Vec<GithubCommit>, _) = self.client.get_with_headers(&u).await?;
            if items.is_empty() {
                break;
            }

            for item in items {
                let login = item
                    .author
                    .map(|a| a.login)
                    .or_else(|| item.committer.map(|c| c.login))
                    .unwrap_or_else(|| "unknown".to_string());
                if !self.keep_login(&login) {
                    continue;
                }
                events.push(ContributionEvent {
                    id: item.sha.clone(),
                    kind: Kind::Commit,
                    repo_id: repo.id(),
                    user_id: login,
                    created_at: item.commit.author.date,
                    lines_added: 0,
                    lines_removed: 0,
                });
            }

            if pages >= MAX_PAGES {
                warn!("hit pagination limit fetching commits for {}", repo.id());
                break;
            }
            url = parse_link_next(&headers);
        }

        Ok(events)
    }

    /// Fetches review events across the `max_prs` most-recently-updated PRs.
    pub async fn fetch_repo_pr_reviews(
        &self,
        repo: &Repo,
        max_prs: usize,
    ) -> Result<Vec<ContributionEvent>, ClientError> {
        let mut prs = Vec::new();
        let mut url = Some(format!(
            "https://api.github.com/repos/{}/pulls?state=all&sort=updated&direction=desc&per_page={PER_PAGE}",
            repo.full_name()
        ));
        let mut pages = 0;

        while let Some(u) = url.take() {
            if prs.len() >= max_prs {
                break;
            }
            pages += 1;
            let (items, headers): (Vec<GithubPr>, _) = self.client.get_with_headers(&u).await?;
            if items.is_empty() {
                break;
            }
            prs.extend(items);
            if pages >= MAX_PAGES {
                break;
            }
            url = parse_link_next(&headers);
        }
        prs.truncate(max_prs);

        let mut events = Vec::new();
        for pr in prs {
            let review_url = format!(
                "https://api.github.com/repos/{}/pulls/{}/reviews",
                repo.full_name(),
                pr.number
            );
            let reviews: Vec<GithubReview> = match self.client.get(&review_url).await {
                Ok(r) => r,
                Err(ClientError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };

            for review in reviews {
                let Some(login) = review.user.map(|u| u.login) else { continue };
                if !self.keep_login(&login) {
                    continue;
                }
                let Some(submitted_at) = review.submitted_at.or(review.created_at) else { continue };
                events.push(ContributionEvent {
                    id: review.id.to_string(),
                    kind: Kind::Review,
                    repo_id: repo.id(),
                    user_id: login,
                    created_at: submitted_at,
                    lines_added: 0,
                    lines_removed: 0,
                });
            }
        }

        Ok(events)
    }

    /// Lists full-name repos owned by `login`.
    pub async fn fetch_user_repos(&self, login: &str) -> Result<Vec<Repo>, ClientError> {
        let mut repos = Vec::new();
        let mut url = Some(format!(
            "https://api.github.com/users/{login}/repos?per_page={PER_PAGE}"
        ));
        let mut pages = 0;

        while let Some(u) = url.take() {
            pages += 1;
            let (items, headers): (Vec<GithubRepo>, _) = self.client.get_with_headers(&u).await?;
            if items.is_empty() {
                break;
            }
            for item in items {
                repos.push(Repo::new("github.com", item.owner.login, item.name));
            }
            if pages >= MAX_PAGES {
                break;
            }
            url = parse_link_next(&headers);
        }

        Ok(repos)
    }

    /// Aggregates commits, reviews, and issues/prs across `login`'s top `max_repos`
    /// repos, fanned out under a semaphore of size `concurrency`. A repo that fails
    /// entirely is folded into the returned warning list rather than aborting the
    /// whole fetch.
    pub async fn fetch_user_contributions(
        self: &Arc<Self>,
        login: &str,
        max_repos: usize,
        since: Option<DateTime<Utc>>,
        concurrency: usize,
    ) -> Result<(Vec<ContributionEvent>, Vec<RepoFetchWarning>), ClientError> {
        let mut repos = self.fetch_user_repos(login).await?;
        repos.truncate(max_repos);

        let semaphore = Arc::new(Semaphore::new(concurrency.clamp(1, 20)));
        let tasks = repos.into_iter().map(|repo| {
            let fetcher = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let repo_id = repo.id();
                let mut events = Vec::new();
                let mut warning = None;

                match fetcher.fetch_repo_commits(&repo, since).await {
                    Ok(e) => events.extend(e),
                    Err(err) => warning = Some(err.to_string()),
                }
                match fetcher.fetch_repo_pr_reviews(&repo, 50).await {
                    Ok(e) => events.extend(e),
                    Err(err) => warning.get_or_insert(err.to_string()),
                }
                match fetcher.fetch_repo_issues_and_prs(&repo).await {
                    Ok(e) => events.extend(e),
                    Err(err) => warning.get_or_insert(err.to_string()),
                }

                (repo_id, events, warning)
            }
        });

        let results = join_all(tasks).await;
        let mut events = Vec::new();
        let mut warnings = Vec::new();
        for (repo_id, repo_events, warning) in results {
            events.extend(repo_events);
            if let Some(message) = warning {
                debug!("repo {} fetch warning: {}", repo_id, message);
                warnings.push(RepoFetchWarning { repo_id, message });
            }
        }

        Ok((events, warnings))
    }

    /// Same aggregate as [`Self::fetch_user_contributions`] but collected entirely
    /// through the GraphQL surface (search + per-repo commit/review connections),
    /// fanned out under a semaphore of size `concurrency` just like the REST path.
    pub async fn fetch_user_contributions_graphql(
        &self,
        login: &str,
        since: Option<DateTime<Utc>>,
        max_repos: usize,
        concurrency: usize,
    ) -> Result<Vec<ContributionEvent>, ClientError> {
        crate::graphql::fetch_user_contributions_graphql_full(
            self,
            login,
            since,
            max_repos,
            concurrency,
            self.exclude_bots,
        )
        .await
    }
}
