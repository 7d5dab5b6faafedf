//! GraphQL collection path: `search` for PR/issue authorship, per-repo commit
//! history and review connections. Cursor-paginated via `pageInfo`.

use chrono::{DateTime, Utc};
use common::botfilter::is_bot_login;
use common::models::{ContributionEvent, Kind, Repo};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::client::{ClientError, GitHubClient};
use crate::fetcher::GitHubFetcher;
use crate::pagination::PageInfo;
use std::sync::Arc;

const SEARCH_QUERY: &str = r#"
query($q: String!, $after: String) {
  search(query: $q, type: ISSUE, first: 100, after: $after) {
    pageInfo { hasNextPage endCursor }
    nodes {
      __typename
      ... on PullRequest { id number createdAt author { login } repository { nameWithOwner } }
      ... on Issue { id number createdAt author { login } repository { nameWithOwner } }
    }
  }
}
"#;

const COMMIT_HISTORY_QUERY: &str = r#"
query($owner: String!, $name: String!, $since: GitTimestamp, $after: String) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: 100, since: $since, after: $after) {
            pageInfo { hasNextPage endCursor }
            nodes { oid committedDate author { user { login } } }
          }
        }
      }
    }
  }
}
"#;

const PR_REVIEWS_QUERY: &str = r#"
query($owner: String!, $name: String!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(states: [OPEN, MERGED, CLOSED], first: 100, after: $after, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        reviews(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes { id author { login } submittedAt }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchConnection,
}

#[derive(Debug, Deserialize)]
struct SearchConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    nodes: Vec<SearchNode>,
}

#[derive(Debug, Deserialize)]
struct SearchNode {
    #[serde(rename = "__typename")]
    typename: String,
    id: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    author: Option<GqlLogin>,
    repository: GqlRepo,
}

#[derive(Debug, Deserialize)]
struct GqlLogin {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GqlRepo {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
struct CommitHistoryData {
    repository: Option<CommitHistoryRepo>,
}

#[derive(Debug, Deserialize)]
struct CommitHistoryRepo {
    #[serde(rename = "defaultBranchRef")]
    default_branch_ref: Option<DefaultBranchRef>,
}

#[derive(Debug, Deserialize)]
struct DefaultBranchRef {
    target: Option<CommitTarget>,
}

#[derive(Debug, Deserialize)]
struct CommitTarget {
    history: CommitHistory,
}

#[derive(Debug, Deserialize)]
struct CommitHistory {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    nodes: Vec<CommitNode>,
}

#[derive(Debug, Deserialize)]
struct CommitNode {
    oid: String,
    #[serde(rename = "committedDate")]
    committed_date: DateTime<Utc>,
    author: Option<CommitNodeAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitNodeAuthor {
    user: Option<GqlLogin>,
}

#[derive(Debug, Deserialize)]
struct ReviewsData {
    repository: Option<ReviewsRepo>,
}

#[derive(Debug, Deserialize)]
struct ReviewsRepo {
    #[serde(rename = "pullRequests")]
    pull_requests: PullRequestsConnection,
}

#[derive(Debug, Deserialize)]
struct PullRequestsConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    nodes: Vec<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
struct PullRequestNode {
    number: i32,
    reviews: ReviewsConnection,
}

#[derive(Debug, Deserialize)]
struct ReviewsConnection {
    nodes: Vec<ReviewNode>,
}

#[derive(Debug, Deserialize)]
struct ReviewNode {
    id: String,
    author: Option<GqlLogin>,
    #[serde(rename = "submittedAt")]
    submitted_at: Option<DateTime<Utc>>,
}

fn keep(login: &str, exclude_bots: bool) -> bool {
    !(exclude_bots && is_bot_login(login))
}

/// Searches `author:<login> is:public`, tagging each result as `pr` or `issue` by
/// its GraphQL `__typename`.
pub async fn fetch_user_contributions_graphql(
    client: &GitHubClient,
    login: &str,
    exclude_bots: bool,
) -> Result<Vec<ContributionEvent>, ClientError> {
    let mut events = Vec::new();
    let mut after: Option<String> = None;
    let q = format!("author:{login} is:public");

    loop {
        let data: SearchData = client
            .graphql(SEARCH_QUERY, json!({ "q": q, "after": after }))
            .await?;

        for node in data.search.nodes {
            let Some(author) = node.author else { continue };
            if !keep(&author.login, exclude_bots) {
                continue;
            }
            let kind = if node.typename == "PullRequest" { Kind::Pr } else { Kind::Issue };
            events.push(ContributionEvent {
                id: node.id,
                kind,
                repo_id: format!("github.com/{}", node.repository.name_with_owner),
                user_id: author.login,
                created_at: node.created_at,
                lines_added: 0,
                lines_removed: 0,
            });
        }

        if !data.search.page_info.has_next_page {
            break;
        }
        after = data.search.page_info.end_cursor;
    }

    Ok(events)
}

/// Walks `defaultBranchRef.target.history` for commits, optionally since a cutoff.
/// Unlike the search cursor, `since` is fixed for the whole walk — only the cursor
/// advances per page.
pub async fn fetch_repo_commits_graphql(
    client: &GitHubClient,
    repo: &Repo,
    since: Option<DateTime<Utc>>,
    exclude_bots: bool,
) -> Result<Vec<ContributionEvent>, ClientError> {
    let mut events = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let data: CommitHistoryData = client
            .graphql(
                COMMIT_HISTORY_QUERY,
                json!({
                    "owner": repo.owner,
                    "name": repo.name,
                    "since": since.map(|s| s.to_rfc3339()),
                    "after": after,
                }),
            )
            .await?;

        let Some(history) = data
            .repository
            .and_then(|r| r.default_branch_ref)
            .and_then(|b| b.target)
            .map(|t| t.history)
        else {
            break;
        };

        for node in history.nodes {
            let Some(login) = node.author.and_then(|a| a.user).map(|u| u.login) else { continue };
            if !keep(&login, exclude_bots) {
                continue;
            }
            events.push(ContributionEvent {
                id: node.oid,
                kind: Kind::Commit,
                repo_id: repo.id(),
                user_id: login,
                created_at: node.committed_date,
                lines_added: 0,
                lines_removed: 0,
            });
        }

        if !history.page_info.has_next_page {
            break;
        }
        after = history.page_info.end_cursor;
    }

    Ok(events)
}

/// Walks `pullRequests(...).reviews(...)` up to `max_reviews` total review events.
pub async fn fetch_repo_reviews_graphql(
    client: &GitHubClient,
    repo: &Repo,
    max_reviews: usize,
    exclude_bots: bool,
) -> Result<Vec<ContributionEvent>, ClientError> {
    let mut events = Vec::new();
    let mut after: Option<String> = None;

    'outer: loop {
        let data: ReviewsData = client
            .graphql(
                PR_REVIEWS_QUERY,
                json!({ "owner": repo.owner, "name": repo.name, "after": after }),
            )
            .await?;

        let Some(prs) = data.repository.map(|r| r.pull_requests) else { break };

        for pr in prs.nodes {
            for review in pr.reviews.nodes {
                let Some(author) = review.author else { continue };
                if !keep(&author.login, exclude_bots) {
                    continue;
                }
                let Some(submitted_at) = review.submitted_at else { continue };
                events.push(ContributionEvent {
                    id: review.id,
                    kind: Kind::Review,
                    repo_id: repo.id(),
                    user_id: author.login,
                    created_at: submitted_at,
                    lines_added: 0,
                    lines_removed: 0,
                });
                if events.len() >= max_reviews {
                    break 'outer;
                }
            }
        }

        if !prs.page_info.has_next_page {
            break;
        }
        after = prs.page_info.end_cursor;
    }

    Ok(events)
}

/// Combines the search-based PR/issue collection with per-repo commit and review
/// history, mirroring the REST aggregate but via the GraphQL surface end to end.
///
/// Repos to walk come from `fetcher.fetch_user_repos` (the same REST call the REST
/// path uses, per `original_source`'s `fetch_user_contributions_graphql_full_async`),
/// not from the search results, and per-repo commit/review fetches are fanned out
/// under a semaphore of size `concurrency`, matching `fetcher.rs::fetch_user_contributions`.
pub async fn fetch_user_contributions_graphql_full(
    fetcher: &GitHubFetcher,
    login: &str,
    since: Option<DateTime<Utc>>,
    max_repos: usize,
    concurrency: usize,
    exclude_bots: bool,
) -> Result<Vec<ContributionEvent>, ClientError> {
    let client = fetcher.client();
    let mut events = fetch_user_contributions_graphql(client, login, exclude_bots).await?;

    let mut repos = fetcher.fetch_user_repos(login).await?;
    repos.truncate(max_repos);

    let semaphore = Arc::new(Semaphore::new(concurrency.clamp(1, 20)));
    let tasks = repos.into_iter().map(|repo| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let mut repo_events = Vec::new();
            if let Ok(commits) = fetch_repo_commits_graphql(client, &repo, since, exclude_bots).await {
                repo_events.extend(commits);
            }
            if let Ok(reviews) = fetch_repo_reviews_graphql(client, &repo, 1000, exclude_bots).await {
                repo_events.extend(reviews);
            }
            repo_events
        }
    });

    for repo_events in join_all(tasks).await {
        events.extend(repo_events);
    }

    Ok(events)
}
