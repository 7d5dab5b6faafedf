//! GitHub REST client: conditional-GET caching, retry, and rate-limit handling
//! layered around a plain `reqwest::Client`.

use std::sync::Arc;

use chrono::Utc;
use common::cache::HttpCache;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, IF_NONE_MATCH, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::retry::{is_rate_limited, rate_limit_wait_secs, with_retry};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("auth error: {0}")]
    Auth(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<common::Error> for ClientError {
    fn from(e: common::Error) -> Self {
        ClientError::Cache(e.to_string())
    }
}

/// A thin GitHub REST client. One instance per analysis; auth is resolved once at
/// construction.
pub struct GitHubClient {
    http: reqwest::Client,
    auth_header: Option<String>,
    cache: Arc<dyn HttpCache>,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, auth_header: Option<String>, cache: Arc<dyn HttpCache>) -> Self {
        Self {
            http,
            auth_header,
            cache,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("ossmk/0.1"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(ref auth) = self.auth_header {
            if let Ok(val) = HeaderValue::from_str(auth) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers
    }

    /// Issues a conditional GET against `url`, consulting and updating the cache.
    /// On a rate-limited response, sleeps until the reset window and retries once
    /// inline before surfacing [`ClientError::RateLimited`].
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let (body, _headers) = self.get_raw(url, true).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Like [`Self::get`] but also returns the response headers, for callers that
    /// need `Link` pagination.
    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(T, HeaderMap), ClientError> {
        let (body, headers) = self.get_raw(url, true).await?;
        let parsed = serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok((parsed, headers))
    }

    fn get_raw<'a>(
        &'a self,
        url: &'a str,
        allow_retry_once: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(String, HeaderMap), ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let cached = self.cache.get(url).await?;

            let mut headers = self.headers();
            if let Some(entry) = &cached {
                if let Some(etag) = &entry.etag {
                    if let Ok(val) = HeaderValue::from_str(etag) {
                        headers.insert(IF_NONE_MATCH, val);
                    }
                }
            }

            debug!("GET {}", url);
            let req_headers = headers.clone();
            let resp = with_retry(|| self.http.get(url).headers(req_headers.clone()).send()).await?;

            let status = resp.status();

            if status == reqwest::StatusCode::NOT_MODIFIED {
                let entry = cached
                    .ok_or_else(|| ClientError::Cache(format!("304 for {url} with no cached entry")))?;
                return Ok((entry.body, resp.headers().clone()));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(url.to_string()));
            }

            if is_rate_limited(status) {
                let wait = rate_limit_wait_secs(&resp);
                if allow_retry_once {
                    sleep(std::time::Duration::from_secs(wait)).await;
                    return self.get_raw(url, false).await;
                }
                return Err(ClientError::RateLimited { retry_after: wait });
            }

            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let resp_headers = resp.headers().clone();
            let etag = resp_headers
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let last_modified = resp_headers
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.text().await?;

            self.cache
                .set(url, etag, last_modified, body.clone(), Utc::now())
                .await?;

            Ok((body, resp_headers))
        })
    }

    /// Issues an authenticated GraphQL POST.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ClientError> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            query: &'a str,
            variables: serde_json::Value,
        }
        #[derive(serde::Deserialize)]
        struct Envelope<T> {
            data: Option<T>,
            errors: Option<Vec<GraphQlError>>,
        }
        #[derive(serde::Deserialize)]
        struct GraphQlError {
            message: String,
        }

        let resp = with_retry(|| {
            self.http
                .post("https://api.github.com/graphql")
                .headers(self.headers())
                .json(&Body {
                    query,
                    variables: variables.clone(),
                })
                .send()
        })
        .await?;

        let status = resp.status();
        if is_rate_limited(status) {
            let wait = rate_limit_wait_secs(&resp);
            return Err(ClientError::RateLimited { retry_after: wait });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = resp.json().await?;
        if let Some(errors) = envelope.errors {
            if envelope.data.is_none() {
                let joined = errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ClientError::Api {
                    status: 200,
                    message: joined,
                });
            }
        }
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("GraphQL response had no data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemCache(Mutex<std::collections::HashMap<String, common::cache::CacheEntry>>);

    #[async_trait]
    impl HttpCache for MemCache {
        async fn get(&self, url: &str) -> common::Result<Option<common::cache::CacheEntry>> {
            Ok(self.0.lock().unwrap().get(url).cloned())
        }
        async fn set(
            &self,
            url: &str,
            etag: Option<String>,
            last_modified: Option<String>,
            body: String,
            fetched_at: DateTime<Utc>,
        ) -> common::Result<()> {
            self.0.lock().unwrap().insert(
                url.to_string(),
                common::cache::CacheEntry {
                    etag,
                    last_modified,
                    body,
                    fetched_at,
                },
            );
            Ok(())
        }
    }

    #[test]
    fn client_with_no_auth_has_no_header() {
        let client = GitHubClient::new(reqwest::Client::new(), None, Arc::new(MemCache::default()));
        assert!(client.auth_header.is_none());
        let headers = client.headers();
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn client_with_token_sets_bearer_header() {
        let client = GitHubClient::new(
            reqwest::Client::new(),
            Some("Bearer abc123".to_string()),
            Arc::new(MemCache::default()),
        );
        let headers = client.headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
    }
}
