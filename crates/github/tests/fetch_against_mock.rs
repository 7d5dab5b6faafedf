//! End-to-end scenarios against a mocked GitHub REST API (spec scenarios 5 and 6).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::cache::{CacheEntry, HttpCache};
use github::GitHubClient;
use std::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct MemCache(Mutex<std::collections::HashMap<String, CacheEntry>>);

#[async_trait]
impl HttpCache for MemCache {
    async fn get(&self, url: &str) -> common::Result<Option<CacheEntry>> {
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
            CacheEntry { etag, last_modified, body, fetched_at },
        );
        Ok(())
    }
}

#[derive(serde::Deserialize, Debug, PartialEq)]
struct Payload {
    value: i32,
}

#[tokio::test]
async fn conditional_get_replays_cached_body_on_304() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"abc\"")
                .set_body_json(serde_json::json!({ "value": 7 })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/resource"))
        .and(header("if-none-match", "\"abc\""))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let cache = Arc::new(MemCache::default());
    let client = GitHubClient::new(reqwest::Client::new(), None, cache);
    let url = format!("{}/resource", server.uri());

    let first: Payload = client.get(&url).await.unwrap();
    assert_eq!(first, Payload { value: 7 });

    let second: Payload = client.get(&url).await.unwrap();
    assert_eq!(second, Payload { value: 7 });
}

#[tokio::test]
async fn pagination_follows_link_header_across_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!("<{}/items2>; rel=\"next\"", server.uri()).as_str(),
                )
                .set_body_json(serde_json::json!([{ "value": 1 }, { "value": 2 }])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "value": 3 }])))
        .mount(&server)
        .await;

    let cache = Arc::new(MemCache::default());
    let client = GitHubClient::new(reqwest::Client::new(), None, cache);

    let mut url = Some(format!("{}/items", server.uri()));
    let mut all = Vec::new();
    while let Some(u) = url.take() {
        let (page, headers): (Vec<Payload>, _) = client.get_with_headers(&u).await.unwrap();
        all.extend(page);
        url = github::pagination::parse_link_next(&headers);
    }

    assert_eq!(all, vec![Payload { value: 1 }, Payload { value: 2 }, Payload { value: 3 }]);
}

#[tokio::test]
async fn rate_limit_sleeps_and_retries_once() {
    let server = MockServer::start().await;
    let reset = (Utc::now().timestamp() + 1).to_string();

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-RateLimit-Reset", reset.as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": 9 })))
        .mount(&server)
        .await;

    let cache = Arc::new(MemCache::default());
    let client = GitHubClient::new(reqwest::Client::new(), None, cache);
    let url = format!("{}/limited", server.uri());

    let result: Payload = client.get(&url).await.unwrap();
    assert_eq!(result, Payload { value: 9 });
}
