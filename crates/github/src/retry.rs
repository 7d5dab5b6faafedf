//! Retry and rate-limit handling (C2).
//!
//! Transport/HTTP errors retry up to 5 attempts with exponential backoff (base 1s,
//! cap 10s). A 429/403 carrying `X-RateLimit-Reset` instead sleeps until the reset
//! instant and retries exactly once inline.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use tokio::time::sleep;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const CAP_BACKOFF: Duration = Duration::from_secs(10);

pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let millis = BASE_BACKOFF.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(millis).min(CAP_BACKOFF)
}

/// Runs `op` with exponential-backoff retry on any transport error, up to
/// [`MAX_ATTEMPTS`] attempts.
pub async fn with_retry<F, Fut>(mut op: F) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(resp) => return Ok(resp),
            Err(e) if attempt < MAX_ATTEMPTS => {
                let wait = backoff_for_attempt(attempt);
                warn!("request failed ({e}), retrying in {:?}", wait);
                sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Seconds to sleep before retrying a rate-limited response, derived from
/// `X-RateLimit-Reset` (epoch seconds) or `Retry-After` (relative seconds).
pub fn rate_limit_wait_secs(resp: &Response) -> u64 {
    if let Some(reset) = resp
        .headers()
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
    {
        let now = chrono::Utc::now().timestamp();
        return (reset - now + 1).max(1) as u64;
    }
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

pub fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(10), CAP_BACKOFF);
    }
}
