//! Pagination (C3): REST `Link` header walking and GraphQL cursor `pageInfo`.

use reqwest::header::HeaderMap;
use serde::Deserialize;

/// Extracts the `rel="next"` URL from a `Link` header, if present.
pub fn parse_link_next(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    for part in raw.split(',') {
        let mut segments = part.split(';');
        let url_part = segments.next()?.trim();
        let is_next = segments.any(|s| s.trim() == r#"rel="next""#);
        if is_next {
            let url = url_part.trim_start_matches('<').trim_end_matches('>');
            return Some(url.to_string());
        }
    }
    None
}

/// GraphQL `pageInfo` shape shared by every connection this fetcher walks.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, LINK};

    #[test]
    fn extracts_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/resource?page=2>; rel="next", <https://api.github.com/resource?page=5>; rel="last""#,
            ),
        );
        assert_eq!(
            parse_link_next(&headers).as_deref(),
            Some("https://api.github.com/resource?page=2")
        );
    }

    #[test]
    fn no_link_header_returns_none() {
        let headers = HeaderMap::new();
        assert!(parse_link_next(&headers).is_none());
    }

    #[test]
    fn no_next_rel_returns_none() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(r#"<https://api.github.com/resource?page=1>; rel="prev""#),
        );
        assert!(parse_link_next(&headers).is_none());
    }
}
