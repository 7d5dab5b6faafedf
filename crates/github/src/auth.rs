//! GitHub authentication: a bare PAT, or GitHub App installation auth.
//!
//! App auth mints a short-lived RS256 JWT (`iat = now - 60`, `exp = now + 540`,
//! a 9-minute token — GitHub rejects clock-skewed `iat`s in the future) and
//! exchanges it for an installation access token.

use chrono::Utc;
use common::config::GitHubAuth;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ClientError;

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Mints an App JWT valid for 9 minutes, per GitHub's documented window.
pub fn mint_app_jwt(app_id: &str, private_key_pem: &str) -> Result<String, ClientError> {
    let now = Utc::now().timestamp();
    let claims = AppClaims {
        iat: now - 60,
        exp: now + 540,
        iss: app_id.to_string(),
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| ClientError::Auth(e.to_string()))?;
    encode(&Header::new(jsonwebtoken::Algorithm::RS256), &claims, &key)
        .map_err(|e| ClientError::Auth(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct InstallationAccount {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: i64,
    account: InstallationAccount,
}

/// Resolves an installation id by account login, via `GET /app/installations`
/// (paginated, 100 per page). Used when `GITHUB_APP_INSTALLATION_ID` is absent
/// but `OSSMK_GH_INSTALLATION_OWNER` names the target account.
async fn find_installation_by_owner(
    http: &reqwest::Client,
    jwt: &str,
    owner: &str,
) -> Result<Option<String>, ClientError> {
    let mut page = 1u32;
    loop {
        let url = format!("https://api.github.com/app/installations?per_page=100&page={page}");
        let resp = http
            .get(&url)
            .bearer_auth(jwt)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "ossmk/0.1")
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        let installations: Vec<Installation> = resp.json().await?;
        if installations.is_empty() {
            return Ok(None);
        }
        if let Some(found) = installations
            .iter()
            .find(|i| i.account.login.eq_ignore_ascii_case(owner))
        {
            return Ok(Some(found.id.to_string()));
        }
        page += 1;
    }
}

/// Resolves an installation id for a specific repo via
/// `GET /repos/{owner}/{repo}/installation`. Used when `OSSMK_GH_INSTALLATION_REPO`
/// (`owner/name`) is configured instead of (or alongside) `_OWNER`.
async fn find_installation_by_repo(
    http: &reqwest::Client,
    jwt: &str,
    owner_repo: &str,
) -> Result<Option<String>, ClientError> {
    let url = format!("https://api.github.com/repos/{owner_repo}/installation");
    let resp = http
        .get(&url)
        .bearer_auth(jwt)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header(reqwest::header::USER_AGENT, "ossmk/0.1")
        .send()
        .await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }
    let installation: Installation = resp.json().await?;
    Ok(Some(installation.id.to_string()))
}

/// Exchanges an App JWT for an installation access token.
pub async fn exchange_installation_token(
    http: &reqwest::Client,
    jwt: &str,
    installation_id: &str,
) -> Result<String, ClientError> {
    let url = format!(
        "https://api.github.com/app/installations/{installation_id}/access_tokens"
    );
    debug!("POST {}", url);
    let resp = http
        .post(&url)
        .bearer_auth(jwt)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header(reqwest::header::USER_AGENT, "ossmk/0.1")
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }

    let parsed: InstallationTokenResponse = resp.json().await?;
    Ok(parsed.token)
}

/// Resolves a complete `Authorization` header value for the configured auth mode.
/// Returns `None` when no credentials are configured (unauthenticated requests).
///
/// For `GitHubAuth::App` without an explicit installation id, `installation_owner`
/// (`OSSMK_GH_INSTALLATION_OWNER`) and `installation_repo` (`OSSMK_GH_INSTALLATION_REPO`)
/// are tried in that order to auto-select the installation by account login or by
/// a specific repo's installation.
pub async fn resolve_auth_header(
    http: &reqwest::Client,
    auth: &GitHubAuth,
    installation_owner: Option<&str>,
    installation_repo: Option<&str>,
) -> Result<Option<String>, ClientError> {
    match auth {
        GitHubAuth::Token(token) => Ok(Some(format!("Bearer {token}"))),
        GitHubAuth::App {
            app_id,
            private_key_pem,
            installation_id,
        } => {
            let jwt = mint_app_jwt(app_id, private_key_pem)?;

            let resolved_id = if let Some(id) = installation_id {
                Some(id.clone())
            } else if let Some(owner) = installation_owner {
                find_installation_by_owner(http, &jwt, owner).await?
            } else if let Some(repo) = installation_repo {
                find_installation_by_repo(http, &jwt, repo).await?
            } else {
                None
            };

            let Some(installation_id) = resolved_id else {
                return Err(ClientError::Auth(
                    "GitHub App auth requires an installation id, or an _OWNER/_REPO hint that resolves to one".to_string(),
                ));
            };

            let token = exchange_installation_token(http, &jwt, &installation_id).await?;
            Ok(Some(format!("Bearer {token}")))
        }
        GitHubAuth::None => Ok(None),
    }
}
