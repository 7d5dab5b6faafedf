//! Application configuration
//!
//! All `OSSMK_*` environment knobs are collected once, at pipeline construction, into
//! this struct. Nothing downstream reads `std::env` directly — the scoring engine and
//! the fetcher both take an explicit config value instead.

use std::env;

use crate::models::Decay;

/// GitHub authentication: either a bare token, or a GitHub App installation.
#[derive(Debug, Clone)]
pub enum GitHubAuth {
    Token(String),
    App {
        app_id: String,
        private_key_pem: String,
        installation_id: Option<String>,
    },
    None,
}

/// Forge access configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub auth: GitHubAuth,
    pub exclude_bots: bool,
    pub concurrency: usize,
    pub installation_owner: Option<String>,
    pub installation_repo: Option<String>,
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        let auth = if let (Ok(app_id), Ok(key)) = (
            env::var("GITHUB_APP_ID"),
            env::var("GITHUB_APP_PRIVATE_KEY"),
        ) {
            GitHubAuth::App {
                app_id,
                private_key_pem: key,
                installation_id: env::var("GITHUB_APP_INSTALLATION_ID").ok(),
            }
        } else if let Ok(token) = env::var("GITHUB_TOKEN").or_else(|_| env::var("GH_TOKEN")) {
            GitHubAuth::Token(token)
        } else {
            GitHubAuth::None
        };

        let concurrency = env::var("OSSMK_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(5);

        let exclude_bots = env::var("OSSMK_EXCLUDE_BOTS")
            .map(|v| v != "0")
            .unwrap_or(true);

        Self {
            auth,
            exclude_bots,
            concurrency,
            installation_owner: env::var("OSSMK_GH_INSTALLATION_OWNER").ok(),
            installation_repo: env::var("OSSMK_GH_INSTALLATION_REPO").ok(),
        }
    }
}

/// Penalty and decay knobs applied by the scoring engine.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub self_repo_penalty: f64,
    pub org_repo_penalty: f64,
    pub user_orgs: Vec<String>,
    pub decay_override: Option<Decay>,
    pub rules_file: Option<String>,
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        let decay_mode = env::var("OSSMK_DECAY_MODE").ok();
        let half_life = env::var("OSSMK_DECAY_HALF_LIFE_DAYS")
            .ok()
            .and_then(|v| v.parse::<f64>().ok());
        let window = env::var("OSSMK_DECAY_WINDOW_DAYS")
            .ok()
            .and_then(|v| v.parse::<f64>().ok());

        let decay_override = match decay_mode.as_deref() {
            Some("exponential") => Some(Decay::Exponential {
                half_life_days: half_life.unwrap_or(30.0),
            }),
            Some("linear") => Some(Decay::Linear {
                window_days: window.unwrap_or(90.0),
            }),
            Some("window") => Some(Decay::Window {
                window_days: window.unwrap_or(90.0),
            }),
            Some("none") => Some(Decay::None),
            _ => None,
        };

        let user_orgs = env::var("OSSMK_USER_ORGS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            self_repo_penalty: env::var("OSSMK_SELF_REPO_PENALTY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
            org_repo_penalty: env::var("OSSMK_ORG_REPO_PENALTY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
            user_orgs,
            decay_override,
            rules_file: env::var("OSSMK_RULES_FILE").ok(),
        }
    }
}

/// Top-level application configuration, collected once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub pg_dsn: Option<String>,
    pub github: GitHubConfig,
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            pg_dsn: env::var("OSSMK_PG_DSN")
                .or_else(|_| env::var("DATABASE_URL"))
                .ok(),
            github: GitHubConfig::from_env(),
            scoring: ScoringConfig::from_env(),
        }
    }
}
