//! Domain models

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of activity a [`ContributionEvent`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Commit,
    Pr,
    Review,
    Issue,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Commit => "commit",
            Kind::Pr => "pr",
            Kind::Review => "review",
            Kind::Issue => "issue",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Kind::Commit),
            "pr" => Ok(Kind::Pr),
            "review" => Ok(Kind::Review),
            "issue" => Ok(Kind::Issue),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// A forge repository identifier: `host/owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repo {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(host: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name` against `host="github.com"`, or `host/owner/name` if two
    /// slashes are present. Malformed input (not 2 or 3 segments) is rejected.
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        match parts.as_slice() {
            [owner, name] => Some(Repo::new("github.com", *owner, *name)),
            [host, owner, name] => Some(Repo::new(*host, *owner, *name)),
            _ => None,
        }
    }

    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.host, self.owner, self.name)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// A forge user, identified by a stable `login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            id: login.clone(),
            login,
        }
    }
}

/// A single normalized unit of contribution activity.
///
/// `id` must be stable and unique within `(host, kind)` space so repeated ingestion
/// is a pure upsert-ignore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionEvent {
    pub id: String,
    pub kind: Kind,
    pub repo_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub lines_added: u64,
    #[serde(default)]
    pub lines_removed: u64,
}

/// A computed per-subject, per-dimension score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub subject_id: String,
    pub dimension: String,
    pub value: f64,
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_window() -> String {
    "all".to_string()
}

/// How a contribution's weight shrinks with age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Decay {
    Exponential { half_life_days: f64 },
    Linear { window_days: f64 },
    Window { window_days: f64 },
    None,
}

impl Default for Decay {
    fn default() -> Self {
        Decay::None
    }
}

/// A single scoring dimension: which kinds it aggregates, at what weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub kinds: Vec<Kind>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub weights_by_kind: HashMap<Kind, f64>,
    #[serde(default)]
    pub clip_per_user_day: HashMap<Kind, u32>,
}

fn default_weight() -> f64 {
    1.0
}

impl Dimension {
    pub fn weight_for(&self, kind: Kind) -> f64 {
        self.weights_by_kind.get(&kind).copied().unwrap_or(self.weight)
    }
}

/// Fairness caps applied before any dimension accumulates an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fairness {
    #[serde(default)]
    pub clip_per_user_day: HashMap<Kind, u32>,
}

/// A fully resolved, immutable ruleset used for one scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub dimensions: HashMap<String, Dimension>,
    #[serde(default)]
    pub fairness: Fairness,
    #[serde(default)]
    pub decay: Decay,
}
