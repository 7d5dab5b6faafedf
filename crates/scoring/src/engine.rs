//! The scoring engine (C7): fairness-clipped, decay-weighted, multi-dimensional
//! accumulation over a stream of [`ContributionEvent`]s.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::models::{ContributionEvent, Kind, Repo, RuleSet, Score};

use crate::metrics::{age_days, day_key, decay_factor};

/// Penalty and decay-override knobs the engine applies on top of a [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub self_repo_penalty: f64,
    pub org_repo_penalty: f64,
    pub user_orgs: Vec<String>,
    pub decay_override: Option<common::models::Decay>,
}

impl ScoringContext {
    pub fn neutral() -> Self {
        Self {
            self_repo_penalty: 1.0,
            org_repo_penalty: 1.0,
            user_orgs: Vec::new(),
            decay_override: None,
        }
    }
}

/// Scores `events` under `rules` and `ctx`, returning one [`Score`] per
/// `(subject, dimension)` pair that accumulated a non-zero value.
///
/// Pure function (P2): the same `events`/`rules`/`ctx` always produce the same
/// output, after the deterministic `(user_id, kind, created_at, id)` sort this
/// function applies internally so clip decisions don't depend on arrival order.
pub fn score_events(events: &[ContributionEvent], rules: &RuleSet, ctx: &ScoringContext) -> Vec<Score> {
    score_events_at(events, rules, ctx, Utc::now())
}

/// Same as [`score_events`] but with an explicit "now" for decay — used by tests
/// that need deterministic ages.
pub fn score_events_at(
    events: &[ContributionEvent],
    rules: &RuleSet,
    ctx: &ScoringContext,
    now: DateTime<Utc>,
) -> Vec<Score> {
    let decay = ctx.decay_override.as_ref().unwrap_or(&rules.decay);

    let mut sorted: Vec<&ContributionEvent> = events.iter().collect();
    sorted.sort_by(|a, b| {
        (a.user_id.as_str(), a.kind as u8, a.created_at, a.id.as_str()).cmp(&(
            b.user_id.as_str(),
            b.kind as u8,
            b.created_at,
            b.id.as_str(),
        ))
    });

    let mut scores: HashMap<(String, String), f64> = HashMap::new();
    let mut counters: HashMap<(String, Kind, chrono::NaiveDate), u32> = HashMap::new();

    for event in sorted {
        let day = day_key(event.created_at);
        let cap = rules.fairness.clip_per_user_day.get(&event.kind).copied();

        if let Some(cap) = cap {
            let key = (event.user_id.clone(), event.kind, day);
            let counter = counters.entry(key).or_insert(0);
            *counter += 1;
            if *counter > cap {
                continue;
            }
        }

        let age = age_days(now, event.created_at);
        let repo = Repo::parse(&event.repo_id);

        for (name, dim) in &rules.dimensions {
            if !dim.kinds.contains(&event.kind) {
                continue;
            }

            let mut weight = dim.weight_for(event.kind);

            if let Some(repo) = &repo {
                if ctx.self_repo_penalty < 1.0
                    && repo.owner.to_lowercase() == event.user_id.to_lowercase()
                {
                    weight *= ctx.self_repo_penalty;
                }
                if !ctx.user_orgs.is_empty() && ctx.user_orgs.contains(&repo.owner.to_lowercase()) {
                    weight *= ctx.org_repo_penalty;
                }
            }

            let Some(factor) = decay_factor(decay, age) else { continue };
            weight *= factor;

            *scores
                .entry((event.user_id.clone(), name.clone()))
                .or_insert(0.0) += weight;
        }
    }

    scores
        .into_iter()
        .map(|((subject_id, dimension), value)| Score {
            subject_id,
            dimension,
            value,
            window: "all".to_string(),
            metadata: HashMap::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;
    use chrono::{Duration, TimeZone};
    use common::models::Kind;

    fn event(id: &str, kind: Kind, repo: &str, user: &str, created_at: DateTime<Utc>) -> ContributionEvent {
        ContributionEvent {
            id: id.to_string(),
            kind,
            repo_id: repo.to_string(),
            user_id: user.to_string(),
            created_at,
            lines_added: 0,
            lines_removed: 0,
        }
    }

    fn find(scores: &[Score], user: &str, dim: &str) -> Option<f64> {
        scores
            .iter()
            .find(|s| s.subject_id == user && s.dimension == dim)
            .map(|s| s.value)
    }

    #[test]
    fn scenario_single_commit_default_rules() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events = vec![event("a", Kind::Commit, "github.com/x/y", "u", at)];
        let scores = score_events_at(&events, &default_rules(), &ScoringContext::neutral(), at);
        assert_eq!(find(&scores, "u", "code"), Some(0.8));
    }

    #[test]
    fn scenario_clipping() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events: Vec<_> = (0..25)
            .map(|i| event(&format!("c{i}"), Kind::Commit, "github.com/x/y", "u", at))
            .collect();
        let scores = score_events_at(&events, &default_rules(), &ScoringContext::neutral(), at);
        assert!((find(&scores, "u", "code").unwrap() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_mixed_kinds() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events = vec![
            event("pr1", Kind::Pr, "github.com/x/y", "u", at),
            event("is1", Kind::Issue, "github.com/x/y", "u", at),
            event("rv1", Kind::Review, "github.com/x/y", "u", at),
        ];
        let scores = score_events_at(&events, &default_rules(), &ScoringContext::neutral(), at);
        assert_eq!(find(&scores, "u", "code"), Some(1.0));
        assert_eq!(find(&scores, "u", "community"), Some(0.3));
        assert_eq!(find(&scores, "u", "review"), Some(0.6));
    }

    #[test]
    fn scenario_exponential_decay() {
        let now = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        let created = now - Duration::days(10);
        let events = vec![event("c1", Kind::Commit, "github.com/x/y", "u", created)];
        let mut rules = default_rules();
        rules.decay = common::models::Decay::Exponential { half_life_days: 10.0 };
        let scores = score_events_at(&events, &rules, &ScoringContext::neutral(), now);
        assert!((find(&scores, "u", "code").unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn self_repo_penalty_reduces_score() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events = vec![event("c1", Kind::Commit, "github.com/u/y", "u", at)];
        let mut ctx = ScoringContext::neutral();
        ctx.self_repo_penalty = 0.5;
        let scores = score_events_at(&events, &default_rules(), &ctx, at);
        assert!((find(&scores, "u", "code").unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn malformed_repo_id_disables_penalties_but_keeps_event() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events = vec![event("c1", Kind::Commit, "not-a-valid-repo-id/a/b/c", "u", at)];
        let mut ctx = ScoringContext::neutral();
        ctx.self_repo_penalty = 0.1;
        let scores = score_events_at(&events, &default_rules(), &ctx, at);
        assert!(find(&scores, "u", "code").is_some());
    }

    #[test]
    fn clip_monotonicity_lower_cap_never_increases_score() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events: Vec<_> = (0..10)
            .map(|i| event(&format!("c{i}"), Kind::Commit, "github.com/x/y", "u", at))
            .collect();

        let mut loose = default_rules();
        loose.fairness.clip_per_user_day.insert(Kind::Commit, 10);
        let mut tight = default_rules();
        tight.fairness.clip_per_user_day.insert(Kind::Commit, 3);

        let loose_scores = score_events_at(&events, &loose, &ScoringContext::neutral(), at);
        let tight_scores = score_events_at(&events, &tight, &ScoringContext::neutral(), at);

        assert!(find(&tight_scores, "u", "code").unwrap() <= find(&loose_scores, "u", "code").unwrap());
    }

    #[test]
    fn scoring_is_deterministic_regardless_of_input_order() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut events = vec![
            event("pr1", Kind::Pr, "github.com/x/y", "u", at),
            event("c1", Kind::Commit, "github.com/x/y", "u", at),
            event("is1", Kind::Issue, "github.com/x/y", "u", at),
        ];
        let forward = score_events_at(&events, &default_rules(), &ScoringContext::neutral(), at);
        events.reverse();
        let backward = score_events_at(&events, &default_rules(), &ScoringContext::neutral(), at);

        let mut forward_sorted = forward.clone();
        let mut backward_sorted = backward.clone();
        forward_sorted.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        backward_sorted.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        assert_eq!(forward_sorted, backward_sorted);
    }
}
