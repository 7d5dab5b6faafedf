//! Rule loading (C6) and the scoring engine (C7).

pub mod engine;
pub mod metrics;
pub mod rules;

pub use engine::{score_events, ScoringContext};
pub use rules::{default_rules, load_rules, RuleError};
