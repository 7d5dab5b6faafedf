//! The Analyze Service crate (C9): fetch→score→persist orchestration plus the
//! optional update-quota/growth-points tier.

pub mod quota_service;
pub mod service;

pub use quota_service::{backend_update_user, UpdateError, UpdateOutcome};
pub use service::{AnalysisResult, AnalysisSummary, AnalyzeError, AnalyzeService, ApiMode};
