//! Service layer for business logic.

pub mod deep_analysis;
pub mod prewarm_cache;

pub use deep_analysis::{AnalysisOutcome, CreatedShare, DeepAnalysisService};
pub use prewarm_cache::{signature_of, PrewarmCache};
