//! Multi-criteria ranking of candidate retail sites.
//!
//! Weight resolution and matrix screening feed the TOPSIS engine; ranked results are committed
//! as immutable batches that later queries read back.

pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod matrix;
pub mod rank;
pub mod repository;
pub mod router;
pub mod service;
pub mod summary;
pub mod topsis;
pub mod weights;

#[cfg(test)]
mod tests;

pub use batch::{Batch, BatchId, BatchState, EvaluationRecord};
pub use config::RankingConfig;
pub use domain::{
    Candidate, CandidateId, CandidateStatus, CriteriaDefinition, CriteriaSchema, CriterionId,
    Polarity, WeightProfile, WeightProfileId,
};
pub use error::{ConfigurationError, DataError, RankingError};
pub use ledger::BatchLedger;
pub use matrix::{DecisionMatrix, Exclusion, ExclusionReason};
pub use rank::{rank, RankedCandidate, TIE_EPSILON};
pub use repository::{
    BatchStore, CandidateCatalog, CatalogCounts, RepositoryError, WeightProfileStore,
};
pub use router::analysis_router;
pub use service::{AnalysisReport, BatchSnapshot, RankedSiteView, RankingService, SiteDetails};
pub use summary::{
    summarize, ResultSource, ResultSummary, ScoreStatistics, SiteStatistics, StatisticsScope,
};
pub use topsis::{CandidateScore, ScoringOutcome, TopsisEngine};
pub use weights::ResolvedWeights;
