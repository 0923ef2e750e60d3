use super::batch::BatchId;
use super::domain::{CriterionId, WeightProfileId};
use super::repository::RepositoryError;

/// Weight profile selection or validation failed; fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("weight profile {0} not found")]
    ProfileNotFound(WeightProfileId),
    #[error("expected exactly one active weight profile, found {active_count}")]
    NoActiveProfile { active_count: usize },
    #[error("weight profile {profile_id} has no weight for criterion {criterion}")]
    MissingWeight {
        profile_id: WeightProfileId,
        criterion: CriterionId,
    },
    #[error("weight {weight} for {criterion} in profile {profile_id} must be finite and >= 0")]
    InvalidWeight {
        profile_id: WeightProfileId,
        criterion: CriterionId,
        weight: f64,
    },
    #[error("weight profile {profile_id} needs at least one positive weight")]
    ZeroWeightSum { profile_id: WeightProfileId },
    #[error("statistics criterion {criterion} is not part of the criteria schema")]
    UnknownStatisticsCriterion { criterion: CriterionId },
}

/// Input data cannot support a ranking run.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("insufficient data: {candidates} eligible candidate(s) across {criteria} criteria")]
    InsufficientData { candidates: usize, criteria: usize },
    #[error("weight vector has {weights} entries but the matrix has {criteria} criteria")]
    DimensionMismatch { weights: usize, criteria: usize },
}

/// Failure surfaced by the ranking service.
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("failed to persist batch {batch_id}: {source}")]
    Persistence {
        batch_id: BatchId,
        #[source]
        source: RepositoryError,
    },
    #[error("analysis for batch {batch_id} exceeded its {limit_ms} ms deadline")]
    RunTimedOut { batch_id: BatchId, limit_ms: u64 },
    #[error("requested {requested} results; limit must be between 1 and {max}")]
    InvalidTopN { requested: usize, max: usize },
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RankingError {
    /// Short machine-readable category for API payloads and logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            RankingError::Configuration(_) => "configuration_error",
            RankingError::Data(_) => "data_error",
            RankingError::Persistence { .. } => "persistence_failure",
            RankingError::RunTimedOut { .. } => "run_timed_out",
            RankingError::InvalidTopN { .. } => "invalid_request",
            RankingError::BatchNotFound(_) => "not_found",
            RankingError::Repository(_) => "repository_error",
        }
    }
}
