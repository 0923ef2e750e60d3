use serde::Serialize;

use super::batch::{Batch, BatchId, BatchState, EvaluationRecord};
use super::domain::{Candidate, CandidateId, WeightProfile, WeightProfileId};

/// Read access to the site catalog owned by the CRUD layer.
pub trait CandidateCatalog: Send + Sync {
    /// Sites with `ACTIVE` status. The matrix builder still screens their values.
    fn list_eligible(&self) -> Result<Vec<Candidate>, RepositoryError>;
    fn fetch(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError>;
    fn counts(&self) -> Result<CatalogCounts, RepositoryError>;
}

/// Site totals reported alongside result statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub total: usize,
    pub active: usize,
}

/// Read access to expert weight profiles.
pub trait WeightProfileStore: Send + Sync {
    fn fetch(&self, id: WeightProfileId) -> Result<Option<WeightProfile>, RepositoryError>;
    /// Every profile flagged active; more than one is a configuration error upstream.
    fn active(&self) -> Result<Vec<WeightProfile>, RepositoryError>;
}

/// Append-only store of evaluation batches.
///
/// Implementations must make `persist_batch` atomic: readers observe either none or all of a
/// batch's records, and only `Committed` batches are ever returned by the query methods.
pub trait BatchStore: Send + Sync {
    /// Registers a `Pending` batch that readers cannot see yet.
    fn begin(&self, batch: Batch) -> Result<Batch, RepositoryError>;
    /// Writes every record of a pending batch and commits it in one step.
    fn persist_batch(
        &self,
        batch_id: &BatchId,
        records: Vec<EvaluationRecord>,
    ) -> Result<Batch, RepositoryError>;
    fn mark_failed(&self, batch_id: &BatchId, reason: &str) -> Result<(), RepositoryError>;
    fn batch(&self, batch_id: &BatchId) -> Result<Option<Batch>, RepositoryError>;
    fn latest_batch(&self) -> Result<Option<Batch>, RepositoryError>;
    /// Records of a committed batch ordered by rank position.
    fn records_for_batch(&self, batch_id: &BatchId)
        -> Result<Vec<EvaluationRecord>, RepositoryError>;
    fn latest_per_candidate(&self) -> Result<Vec<EvaluationRecord>, RepositoryError>;
    /// Every committed record for the candidate, newest first.
    fn history_for_candidate(
        &self,
        candidate_id: CandidateId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("batch {batch_id} is {} and cannot change state", state.label())]
    InvalidState { batch_id: BatchId, state: BatchState },
    #[error("rejected batch snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
