use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{Candidate, CandidateId, CriteriaSchema, CriterionId};
use super::error::DataError;

/// Why a candidate was left out of a run. Exclusions are metadata, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    Inactive,
    DuplicateId,
    MissingValue { criterion: CriterionId },
    NonFiniteValue { criterion: CriterionId },
}

impl ExclusionReason {
    pub fn summary(&self) -> String {
        match self {
            ExclusionReason::Inactive => "site is not active".to_string(),
            ExclusionReason::DuplicateId => "duplicate site identifier".to_string(),
            ExclusionReason::MissingValue { criterion } => {
                format!("missing value for {criterion}")
            }
            ExclusionReason::NonFiniteValue { criterion } => {
                format!("non-finite value for {criterion}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub candidate_id: CandidateId,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// N eligible candidates × M criteria of raw, finite values.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionMatrix {
    candidate_ids: Vec<CandidateId>,
    rows: Vec<Vec<f64>>,
    criteria: usize,
}

/// Matrix plus the candidates screened out while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuild {
    pub matrix: DecisionMatrix,
    pub exclusions: Vec<Exclusion>,
}

impl DecisionMatrix {
    /// Screens candidates and lays out their values in schema column order.
    pub fn build(
        candidates: &[Candidate],
        schema: &CriteriaSchema,
    ) -> Result<MatrixBuild, DataError> {
        if schema.is_empty() {
            return Err(DataError::InsufficientData {
                candidates: candidates.len(),
                criteria: 0,
            });
        }

        let mut seen = BTreeSet::new();
        let mut candidate_ids = Vec::with_capacity(candidates.len());
        let mut rows = Vec::with_capacity(candidates.len());
        let mut exclusions = Vec::new();

        for candidate in candidates {
            if !candidate.is_active() {
                exclusions.push(Exclusion {
                    candidate_id: candidate.id,
                    reason: ExclusionReason::Inactive,
                });
                continue;
            }
            if seen.contains(&candidate.id) {
                exclusions.push(Exclusion {
                    candidate_id: candidate.id,
                    reason: ExclusionReason::DuplicateId,
                });
                continue;
            }

            match row_for(candidate, schema) {
                Ok(row) => {
                    seen.insert(candidate.id);
                    candidate_ids.push(candidate.id);
                    rows.push(row);
                }
                Err(reason) => exclusions.push(Exclusion {
                    candidate_id: candidate.id,
                    reason,
                }),
            }
        }

        if rows.is_empty() {
            return Err(DataError::InsufficientData {
                candidates: 0,
                criteria: schema.len(),
            });
        }

        Ok(MatrixBuild {
            matrix: DecisionMatrix {
                candidate_ids,
                rows,
                criteria: schema.len(),
            },
            exclusions,
        })
    }

    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.candidate_ids
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn candidate_count(&self) -> usize {
        self.rows.len()
    }

    pub fn criteria_count(&self) -> usize {
        self.criteria
    }
}

fn row_for(candidate: &Candidate, schema: &CriteriaSchema) -> Result<Vec<f64>, ExclusionReason> {
    schema
        .criteria()
        .iter()
        .map(|criterion| match candidate.value(&criterion.id) {
            Some(value) if value.is_finite() => Ok(value),
            Some(_) => Err(ExclusionReason::NonFiniteValue {
                criterion: criterion.id.clone(),
            }),
            None => Err(ExclusionReason::MissingValue {
                criterion: criterion.id.clone(),
            }),
        })
        .collect()
}
