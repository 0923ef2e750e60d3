//! TOPSIS scoring over a decision matrix.
//!
//! Columns are vector-normalized, weighted, and compared against the ideal and negative-ideal
//! reference points. A candidate's closeness coefficient is its relative distance from the
//! negative-ideal: `C = S⁻ / (S⁺ + S⁻)`.

use serde::Serialize;

use super::domain::{CandidateId, Polarity};
use super::error::DataError;
use super::matrix::DecisionMatrix;

/// Closeness assigned when a candidate coincides with both reference points.
pub const DEGENERATE_CLOSENESS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub candidate_id: CandidateId,
    pub closeness: f64,
    pub separation_ideal: f64,
    pub separation_negative: f64,
}

/// Scores in matrix row order plus the reference geometry used to compute them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringOutcome {
    pub scores: Vec<CandidateScore>,
    pub ideal: Vec<f64>,
    pub negative_ideal: Vec<f64>,
    /// Set when at least one candidate sat on both references, making its score uninformative.
    pub degenerate: bool,
}

/// Stateless TOPSIS evaluator; identical inputs always produce identical scores.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopsisEngine;

impl TopsisEngine {
    pub fn new() -> Self {
        Self
    }

    /// `weights` must already sum to one and line up with the matrix columns, as must `polarities`.
    pub fn score(
        &self,
        matrix: &DecisionMatrix,
        weights: &[f64],
        polarities: &[Polarity],
    ) -> Result<ScoringOutcome, DataError> {
        let criteria = matrix.criteria_count();
        if weights.len() != criteria || polarities.len() != criteria {
            return Err(DataError::DimensionMismatch {
                weights: weights.len(),
                criteria,
            });
        }
        if matrix.candidate_count() == 0 || criteria == 0 {
            return Err(DataError::InsufficientData {
                candidates: matrix.candidate_count(),
                criteria,
            });
        }

        let scales = column_scales(matrix.rows(), criteria);
        let weighted = weighted_normalized(matrix.rows(), &scales, weights);
        let (ideal, negative_ideal) = reference_points(&weighted, polarities);

        let mut degenerate = false;
        let scores = matrix
            .candidate_ids()
            .iter()
            .zip(&weighted)
            .map(|(candidate_id, row)| {
                let separation_ideal = distance(row, &ideal);
                let separation_negative = distance(row, &negative_ideal);
                let total = separation_ideal + separation_negative;
                let closeness = if total > 0.0 {
                    (separation_negative / total).clamp(0.0, 1.0)
                } else {
                    degenerate = true;
                    DEGENERATE_CLOSENESS
                };

                CandidateScore {
                    candidate_id: *candidate_id,
                    closeness,
                    separation_ideal,
                    separation_negative,
                }
            })
            .collect();

        Ok(ScoringOutcome {
            scores,
            ideal,
            negative_ideal,
            degenerate,
        })
    }
}

/// Largest magnitude in a column and the column's Euclidean norm measured in units of it.
#[derive(Debug, Clone, Copy)]
struct ColumnScale {
    peak: f64,
    scaled_norm: f64,
}

// Squaring `x / peak` instead of `x` keeps the sum finite and non-zero for any finite column
// that is not all zeros.
fn column_scales(rows: &[Vec<f64>], criteria: usize) -> Vec<Option<ColumnScale>> {
    (0..criteria)
        .map(|column| {
            let values = || rows.iter().filter_map(move |row| row.get(column).copied());
            let peak = values().fold(0.0_f64, |peak, value| peak.max(value.abs()));
            if peak == 0.0 {
                return None;
            }

            let scaled_norm = values()
                .map(|value| (value / peak).powi(2))
                .sum::<f64>()
                .sqrt();
            Some(ColumnScale { peak, scaled_norm })
        })
        .collect()
}

// An all-zero column contributes nothing.
fn weighted_normalized(
    rows: &[Vec<f64>],
    scales: &[Option<ColumnScale>],
    weights: &[f64],
) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(scales)
                .zip(weights)
                .map(|((value, scale), weight)| match scale {
                    Some(scale) => value / scale.peak / scale.scaled_norm * weight,
                    None => 0.0,
                })
                .collect()
        })
        .collect()
}

fn reference_points(weighted: &[Vec<f64>], polarities: &[Polarity]) -> (Vec<f64>, Vec<f64>) {
    let mut ideal = Vec::with_capacity(polarities.len());
    let mut negative_ideal = Vec::with_capacity(polarities.len());

    for (column, polarity) in polarities.iter().enumerate() {
        let (min, max) = weighted
            .iter()
            .filter_map(|row| row.get(column).copied())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
                (min.min(value), max.max(value))
            });

        match polarity {
            Polarity::Benefit => {
                ideal.push(max);
                negative_ideal.push(min);
            }
            Polarity::Cost => {
                ideal.push(min);
                negative_ideal.push(max);
            }
        }
    }

    (ideal, negative_ideal)
}

fn distance(row: &[f64], reference: &[f64]) -> f64 {
    row.iter()
        .zip(reference)
        .map(|(value, target)| (value - target).powi(2))
        .sum::<f64>()
        .sqrt()
}
