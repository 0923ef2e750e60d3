use serde::{Deserialize, Serialize};

use super::batch::{BatchId, EvaluationRecord};
use super::domain::{CandidateId, CriterionId};

/// Aggregate of a result set; empty input yields zero counts and means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResultSummary {
    pub count: usize,
    pub mean_closeness: f64,
    pub mean_criterion: f64,
}

/// Averages closeness plus one criterion looked up per candidate. Candidates without a finite
/// criterion value still count towards the closeness mean.
pub fn summarize<F>(records: &[EvaluationRecord], criterion_value: F) -> ResultSummary
where
    F: Fn(CandidateId) -> Option<f64>,
{
    if records.is_empty() {
        return ResultSummary::default();
    }

    let mean_closeness = mean(records.iter().map(|record| record.closeness_score));
    let mean_criterion = mean(
        records
            .iter()
            .filter_map(|record| criterion_value(record.candidate_id))
            .filter(|value| value.is_finite()),
    );

    ResultSummary {
        count: records.len(),
        mean_closeness,
        mean_criterion,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Spread of closeness scores within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; zero with fewer than two scores.
    pub std_dev: f64,
}

impl ScoreStatistics {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }

        let mean = mean(scores.iter().copied());
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = if scores.len() < 2 {
            0.0
        } else {
            let variance = scores
                .iter()
                .map(|score| (score - mean).powi(2))
                .sum::<f64>()
                / (scores.len() - 1) as f64;
            variance.sqrt()
        };

        Self {
            min,
            max,
            mean,
            std_dev,
        }
    }
}

/// Which committed results a statistics request aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatisticsScope {
    LatestBatch,
    LatestPerSite,
    Batch(BatchId),
}

impl StatisticsScope {
    pub fn label(&self) -> String {
        match self {
            StatisticsScope::LatestBatch => "latest_batch".to_string(),
            StatisticsScope::LatestPerSite => "latest_per_site".to_string(),
            StatisticsScope::Batch(batch_id) => format!("batch:{batch_id}"),
        }
    }
}

/// Result set used by top-N queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    #[default]
    LatestBatch,
    LatestPerSite,
}

/// Dashboard statistics for a result scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStatistics {
    pub scope: String,
    pub batch_id: Option<BatchId>,
    pub total_sites: usize,
    pub active_sites: usize,
    pub analyzed_sites: usize,
    pub average_closeness: f64,
    pub criterion: CriterionId,
    pub average_criterion: f64,
}
