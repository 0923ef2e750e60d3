use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::batch::{Batch, BatchId, EvaluationRecord};
use super::config::RankingConfig;
use super::domain::{Candidate, CandidateId, CriteriaSchema, CriterionId, WeightProfileId};
use super::error::{ConfigurationError, RankingError};
use super::matrix::{DecisionMatrix, Exclusion, MatrixBuild};
use super::rank::rank;
use super::repository::{BatchStore, CandidateCatalog, WeightProfileStore};
use super::summary::{
    summarize, ResultSource, ScoreStatistics, SiteStatistics, StatisticsScope,
};
use super::topsis::{CandidateScore, ScoringOutcome, TopsisEngine};
use super::weights::{self, ResolvedWeights};

pub const METHOD_TOPSIS: &str = "topsis";

/// Runs TOPSIS analyses and serves committed results.
///
/// Each run resolves weights, screens the catalog into a decision matrix, scores and ranks it,
/// then commits every record as one batch. Anything that fails after the batch is opened marks
/// it failed; nothing from a failed run is ever readable.
pub struct RankingService<C, P, B> {
    schema: Arc<CriteriaSchema>,
    catalog: Arc<C>,
    profiles: Arc<P>,
    batches: Arc<B>,
    engine: TopsisEngine,
    config: RankingConfig,
}

impl<C, P, B> RankingService<C, P, B>
where
    C: CandidateCatalog + 'static,
    P: WeightProfileStore + 'static,
    B: BatchStore + 'static,
{
    pub fn new(
        schema: CriteriaSchema,
        catalog: Arc<C>,
        profiles: Arc<P>,
        batches: Arc<B>,
        config: RankingConfig,
    ) -> Result<Self, RankingError> {
        if schema.get(&config.statistics_criterion).is_none() {
            return Err(ConfigurationError::UnknownStatisticsCriterion {
                criterion: config.statistics_criterion,
            }
            .into());
        }

        Ok(Self {
            schema: Arc::new(schema),
            catalog,
            profiles,
            batches,
            engine: TopsisEngine::new(),
            config,
        })
    }

    pub fn schema(&self) -> &CriteriaSchema {
        &self.schema
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Run one analysis with the given profile, or the active one, and commit it.
    pub fn run_analysis(
        &self,
        weight_profile_id: Option<WeightProfileId>,
    ) -> Result<AnalysisReport, RankingError> {
        self.run_analysis_at(weight_profile_id, Utc::now())
    }

    pub fn run_analysis_at(
        &self,
        weight_profile_id: Option<WeightProfileId>,
        created_at: DateTime<Utc>,
    ) -> Result<AnalysisReport, RankingError> {
        let started = Instant::now();

        let (weights, candidates, build) = self
            .prepare(weight_profile_id)
            .inspect_err(|error| {
                warn!(kind = error.kind(), %error, "analysis rejected before batch allocation");
            })?;

        let pending = Batch::pending(weights.profile_id, created_at);
        let batch_id = pending.id.clone();
        let batch = self.batches.begin(pending).map_err(|source| {
            error!(%batch_id, error = %source, "unable to open analysis batch");
            RankingError::Persistence { batch_id, source }
        })?;
        debug!(batch_id = %batch.id, profile_id = %weights.profile_id, "analysis batch opened");

        match self.score_and_commit(&batch, &weights, &build.matrix, started) {
            Ok((committed, outcome, records)) => {
                let elapsed_ms = elapsed_ms(started);
                let report = self.report(
                    committed,
                    &weights,
                    &candidates,
                    build.exclusions,
                    outcome,
                    records,
                    elapsed_ms,
                );

                if report.degenerate {
                    warn!(
                        batch_id = %report.batch_id,
                        "degenerate input: at least one site sits on both reference points"
                    );
                }
                info!(
                    batch_id = %report.batch_id,
                    profile_id = %report.weight_profile_id,
                    sites = report.sites_analyzed,
                    excluded = report.excluded_count,
                    elapsed_ms,
                    "analysis batch committed"
                );
                Ok(report)
            }
            Err(failure) => {
                if let Err(mark_error) = self.batches.mark_failed(&batch.id, &failure.to_string()) {
                    warn!(batch_id = %batch.id, error = %mark_error, "unable to mark batch failed");
                }
                error!(
                    batch_id = %batch.id,
                    kind = failure.kind(),
                    error = %failure,
                    "analysis batch failed"
                );
                Err(failure)
            }
        }
    }

    /// The first `n` results of the requested view, in ranking order.
    pub fn top_n(
        &self,
        requested: Option<usize>,
        source: ResultSource,
    ) -> Result<Vec<RankedSiteView>, RankingError> {
        let limit = self.validate_top_n(requested)?;
        let records = match source {
            ResultSource::LatestBatch => match self.batches.latest_batch()? {
                Some(batch) => self.batches.records_for_batch(&batch.id)?,
                None => Vec::new(),
            },
            ResultSource::LatestPerSite => self.batches.latest_per_candidate()?,
        };

        records
            .iter()
            .take(limit)
            .map(|record| {
                let site = self.catalog.fetch(record.candidate_id)?;
                Ok::<_, RankingError>(RankedSiteView::from_record(record, site.as_ref()))
            })
            .collect()
    }

    /// Every committed evaluation of a site, newest first.
    pub fn history(
        &self,
        candidate_id: CandidateId,
    ) -> Result<Vec<EvaluationRecord>, RankingError> {
        Ok(self.batches.history_for_candidate(candidate_id)?)
    }

    pub fn latest_batch(&self) -> Result<Option<BatchSnapshot>, RankingError> {
        match self.batches.latest_batch()? {
            Some(batch) => {
                let records = self.batches.records_for_batch(&batch.id)?;
                Ok(Some(BatchSnapshot { batch, records }))
            }
            None => Ok(None),
        }
    }

    pub fn batch_results(&self, batch_id: &BatchId) -> Result<BatchSnapshot, RankingError> {
        let batch = self
            .batches
            .batch(batch_id)?
            .ok_or_else(|| RankingError::BatchNotFound(batch_id.clone()))?;
        let records = self.batches.records_for_batch(&batch.id)?;
        Ok(BatchSnapshot { batch, records })
    }

    pub fn statistics(&self, scope: StatisticsScope) -> Result<SiteStatistics, RankingError> {
        let (batch_id, records) = match &scope {
            StatisticsScope::LatestBatch => match self.batches.latest_batch()? {
                Some(batch) => {
                    let records = self.batches.records_for_batch(&batch.id)?;
                    (Some(batch.id), records)
                }
                None => (None, Vec::new()),
            },
            StatisticsScope::LatestPerSite => (None, self.batches.latest_per_candidate()?),
            StatisticsScope::Batch(batch_id) => {
                let snapshot = self.batch_results(batch_id)?;
                (Some(snapshot.batch.id), snapshot.records)
            }
        };

        let counts = self.catalog.counts()?;
        let criterion = self.config.statistics_criterion.clone();
        let mut criterion_values = BTreeMap::new();
        for record in &records {
            if let Some(value) = self
                .catalog
                .fetch(record.candidate_id)?
                .and_then(|site| site.value(&criterion))
            {
                criterion_values.insert(record.candidate_id, value);
            }
        }
        let summary = summarize(&records, |candidate_id| {
            criterion_values.get(&candidate_id).copied()
        });

        Ok(SiteStatistics {
            scope: scope.label(),
            batch_id,
            total_sites: counts.total,
            active_sites: counts.active,
            analyzed_sites: summary.count,
            average_closeness: summary.mean_closeness,
            criterion,
            average_criterion: summary.mean_criterion,
        })
    }

    /// Resolves `None` to the configured default and rejects values outside `1..=max_top_n`.
    pub fn validate_top_n(&self, requested: Option<usize>) -> Result<usize, RankingError> {
        let limit = requested.unwrap_or(self.config.default_top_n);
        if limit == 0 || limit > self.config.max_top_n {
            return Err(RankingError::InvalidTopN {
                requested: limit,
                max: self.config.max_top_n,
            });
        }
        Ok(limit)
    }

    fn prepare(
        &self,
        weight_profile_id: Option<WeightProfileId>,
    ) -> Result<(ResolvedWeights, Vec<Candidate>, MatrixBuild), RankingError> {
        let weights = weights::resolve(self.profiles.as_ref(), &self.schema, weight_profile_id)?;
        let candidates = self.catalog.list_eligible()?;
        let build = DecisionMatrix::build(&candidates, &self.schema)?;

        for exclusion in &build.exclusions {
            debug!(
                candidate_id = %exclusion.candidate_id,
                reason = %exclusion.reason.summary(),
                "site excluded from analysis"
            );
        }

        Ok((weights, candidates, build))
    }

    fn score_and_commit(
        &self,
        batch: &Batch,
        weights: &ResolvedWeights,
        matrix: &DecisionMatrix,
        started: Instant,
    ) -> Result<(Batch, ScoringOutcome, Vec<EvaluationRecord>), RankingError> {
        let outcome = self
            .engine
            .score(matrix, weights.weights(), &self.schema.polarities())?;
        let ranked = rank(&outcome.scores);

        if let Some(limit_ms) = self.config.run_timeout_ms {
            if started.elapsed() >= Duration::from_millis(limit_ms) {
                return Err(RankingError::RunTimedOut {
                    batch_id: batch.id.clone(),
                    limit_ms,
                });
            }
        }

        let execution_time_ms = elapsed_ms(started);
        let records: Vec<EvaluationRecord> = ranked
            .into_iter()
            .map(|entry| EvaluationRecord {
                batch_id: batch.id.clone(),
                candidate_id: entry.candidate_id,
                weight_profile_id: weights.profile_id,
                closeness_score: entry.closeness,
                rank_position: entry.rank_position,
                created_at: batch.created_at,
                execution_time_ms,
            })
            .collect();

        let committed = self
            .batches
            .persist_batch(&batch.id, records.clone())
            .map_err(|source| RankingError::Persistence {
                batch_id: batch.id.clone(),
                source,
            })?;

        Ok((committed, outcome, records))
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        batch: Batch,
        weights: &ResolvedWeights,
        candidates: &[Candidate],
        exclusions: Vec<Exclusion>,
        outcome: ScoringOutcome,
        records: Vec<EvaluationRecord>,
        elapsed_ms: u64,
    ) -> AnalysisReport {
        let mut sites: BTreeMap<CandidateId, &Candidate> = BTreeMap::new();
        for candidate in candidates {
            sites.entry(candidate.id).or_insert(candidate);
        }
        let separations: BTreeMap<CandidateId, &CandidateScore> = outcome
            .scores
            .iter()
            .map(|score| (score.candidate_id, score))
            .collect();

        let closeness: Vec<f64> = records.iter().map(|record| record.closeness_score).collect();
        let ranked_results = records
            .iter()
            .map(|record| {
                let mut view =
                    RankedSiteView::from_record(record, sites.get(&record.candidate_id).copied());
                if let Some(score) = separations.get(&record.candidate_id) {
                    view.separation_ideal = Some(score.separation_ideal);
                    view.separation_negative = Some(score.separation_negative);
                }
                view
            })
            .collect();

        AnalysisReport {
            batch_id: batch.id,
            weight_profile_id: weights.profile_id,
            strategy_name: weights.profile_name.clone(),
            method: METHOD_TOPSIS,
            created_at: batch.created_at,
            sites_analyzed: records.len(),
            excluded_count: exclusions.len(),
            exclusions,
            degenerate: outcome.degenerate,
            elapsed_ms,
            score_statistics: ScoreStatistics::from_scores(&closeness),
            ideal_solution: outcome.ideal,
            negative_ideal_solution: outcome.negative_ideal,
            ranked_results,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of a committed analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub batch_id: BatchId,
    pub weight_profile_id: WeightProfileId,
    pub strategy_name: String,
    pub method: &'static str,
    pub created_at: DateTime<Utc>,
    pub sites_analyzed: usize,
    pub excluded_count: usize,
    pub exclusions: Vec<Exclusion>,
    pub degenerate: bool,
    pub elapsed_ms: u64,
    pub score_statistics: ScoreStatistics,
    pub ideal_solution: Vec<f64>,
    pub negative_ideal_solution: Vec<f64>,
    pub ranked_results: Vec<RankedSiteView>,
}

impl AnalysisReport {
    /// Keeps only the first `limit` ranked results; counts and statistics still cover the run.
    pub fn truncated(mut self, limit: usize) -> Self {
        self.ranked_results.truncate(limit);
        self
    }
}

/// Committed batch with its records in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSnapshot {
    pub batch: Batch,
    pub records: Vec<EvaluationRecord>,
}

/// One ranked site as returned by run and top-N responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSiteView {
    pub rank_position: u32,
    pub candidate_id: CandidateId,
    pub closeness_score: f64,
    pub batch_id: BatchId,
    pub evaluated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separation_ideal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separation_negative: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteDetails>,
}

impl RankedSiteView {
    pub fn from_record(record: &EvaluationRecord, site: Option<&Candidate>) -> Self {
        Self {
            rank_position: record.rank_position,
            candidate_id: record.candidate_id,
            closeness_score: record.closeness_score,
            batch_id: record.batch_id.clone(),
            evaluated_at: record.created_at,
            separation_ideal: None,
            separation_negative: None,
            site: site.map(SiteDetails::from),
        }
    }
}

/// Descriptive site fields carried alongside a score. Never scored themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteDetails {
    pub site_code: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    pub criteria: BTreeMap<CriterionId, f64>,
}

impl From<&Candidate> for SiteDetails {
    fn from(candidate: &Candidate) -> Self {
        Self {
            site_code: candidate.site_code.clone(),
            address: candidate.address.clone(),
            district: candidate.district.clone(),
            criteria: candidate.values.clone(),
        }
    }
}
