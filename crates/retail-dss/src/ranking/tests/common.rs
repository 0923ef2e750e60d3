use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::ranking::batch::{Batch, BatchId, EvaluationRecord};
use crate::ranking::domain::{
    Candidate, CandidateId, CandidateStatus, CriteriaDefinition, CriteriaSchema, CriterionId,
    Polarity, WeightProfile, WeightProfileId,
};
use crate::ranking::ledger::BatchLedger;
use crate::ranking::repository::{
    BatchStore, CandidateCatalog, CatalogCounts, RepositoryError, WeightProfileStore,
};
use crate::ranking::{analysis_router, RankingConfig, RankingService};
use crate::sites::SiteCsvImporter;

pub(super) const SCENARIO_CLOSENESS: [(u64, f64); 3] = [
    (2, 0.7459234339550412),
    (1, 0.6666666666666666),
    (3, 0.2540765660449588),
];

pub(super) fn two_criteria_schema() -> CriteriaSchema {
    CriteriaSchema::new(vec![
        CriteriaDefinition::new("rent_cost", "Monthly rent", Polarity::Cost, 0.5),
        CriteriaDefinition::new("traffic_score", "Foot traffic", Polarity::Benefit, 0.5),
    ])
}

pub(super) fn site(id: u64, rent_cost: f64, traffic_score: f64) -> Candidate {
    Candidate {
        id: CandidateId(id),
        site_code: format!("HN-{id:03}"),
        address: format!("{id} Tran Hung Dao"),
        district: Some("Hoan Kiem".to_string()),
        status: CandidateStatus::Active,
        values: [
            (CriterionId::new("rent_cost"), rent_cost),
            (CriterionId::new("traffic_score"), traffic_score),
        ]
        .into_iter()
        .collect(),
    }
}

pub(super) fn scenario_sites() -> Vec<Candidate> {
    vec![site(1, 100.0, 80.0), site(2, 50.0, 60.0), site(3, 200.0, 90.0)]
}

pub(super) fn balanced_profile(id: u64, active: bool) -> WeightProfile {
    let mut profile = two_criteria_schema().default_profile(WeightProfileId(id), "Balanced");
    profile.active = active;
    profile
}

/// The twelve Hanoi sample sites: one inactive, one without a traffic score.
pub(super) fn hanoi_sites(schema: &CriteriaSchema) -> Vec<Candidate> {
    let data = include_bytes!("../../../fixtures/hanoi_sites.csv");
    SiteCsvImporter::from_reader(&data[..], schema).expect("fixture imports")
}

/// Balanced, cost focused and footfall focused strategies over the retail schema.
pub(super) fn expert_profiles(schema: &CriteriaSchema) -> Vec<WeightProfile> {
    let emphasis: [(u64, &str, &[(&str, f64)]); 3] = [
        (1, "Balanced", &[]),
        (2, "Cost focused", &[("rent_cost", 0.35), ("renovation_cost", 0.20)]),
        (
            3,
            "Footfall focused",
            &[("traffic_score", 0.35), ("population_density", 0.20)],
        ),
    ];

    emphasis
        .iter()
        .map(|(id, name, overrides)| {
            let mut profile = schema.default_profile(WeightProfileId(*id), name);
            for (criterion, weight) in *overrides {
                profile.weights.insert(CriterionId::new(*criterion), *weight);
            }
            profile
        })
        .collect()
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) type MemoryService = RankingService<MemoryCatalog, MemoryProfiles, BatchLedger>;

pub(super) fn build_service(sites: Vec<Candidate>) -> (MemoryService, BatchLedger) {
    build_service_with(sites, vec![balanced_profile(1, true)], RankingConfig::default())
}

pub(super) fn build_service_with(
    sites: Vec<Candidate>,
    profiles: Vec<WeightProfile>,
    config: RankingConfig,
) -> (MemoryService, BatchLedger) {
    let ledger = BatchLedger::new();
    let service = RankingService::new(
        two_criteria_schema(),
        Arc::new(MemoryCatalog::new(sites)),
        Arc::new(MemoryProfiles::new(profiles)),
        Arc::new(ledger.clone()),
        config,
    )
    .expect("service builds");
    (service, ledger)
}

/// Catalog double that hands every site to the engine, inactive ones included.
#[derive(Default, Clone)]
pub(super) struct MemoryCatalog {
    sites: Arc<Mutex<Vec<Candidate>>>,
}

impl MemoryCatalog {
    pub(super) fn new(sites: Vec<Candidate>) -> Self {
        Self {
            sites: Arc::new(Mutex::new(sites)),
        }
    }
}

impl CandidateCatalog for MemoryCatalog {
    fn list_eligible(&self) -> Result<Vec<Candidate>, RepositoryError> {
        Ok(self.sites.lock().expect("catalog mutex poisoned").clone())
    }

    fn fetch(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.sites.lock().expect("catalog mutex poisoned");
        Ok(guard.iter().find(|site| site.id == id).cloned())
    }

    fn counts(&self) -> Result<CatalogCounts, RepositoryError> {
        let guard = self.sites.lock().expect("catalog mutex poisoned");
        Ok(CatalogCounts {
            total: guard.len(),
            active: guard.iter().filter(|site| site.is_active()).count(),
        })
    }
}

/// Catalog that lists and counts sites but cannot look a single site up.
pub(super) struct SiteLookupOutage {
    pub(super) sites: MemoryCatalog,
}

impl CandidateCatalog for SiteLookupOutage {
    fn list_eligible(&self) -> Result<Vec<Candidate>, RepositoryError> {
        self.sites.list_eligible()
    }

    fn fetch(&self, _id: CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Err(RepositoryError::Unavailable("site lookup timed out".to_string()))
    }

    fn counts(&self) -> Result<CatalogCounts, RepositoryError> {
        self.sites.counts()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryProfiles {
    profiles: Arc<Mutex<Vec<WeightProfile>>>,
}

impl MemoryProfiles {
    pub(super) fn new(profiles: Vec<WeightProfile>) -> Self {
        Self {
            profiles: Arc::new(Mutex::new(profiles)),
        }
    }
}

impl WeightProfileStore for MemoryProfiles {
    fn fetch(&self, id: WeightProfileId) -> Result<Option<WeightProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.iter().find(|profile| profile.id == id).cloned())
    }

    fn active(&self) -> Result<Vec<WeightProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.iter().filter(|profile| profile.active).cloned().collect())
    }
}

/// Batch store whose commit drops the connection halfway through writing records.
#[derive(Default, Clone)]
pub(super) struct MidWriteFailureStore {
    pub(super) ledger: BatchLedger,
}

impl BatchStore for MidWriteFailureStore {
    fn begin(&self, batch: Batch) -> Result<Batch, RepositoryError> {
        self.ledger.begin(batch)
    }

    fn persist_batch(
        &self,
        _batch_id: &BatchId,
        records: Vec<EvaluationRecord>,
    ) -> Result<Batch, RepositoryError> {
        let written = records.len() / 2;
        Err(RepositoryError::Unavailable(format!(
            "connection reset after {written} of {} records",
            records.len()
        )))
    }

    fn mark_failed(&self, batch_id: &BatchId, reason: &str) -> Result<(), RepositoryError> {
        self.ledger.mark_failed(batch_id, reason)
    }

    fn batch(&self, batch_id: &BatchId) -> Result<Option<Batch>, RepositoryError> {
        self.ledger.batch(batch_id)
    }

    fn latest_batch(&self) -> Result<Option<Batch>, RepositoryError> {
        self.ledger.latest_batch()
    }

    fn records_for_batch(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        self.ledger.records_for_batch(batch_id)
    }

    fn latest_per_candidate(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        self.ledger.latest_per_candidate()
    }

    fn history_for_candidate(
        &self,
        candidate_id: CandidateId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        self.ledger.history_for_candidate(candidate_id)
    }
}

pub(super) struct UnavailableBatchStore;

impl BatchStore for UnavailableBatchStore {
    fn begin(&self, _batch: Batch) -> Result<Batch, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn persist_batch(
        &self,
        _batch_id: &BatchId,
        _records: Vec<EvaluationRecord>,
    ) -> Result<Batch, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_failed(&self, _batch_id: &BatchId, _reason: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn batch(&self, _batch_id: &BatchId) -> Result<Option<Batch>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_batch(&self) -> Result<Option<Batch>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn records_for_batch(
        &self,
        _batch_id: &BatchId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_per_candidate(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history_for_candidate(
        &self,
        _candidate_id: CandidateId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    analysis_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
