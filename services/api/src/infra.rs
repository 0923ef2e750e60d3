use metrics_exporter_prometheus::PrometheusHandle;
use retail_dss::error::AppError;
use retail_dss::ranking::{
    Candidate, CandidateCatalog, CandidateId, CatalogCounts, CriteriaSchema, CriterionId,
    RepositoryError, WeightProfile, WeightProfileId, WeightProfileStore,
};
use retail_dss::sites::SiteCsvImporter;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

const DEMO_SITES_CSV: &str = include_str!("../../../crates/retail-dss/fixtures/hanoi_sites.csv");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn poisoned(store: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{store} lock poisoned"))
}

/// Site catalog held in memory; stands in for the CRUD layer's database.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCandidateCatalog {
    sites: Arc<RwLock<Vec<Candidate>>>,
}

impl InMemoryCandidateCatalog {
    pub(crate) fn new(sites: Vec<Candidate>) -> Self {
        Self {
            sites: Arc::new(RwLock::new(sites)),
        }
    }
}

impl CandidateCatalog for InMemoryCandidateCatalog {
    fn list_eligible(&self) -> Result<Vec<Candidate>, RepositoryError> {
        let guard = self.sites.read().map_err(|_| poisoned("catalog"))?;
        Ok(guard.iter().filter(|site| site.is_active()).cloned().collect())
    }

    fn fetch(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.sites.read().map_err(|_| poisoned("catalog"))?;
        Ok(guard.iter().find(|site| site.id == id).cloned())
    }

    fn counts(&self) -> Result<CatalogCounts, RepositoryError> {
        let guard = self.sites.read().map_err(|_| poisoned("catalog"))?;
        Ok(CatalogCounts {
            total: guard.len(),
            active: guard.iter().filter(|site| site.is_active()).count(),
        })
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryWeightProfileStore {
    profiles: Arc<RwLock<Vec<WeightProfile>>>,
}

impl InMemoryWeightProfileStore {
    pub(crate) fn new(profiles: Vec<WeightProfile>) -> Self {
        Self {
            profiles: Arc::new(RwLock::new(profiles)),
        }
    }
}

impl WeightProfileStore for InMemoryWeightProfileStore {
    fn fetch(&self, id: WeightProfileId) -> Result<Option<WeightProfile>, RepositoryError> {
        let guard = self.profiles.read().map_err(|_| poisoned("profile store"))?;
        Ok(guard.iter().find(|profile| profile.id == id).cloned())
    }

    fn active(&self) -> Result<Vec<WeightProfile>, RepositoryError> {
        let guard = self.profiles.read().map_err(|_| poisoned("profile store"))?;
        Ok(guard
            .iter()
            .filter(|profile| profile.active)
            .cloned()
            .collect())
    }
}

/// Sites from the given CSV export, or the bundled Hanoi sample when no path is given.
pub(crate) fn load_sites(
    path: Option<&Path>,
    schema: &CriteriaSchema,
) -> Result<Vec<Candidate>, AppError> {
    let sites = match path {
        Some(path) => SiteCsvImporter::from_path(path, schema)?,
        None => SiteCsvImporter::from_reader(DEMO_SITES_CSV.as_bytes(), schema)?,
    };
    Ok(sites)
}

/// Expert strategies offered out of the box. Only the balanced profile starts active.
pub(crate) fn demo_profiles(schema: &CriteriaSchema) -> Vec<WeightProfile> {
    let mut balanced = schema.default_profile(WeightProfileId(1), "Balanced");
    balanced.description = Some("Default weights for every criterion".to_string());
    balanced.active = true;

    let cost_focused = reweighted(
        schema,
        WeightProfileId(2),
        "Cost focused",
        &[("rent_cost", 0.35), ("renovation_cost", 0.20)],
    );
    let footfall_focused = reweighted(
        schema,
        WeightProfileId(3),
        "Footfall focused",
        &[("traffic_score", 0.35), ("population_density", 0.20)],
    );

    vec![balanced, cost_focused, footfall_focused]
}

fn reweighted(
    schema: &CriteriaSchema,
    id: WeightProfileId,
    name: &str,
    overrides: &[(&str, f64)],
) -> WeightProfile {
    let mut profile = schema.default_profile(id, name);
    for (criterion, weight) in overrides {
        profile.weights.insert(CriterionId::new(*criterion), *weight);
    }
    profile
}
