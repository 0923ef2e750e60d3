use std::sync::Arc;

use retail_dss::ranking::{
    BatchLedger, BatchStore, Candidate, CandidateCatalog, CandidateId, CatalogCounts,
    CriteriaSchema, ExclusionReason, RankingConfig, RankingError, RankingService,
    RepositoryError, ResultSource, StatisticsScope, WeightProfile, WeightProfileId,
    WeightProfileStore,
};
use retail_dss::sites::SiteCsvImporter;

struct FixtureCatalog {
    sites: Vec<Candidate>,
}

impl CandidateCatalog for FixtureCatalog {
    fn list_eligible(&self) -> Result<Vec<Candidate>, RepositoryError> {
        Ok(self
            .sites
            .iter()
            .filter(|site| site.is_active())
            .cloned()
            .collect())
    }

    fn fetch(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Ok(self.sites.iter().find(|site| site.id == id).cloned())
    }

    fn counts(&self) -> Result<CatalogCounts, RepositoryError> {
        Ok(CatalogCounts {
            total: self.sites.len(),
            active: self.sites.iter().filter(|site| site.is_active()).count(),
        })
    }
}

struct FixtureProfiles {
    profiles: Vec<WeightProfile>,
}

impl WeightProfileStore for FixtureProfiles {
    fn fetch(&self, id: WeightProfileId) -> Result<Option<WeightProfile>, RepositoryError> {
        Ok(self.profiles.iter().find(|profile| profile.id == id).cloned())
    }

    fn active(&self) -> Result<Vec<WeightProfile>, RepositoryError> {
        Ok(self
            .profiles
            .iter()
            .filter(|profile| profile.active)
            .cloned()
            .collect())
    }
}

fn fixture_service() -> (
    RankingService<FixtureCatalog, FixtureProfiles, BatchLedger>,
    BatchLedger,
) {
    let schema = CriteriaSchema::retail_sites();
    let data = include_bytes!("../fixtures/hanoi_sites.csv");
    let sites = SiteCsvImporter::from_reader(&data[..], &schema).expect("fixture imports");

    let mut balanced = schema.default_profile(WeightProfileId(1), "Balanced");
    balanced.active = true;
    let mut traffic_first = schema.default_profile(WeightProfileId(2), "Traffic first");
    for (criterion, weight) in traffic_first.weights.iter_mut() {
        *weight = if criterion.as_str() == "traffic_score" { 5.0 } else { 0.5 };
    }

    let ledger = BatchLedger::new();
    let service = RankingService::new(
        schema,
        Arc::new(FixtureCatalog { sites }),
        Arc::new(FixtureProfiles {
            profiles: vec![balanced, traffic_first],
        }),
        Arc::new(ledger.clone()),
        RankingConfig::default(),
    )
    .expect("service builds");
    (service, ledger)
}

#[test]
fn fixture_catalog_ranks_every_eligible_site() {
    let (service, ledger) = fixture_service();

    let report = service.run_analysis(None).expect("analysis succeeds");

    assert_eq!(report.sites_analyzed, 10);
    assert_eq!(report.excluded_count, 1);
    assert!(matches!(
        &report.exclusions[0].reason,
        ExclusionReason::MissingValue { criterion } if criterion.as_str() == "traffic_score"
    ));
    assert_eq!(report.ideal_solution.len(), 8);

    let positions: Vec<u32> = report
        .ranked_results
        .iter()
        .map(|view| view.rank_position)
        .collect();
    assert_eq!(positions, (1..=10).collect::<Vec<u32>>());
    assert!(report
        .ranked_results
        .windows(2)
        .all(|pair| pair[0].closeness_score >= pair[1].closeness_score - 1e-9));
    assert!(report
        .ranked_results
        .iter()
        .all(|view| (0.0..=1.0).contains(&view.closeness_score)));

    let stored = ledger
        .records_for_batch(&report.batch_id)
        .expect("ledger readable");
    assert_eq!(stored.len(), 10);
}

#[test]
fn rerunning_with_same_inputs_reproduces_the_ranking() {
    let (service, _) = fixture_service();

    let first = service.run_analysis(None).expect("first run");
    let second = service.run_analysis(None).expect("second run");

    assert_ne!(first.batch_id, second.batch_id);
    let order = |report: &retail_dss::ranking::AnalysisReport| {
        report
            .ranked_results
            .iter()
            .map(|view| (view.candidate_id, view.closeness_score))
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&first), order(&second));

    let history = service
        .history(first.ranked_results[0].candidate_id)
        .expect("history readable");
    assert_eq!(history.len(), 2);
}

#[test]
fn alternate_profile_changes_the_leader_without_touching_old_batches() {
    let (service, _) = fixture_service();

    let balanced = service.run_analysis(None).expect("balanced run");
    let traffic = service
        .run_analysis(Some(WeightProfileId(2)))
        .expect("traffic run");

    assert_eq!(balanced.ranked_results[0].candidate_id, CandidateId(9));
    assert_eq!(traffic.strategy_name, "Traffic first");
    assert_eq!(traffic.ranked_results[0].candidate_id, CandidateId(1));

    let old = service
        .batch_results(&balanced.batch_id)
        .expect("balanced batch readable");
    let old_order: Vec<_> = old.records.iter().map(|record| record.candidate_id).collect();
    let reported: Vec<_> = balanced
        .ranked_results
        .iter()
        .map(|view| view.candidate_id)
        .collect();
    assert_eq!(old_order, reported);

    let top = service
        .top_n(Some(3), ResultSource::LatestBatch)
        .expect("top three");
    assert_eq!(top.len(), 3);
    assert!(top.iter().all(|view| view.batch_id == traffic.batch_id));
}

#[test]
fn statistics_report_catalog_counts_and_rent_average() {
    let (service, _) = fixture_service();
    service.run_analysis(None).expect("analysis succeeds");

    let stats = service
        .statistics(StatisticsScope::LatestBatch)
        .expect("statistics");

    assert_eq!(stats.total_sites, 12);
    assert_eq!(stats.active_sites, 11);
    assert_eq!(stats.analyzed_sites, 10);
    let expected_rent =
        (95.0 + 110.0 + 62.0 + 48.0 + 55.0 + 58.0 + 45.0 + 50.0 + 38.0 + 60.0) / 10.0;
    assert!((stats.average_criterion - expected_rent).abs() < 1e-9);
}

#[test]
fn missing_batch_is_not_found() {
    let (service, _) = fixture_service();

    match service.batch_results(&retail_dss::ranking::BatchId("batch-nope".to_string())) {
        Err(RankingError::BatchNotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}
