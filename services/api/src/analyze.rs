use crate::infra::{
    demo_profiles, load_sites, InMemoryCandidateCatalog, InMemoryWeightProfileStore,
};
use clap::Args;
use retail_dss::error::AppError;
use retail_dss::ranking::{
    AnalysisReport, BatchLedger, CriteriaSchema, RankingConfig, RankingService, WeightProfileId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct AnalyzeArgs {
    /// Site CSV export to rank. Defaults to the bundled Hanoi sample.
    #[arg(long)]
    pub(crate) sites_csv: Option<PathBuf>,
    /// Weight profile to apply (1 balanced, 2 cost focused, 3 footfall focused).
    /// Defaults to the active profile.
    #[arg(long)]
    pub(crate) profile: Option<u64>,
    /// Number of ranked sites to print.
    #[arg(long)]
    pub(crate) top_n: Option<usize>,
    /// Print the full report as JSON instead of a table.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        sites_csv,
        profile,
        top_n,
        json,
    } = args;

    let schema = CriteriaSchema::retail_sites();
    let sites = load_sites(sites_csv.as_deref(), &schema)?;
    let profiles = demo_profiles(&schema);
    let service = RankingService::new(
        schema,
        Arc::new(InMemoryCandidateCatalog::new(sites)),
        Arc::new(InMemoryWeightProfileStore::new(profiles)),
        Arc::new(BatchLedger::new()),
        RankingConfig::default(),
    )?;

    let limit = service.validate_top_n(top_n)?;
    let report = service.run_analysis(profile.map(WeightProfileId))?;

    if json {
        match serde_json::to_string_pretty(&report.truncated(limit)) {
            Ok(payload) => println!("{}", payload),
            Err(err) => println!("Report payload unavailable: {}", err),
        }
        return Ok(());
    }

    render_report(&report, limit, sites_csv.is_some());
    Ok(())
}

fn render_report(report: &AnalysisReport, limit: usize, imported: bool) {
    println!("Retail site ranking ({})", report.method.to_uppercase());
    println!(
        "Strategy: {} (profile {})",
        report.strategy_name, report.weight_profile_id
    );
    if imported {
        println!("Data source: site CSV import");
    } else {
        println!("Data source: bundled Hanoi sample");
    }
    println!(
        "Batch {} committed at {}",
        report.batch_id,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Sites analyzed: {} | excluded: {} | elapsed: {} ms",
        report.sites_analyzed, report.excluded_count, report.elapsed_ms
    );
    if report.degenerate {
        println!("Warning: every site is equidistant from both reference points");
    }

    println!("\nTop {} sites", limit.min(report.ranked_results.len()));
    for view in report.ranked_results.iter().take(limit) {
        let label = view
            .site
            .as_ref()
            .map(|site| format!("{} {}", site.site_code, site.address))
            .unwrap_or_else(|| format!("site {}", view.candidate_id));
        println!(
            "  #{:<3} {:<40} closeness {:.4}",
            view.rank_position, label, view.closeness_score
        );
    }

    let stats = &report.score_statistics;
    println!(
        "\nCloseness spread: min {:.4} | max {:.4} | mean {:.4} | std dev {:.4}",
        stats.min, stats.max, stats.mean, stats.std_dev
    );

    if report.exclusions.is_empty() {
        println!("\nExcluded sites: none");
    } else {
        println!("\nExcluded sites");
        for exclusion in &report.exclusions {
            println!(
                "  - site {}: {}",
                exclusion.candidate_id,
                exclusion.reason.summary()
            );
        }
    }
}
