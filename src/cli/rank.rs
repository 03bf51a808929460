use std::io::{self, Read};
use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::patient::PatientProfile;
use crate::core::provider::ProviderRecord;
use crate::core::taxonomy::taxonomy_for_diagnosis;
use crate::core::types::Sex;
use crate::coverage::CoverageSource;
use crate::matching::pipeline::{MatchPipeline, PipelineConfig, PipelineOutcome};
use crate::matching::scoring::AffinityWeights;
use crate::matching::RankingConfig;
use crate::parsing::{self, CandidateFormat};

#[derive(Args)]
pub struct RankArgs {
    /// Coverage file (JSON, optionally gzip-compressed)
    #[arg(long)]
    pub coverage: PathBuf,

    /// Candidate providers (JSON array, NPPES response, TSV or CSV).
    /// Use '-' for JSON on stdin
    #[arg(long)]
    pub candidates: PathBuf,

    /// Patient sex (M or F; anything else never matches)
    #[arg(long)]
    pub sex: String,

    /// Patient postal code
    #[arg(long, alias = "zip")]
    pub postal_code: String,

    /// Diagnosis label; selects the provider taxonomy to keep
    #[arg(long, conflicts_with = "taxonomy")]
    pub diagnosis: Option<String>,

    /// Keep only providers with this taxonomy code
    #[arg(long)]
    pub taxonomy: Option<String>,

    /// Number of providers to show
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Rank against partial coverage if the coverage file is malformed
    #[arg(long)]
    pub allow_partial: bool,

    // === Scoring weight options ===
    /// Weight for sex agreement (0-100, default 20)
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub weight_gender: u32,

    /// Weight for postal-code proximity (0-100, default 30)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub weight_distance: u32,

    /// Weight for network membership (0-100, default 50)
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub weight_network: u32,
}

/// Execute rank subcommand
///
/// # Errors
///
/// Returns an error if the candidates cannot be parsed or the coverage file
/// cannot be read.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: RankArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let candidates = read_candidates(&args)?;
    let patient = PatientProfile::new(Sex::parse(&args.sex), &args.postal_code);

    let taxonomy = match (&args.taxonomy, &args.diagnosis) {
        (Some(code), _) => Some(code.clone()),
        (None, Some(label)) => Some(taxonomy_for_diagnosis(label).to_string()),
        (None, None) => None,
    };

    let weights =
        AffinityWeights::from_percentages(args.weight_gender, args.weight_distance, args.weight_network);

    if verbose {
        eprintln!("Loaded {} candidate providers", candidates.len());
        if let Some(code) = &taxonomy {
            eprintln!("Filtering to taxonomy {code}");
        }
        eprintln!(
            "Scoring weights: {:.0}% gender, {:.0}% distance, {:.0}% network",
            weights.gender * 100.0,
            weights.distance * 100.0,
            weights.network * 100.0,
        );
    }

    let config = PipelineConfig {
        ranking: RankingConfig {
            weights,
            max_results: args.max_results,
        },
        taxonomy,
        allow_partial: args.allow_partial,
    };

    let source = CoverageSource::open(&args.coverage)?;
    let outcome = MatchPipeline::new(config).run(&patient, candidates, source)?;

    if let Some(err) = &outcome.partial_error {
        eprintln!(
            "Warning: coverage file is malformed after {} records; providers not seen are unknown ({err})",
            outcome.scan.records_processed
        );
    }

    if outcome.ranked.is_empty() {
        eprintln!("No in-network providers found.");
        if !matches!(format, OutputFormat::Json) {
            return Ok(());
        }
    }

    match format {
        OutputFormat::Text => print_text_results(&outcome, &weights),
        OutputFormat::Json => print_json_results(&outcome, &patient, &weights)?,
        OutputFormat::Tsv => print_tsv_results(&outcome),
    }

    Ok(())
}

fn read_candidates(args: &RankArgs) -> anyhow::Result<Vec<ProviderRecord>> {
    if args.candidates.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(parsing::parse_candidates_text(&buffer, CandidateFormat::Json)?);
    }

    Ok(parsing::parse_candidates_file(&args.candidates)?)
}

fn print_text_results(outcome: &PipelineOutcome, weights: &AffinityWeights) {
    for (i, ranked) in outcome.ranked.iter().enumerate() {
        if i > 0 {
            println!("\n{}", "─".repeat(60));
        }

        let provider = &ranked.provider;
        println!("\n#{} {}", ranked.rank, provider.display_name());
        println!("   NPI: {}", provider.id);
        println!("   Gender: {}", provider.sex);
        if !provider.postal_code.is_empty() {
            println!("   Postal code: {}", provider.postal_code);
        }
        if !provider.taxonomies.is_empty() {
            println!("   Taxonomy: {}", provider.taxonomies.join(", "));
        }

        let b = &ranked.breakdown;
        println!(
            "\n   Score: {:.1}% = {:.0}%×gender + {:.0}%×distance(1/{}) + network",
            ranked.affinity_score * 100.0,
            b.gender_term * 100.0,
            b.distance_term * 100.0,
            b.distance,
        );
        println!(
            "          (weights: {:.0}% gender, {:.0}% distance, {:.0}% network)",
            weights.gender * 100.0,
            weights.distance * 100.0,
            weights.network * 100.0,
        );
    }

    println!(
        "\n{} ranked of {} candidates ({} in network)",
        outcome.ranked.len(),
        outcome.candidates_considered,
        outcome.in_network
    );
}

fn print_json_results(
    outcome: &PipelineOutcome,
    patient: &PatientProfile,
    weights: &AffinityWeights,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "patient": patient,
        "weights": weights,
        "candidates_considered": outcome.candidates_considered,
        "in_network": outcome.in_network,
        "scan": outcome.scan,
        "partial_error": outcome.partial_error,
        "results": outcome.ranked,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_results(outcome: &PipelineOutcome) {
    println!("rank\tnpi\tname\tgender\tpostal_code\tscore\tgender_term\tdistance\tnetwork_status");
    for ranked in &outcome.ranked {
        let provider = &ranked.provider;
        println!(
            "{}\t{}\t{}\t{}\t{}\t{:.4}\t{:.1}\t{}\t{}",
            ranked.rank,
            provider.id,
            provider.name.as_deref().unwrap_or(""),
            provider.sex,
            provider.postal_code,
            ranked.affinity_score,
            ranked.breakdown.gender_term,
            ranked.breakdown.distance,
            provider.network,
        );
    }
}
