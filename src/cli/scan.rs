use std::io;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::types::{NetworkStatus, ProviderId};
use crate::coverage::{
    CoverageIndex, CoverageIndexBuilder, CoverageScanner, CoverageSource, MatchEvent, ScanSummary,
    TargetSet, DEFAULT_EVENT_CAPACITY,
};
use crate::utils::validation::check_target_limit;

#[derive(Args)]
pub struct ScanArgs {
    /// Coverage file (JSON, optionally gzip-compressed).
    /// Use '-' for stdin
    #[arg(required = true)]
    pub coverage: PathBuf,

    /// Provider identifier to look for (repeatable)
    #[arg(long = "npi", value_name = "ID")]
    pub npis: Vec<String>,

    /// File with one identifier per line ('#' starts a comment)
    #[arg(long)]
    pub npi_file: Option<PathBuf>,

    /// Stop after this many matches
    #[arg(long)]
    pub max_matches: Option<usize>,
}

/// Execute scan subcommand
///
/// # Errors
///
/// Returns an error if no identifiers are given, the coverage file cannot be
/// opened, or it is malformed.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ScanArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let targets = read_targets(&args)?;
    if targets.is_empty() {
        anyhow::bail!("No provider identifiers given; use --npi or --npi-file");
    }
    check_target_limit(targets.len())?;

    if verbose {
        eprintln!("Scanning for {} provider identifiers", targets.len());
    }

    let source = if args.coverage.to_string_lossy() == "-" {
        CoverageSource::from_reader(io::stdin())?
    } else {
        CoverageSource::open(&args.coverage)?
    };

    let scanner = CoverageScanner::new(targets);

    // Matches are printed as they are found, before the scan finishes
    let mut events = scanner.events(source, DEFAULT_EVENT_CAPACITY);
    let limit = args.max_matches.unwrap_or(usize::MAX);
    let mut builder = CoverageIndexBuilder::new(scanner.shared_targets());
    let mut found = Vec::new();

    if matches!(format, OutputFormat::Tsv) {
        println!("npi\tin_network\tgroup");
    }

    for event in events.by_ref().take(limit) {
        match format {
            OutputFormat::Text => print_text_event(&event),
            OutputFormat::Tsv => print_tsv_event(&event),
            OutputFormat::Json => {}
        }
        found.push(event.clone());
        builder.record(event);
    }

    let summary = events.finish()?;
    let index = builder.finish(!summary.cancelled);

    match format {
        OutputFormat::Text => print_text_summary(&index, &summary),
        OutputFormat::Json => print_json_results(&found, &index, &summary)?,
        OutputFormat::Tsv => {}
    }

    Ok(())
}

fn read_targets(args: &ScanArgs) -> anyhow::Result<TargetSet> {
    let mut ids: Vec<ProviderId> = args.npis.iter().map(ProviderId::new).collect();
    if let Some(path) = &args.npi_file {
        ids.extend(read_id_file(path)?);
    }
    Ok(TargetSet::new(ids))
}

fn read_id_file(path: &Path) -> anyhow::Result<Vec<ProviderId>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ProviderId::new)
        .collect())
}

fn print_text_event(event: &MatchEvent) {
    match &event.group_key {
        Some(key) => println!("{}  in network (group {key})", event.id),
        None => println!("{}  in network", event.id),
    }
}

fn print_tsv_event(event: &MatchEvent) {
    println!(
        "{}\t{}\t{}",
        event.id,
        event.in_network,
        event.group_key.as_deref().unwrap_or("")
    );
}

fn not_found(index: &CoverageIndex) -> Vec<&ProviderId> {
    let mut ids: Vec<_> = index
        .targets()
        .iter()
        .filter(|id| index.status(id.as_str()) != NetworkStatus::InNetwork)
        .collect();
    ids.sort();
    ids
}

fn print_text_summary(index: &CoverageIndex, summary: &ScanSummary) {
    println!(
        "\nScanned {} records ({} skipped), {} groups, {} identifiers",
        summary.records_processed,
        summary.records_skipped,
        summary.groups_seen,
        summary.identifiers_seen
    );
    println!(
        "{} of {} providers in network",
        index.len(),
        index.targets().len()
    );

    let missing = not_found(index);
    if !missing.is_empty() {
        let label = if index.is_complete() {
            "Not in network"
        } else {
            "Not seen (scan stopped early)"
        };
        let ids: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!("{label}: {}", ids.join(", "));
    }
}

fn print_json_results(
    found: &[MatchEvent],
    index: &CoverageIndex,
    summary: &ScanSummary,
) -> anyhow::Result<()> {
    let mut targets: Vec<&ProviderId> = index.targets().iter().collect();
    targets.sort();

    let providers: Vec<serde_json::Value> = targets
        .into_iter()
        .map(|id| {
            let entry = index.entry(id.as_str());
            serde_json::json!({
                "npi": id,
                "network_status": index.status(id.as_str()),
                "groups": entry.map(|e| e.groups.clone()).unwrap_or_default(),
                "match_count": entry.map_or(0, |e| e.match_count),
            })
        })
        .collect();

    let output = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "summary": summary,
        "matches": found,
        "providers": providers,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
