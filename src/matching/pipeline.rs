//! End-to-end matching: scan → index → annotate → score → rank.

use std::io::Read;
use std::ops::ControlFlow;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::patient::PatientProfile;
use crate::core::provider::ProviderRecord;
use crate::coverage::{CoverageIndex, CoverageIndexBuilder, CoverageScanner, ScanError, ScanSummary, TargetSet};
use crate::matching::engine::{ProviderRanker, RankedProviderRecord, RankingConfig};
use crate::utils::validation::{check_target_limit, is_valid_npi, ValidationError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub ranking: RankingConfig,

    /// Keep only candidates practicing under this taxonomy code.
    /// Candidates that list no taxonomy are kept.
    pub taxonomy: Option<String>,

    /// Rank against whatever was found before a malformed coverage document
    /// failed, instead of returning the error
    pub allow_partial: bool,
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub ranked: Vec<RankedProviderRecord>,

    /// Candidates considered after taxonomy filtering
    pub candidates_considered: usize,

    /// Considered candidates found in network
    pub in_network: usize,

    pub scan: ScanSummary,

    /// Set when the coverage document failed part-way and `allow_partial` was on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_error: Option<String>,
}

impl PipelineOutcome {
    pub fn is_partial(&self) -> bool {
        self.partial_error.is_some()
    }
}

pub struct MatchPipeline {
    config: PipelineConfig,
}

impl MatchPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for one patient.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Scan` if the coverage document cannot be read
    /// (or is malformed and partial results were not allowed), and
    /// `PipelineError::Validation` if there are too many candidates to scan for.
    pub fn run<R: Read>(
        &self,
        patient: &PatientProfile,
        candidates: Vec<ProviderRecord>,
        coverage: R,
    ) -> Result<PipelineOutcome, PipelineError> {
        let candidates = self.filter_taxonomy(candidates);
        let candidates_considered = candidates.len();

        let targets = target_set(&candidates)?;
        let (index, scan, partial_error) = self.build_index(targets, coverage)?;

        let annotated = index.annotate(candidates);
        let in_network = annotated.iter().filter(|c| c.is_in_network()).count();

        let ranked = ProviderRanker::with_config(self.config.ranking.clone()).rank(patient, annotated);
        info!(
            "Ranked {} of {} candidates ({} in network)",
            ranked.len(),
            candidates_considered,
            in_network
        );

        Ok(PipelineOutcome {
            ranked,
            candidates_considered,
            in_network,
            scan,
            partial_error,
        })
    }

    /// Scan `coverage` for `targets` and freeze the results into an index.
    ///
    /// # Errors
    ///
    /// Returns the scan's `ScanError`, except for `MalformedDocument` when
    /// partial results are allowed.
    pub fn build_index<R: Read>(
        &self,
        targets: TargetSet,
        coverage: R,
    ) -> Result<(CoverageIndex, ScanSummary, Option<String>), ScanError> {
        let scanner = CoverageScanner::new(targets);
        let mut builder = CoverageIndexBuilder::new(scanner.shared_targets());

        let result = scanner.scan(coverage, |event| {
            builder.record(event);
            ControlFlow::Continue(())
        });

        match result {
            Ok(summary) => Ok((builder.finish(true), summary, None)),
            Err(ScanError::MalformedDocument {
                records_processed,
                message,
                summary,
            }) if self.config.allow_partial => {
                warn!(
                    "Coverage document is malformed after {records_processed} records; \
                     ranking with partial coverage: {message}"
                );
                Ok((builder.finish(false), summary, Some(message)))
            }
            Err(e) => Err(e),
        }
    }

    fn filter_taxonomy(&self, candidates: Vec<ProviderRecord>) -> Vec<ProviderRecord> {
        match &self.config.taxonomy {
            Some(code) => {
                let before = candidates.len();
                let kept: Vec<_> = candidates
                    .into_iter()
                    .filter(|c| c.accepts_taxonomy(code))
                    .collect();
                info!(
                    "Taxonomy {code}: kept {} of {before} candidates",
                    kept.len()
                );
                kept
            }
            None => candidates,
        }
    }
}

/// Identifiers of `candidates` as a scan target set
///
/// # Errors
///
/// Returns `ValidationError::TooManyTargets` above the scan limit.
pub fn target_set(candidates: &[ProviderRecord]) -> Result<TargetSet, ValidationError> {
    for candidate in candidates {
        if !is_valid_npi(candidate.id.as_str()) {
            warn!(
                "Candidate identifier {} is not a well-formed NPI; matching it anyway",
                candidate.id
            );
        }
    }

    let targets: TargetSet = candidates.iter().map(|c| c.id.clone()).collect();
    check_target_limit(targets.len())?;
    Ok(targets)
}
