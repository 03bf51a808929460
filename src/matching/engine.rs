use serde::Serialize;

use crate::core::patient::PatientProfile;
use crate::core::provider::ProviderRecord;
use crate::matching::scoring::{AffinityScore, AffinityWeights};

/// A provider that survived ranking
#[derive(Debug, Clone, Serialize)]
pub struct RankedProviderRecord {
    /// 1-based position in the ranking
    pub rank: usize,

    /// Affinity score, 4 decimal places
    pub affinity_score: f64,

    /// Score details
    pub breakdown: AffinityScore,

    /// The annotated provider, with all original fields
    #[serde(flatten)]
    pub provider: ProviderRecord,
}

/// Configuration for the ranker
#[derive(Debug, Clone, Default)]
pub struct RankingConfig {
    /// Custom affinity weights
    pub weights: AffinityWeights,
    /// Keep at most this many ranked providers
    pub max_results: Option<usize>,
}

/// Scores and orders annotated candidates for one patient
#[derive(Debug, Clone, Default)]
pub struct ProviderRanker {
    config: RankingConfig,
}

impl ProviderRanker {
    /// Create a ranker with the default weights and no result limit
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank `candidates` for `patient`.
    ///
    /// Candidates scoring exactly 0.0 (everything outside the network) are
    /// dropped. The rest are ordered by score, highest first; equal scores
    /// keep their input order.
    pub fn rank(
        &self,
        patient: &PatientProfile,
        candidates: Vec<ProviderRecord>,
    ) -> Vec<RankedProviderRecord> {
        let mut scored: Vec<(AffinityScore, ProviderRecord)> = candidates
            .into_iter()
            .map(|provider| {
                let score =
                    AffinityScore::calculate_with_weights(patient, &provider, &self.config.weights);
                (score, provider)
            })
            .filter(|(score, _)| score.composite > 0.0)
            .collect();

        // `sort_by` is stable, which keeps ties in input order
        scored.sort_by(|a, b| b.0.composite.total_cmp(&a.0.composite));

        let limit = self.config.max_results.unwrap_or(usize::MAX);
        scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (breakdown, provider))| RankedProviderRecord {
                rank: i + 1,
                affinity_score: breakdown.composite,
                breakdown,
                provider,
            })
            .collect()
    }
}
