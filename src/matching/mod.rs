//! Provider affinity scoring and ranking.
//!
//! This module provides the core matching functionality:
//!
//! - [`AffinityScore`]: Per-provider score with its components
//! - [`ProviderRanker`]: Scores, filters and orders annotated candidates
//! - [`MatchPipeline`]: Coverage scan through to ranked output
//!
//! ## Scoring
//!
//! Network membership is a hard gate: a provider that is not in network scores
//! exactly 0.0 and is never ranked. For in-network providers the score is a
//! weighted sum:
//!
//! - **Gender** (20%): 1.0 when patient and provider sex agree
//! - **Distance** (30%): `1 / distance`, where distance is 1 for the same
//!   postal code, 10 for a shared 3-character prefix and 100 otherwise
//! - **Network** (50%): always 1.0 once past the gate
//!
//! Scores are rounded half away from zero to 4 decimal places.
//!
//! ## Example
//!
//! ```rust
//! use provider_match::core::patient::PatientProfile;
//! use provider_match::core::provider::ProviderRecord;
//! use provider_match::core::types::{NetworkStatus, Sex};
//! use provider_match::matching::ProviderRanker;
//!
//! let patient = PatientProfile::new(Sex::Female, "10001");
//! let candidates = vec![
//!     ProviderRecord::new("1234567893", Sex::Female, "10001").with_network(NetworkStatus::InNetwork),
//!     ProviderRecord::new("1245319599", Sex::Male, "10001").with_network(NetworkStatus::OutOfNetwork),
//! ];
//!
//! let ranked = ProviderRanker::new().rank(&patient, candidates);
//! assert_eq!(ranked.len(), 1);
//! assert_eq!(ranked[0].affinity_score, 1.0);
//! ```

pub mod engine;
pub mod pipeline;
pub mod scoring;

pub use engine::{ProviderRanker, RankedProviderRecord, RankingConfig};
pub use pipeline::{MatchPipeline, PipelineConfig, PipelineError, PipelineOutcome};
pub use scoring::{AffinityScore, AffinityWeights};
