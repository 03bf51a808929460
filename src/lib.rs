//! # provider-match
//!
//! A library for ranking in-network healthcare providers for a patient.
//!
//! Payers publish which providers their plans cover as very large JSON
//! documents (often several gigabytes, usually gzip-compressed). Loading one
//! into memory just to check a handful of candidates is not practical.
//!
//! `provider-match` streams the coverage document once, records which of the
//! candidate identifiers it covers, and ranks the covered candidates for a
//! patient.
//!
//! ## Features
//!
//! - **Streaming scan**: Constant memory regardless of document size
//! - **Malformed record recovery**: Bad records and groups are skipped and counted
//! - **Early exit**: Consumers can stop a scan once they have what they need
//! - **Affinity ranking**: Sex agreement, postal-code proximity and network membership
//! - **Candidate formats**: Flat JSON, NPPES registry responses, TSV and CSV
//!
//! ## Example
//!
//! ```rust,no_run
//! use provider_match::{MatchPipeline, PatientProfile, Sex};
//! use provider_match::coverage::CoverageSource;
//! use provider_match::matching::PipelineConfig;
//! use provider_match::parsing::parse_candidates_file;
//! use std::path::Path;
//!
//! let candidates = parse_candidates_file(Path::new("candidates.json")).unwrap();
//! let patient = PatientProfile::new(Sex::Female, "10001");
//! let coverage = CoverageSource::open(Path::new("in-network-rates.json.gz")).unwrap();
//!
//! let outcome = MatchPipeline::new(PipelineConfig::default())
//!     .run(&patient, candidates, coverage)
//!     .unwrap();
//!
//! for ranked in outcome.ranked {
//!     println!("#{} {} ({:.4})", ranked.rank, ranked.provider.id, ranked.affinity_score);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coverage`]: Streaming coverage scanner and the index built from it
//! - [`core`]: Provider, patient and identifier types
//! - [`matching`]: Affinity scoring, ranking and the end-to-end pipeline
//! - [`parsing`]: Parsers for candidate provider lists
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: JSON ranking API

pub mod cli;
pub mod core;
pub mod coverage;
pub mod matching;
pub mod parsing;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use core::patient::PatientProfile;
pub use core::provider::ProviderRecord;
pub use core::types::*;
pub use coverage::{CoverageIndex, CoverageScanner, MatchEvent, ScanError, TargetSet};
pub use matching::engine::{ProviderRanker, RankedProviderRecord};
pub use matching::pipeline::MatchPipeline;
