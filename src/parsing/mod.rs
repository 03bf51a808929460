//! Parsers for candidate provider lists.
//!
//! This module provides parsers for:
//!
//! - **JSON arrays**: Flat provider records (`npi`, `gender`, `zip`, ...)
//! - **NPPES registry responses**: `{"results": [...]}` as returned by the
//!   registry API, including nested `basic`, `addresses` and `taxonomies`
//! - **TSV/CSV files**: One provider per line, optionally with a header row
//!
//! ## Example
//!
//! ```rust,no_run
//! use provider_match::parsing::candidates::parse_candidates_file;
//! use std::path::Path;
//!
//! let candidates = parse_candidates_file(Path::new("candidates.json")).unwrap();
//! println!("{} candidates", candidates.len());
//! ```
//!
//! ## Recognized Fields
//!
//! | Field       | Accepted names |
//! |-------------|----------------|
//! | Identifier  | `npi`, `number`, `identifier`, `id` |
//! | Sex         | `gender`, `sex`, `provider_gender_code` |
//! | Postal code | `postal_code`, `zip`, `postal` |
//! | Taxonomy    | `taxonomies`, `taxonomy_code`, `taxonomy` |
//!
//! Any other field is carried through to the ranked output unchanged.

pub mod candidates;
pub mod tsv;

pub use candidates::{parse_candidates_file, parse_candidates_text, CandidateFormat, ParseError};
