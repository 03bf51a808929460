//! Core data types for provider matching.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`ProviderId`]: A national provider identifier in canonical string form
//! - [`Sex`]: Categorical sex code shared by patients and providers
//! - [`NetworkStatus`]: Explicit in-network / out-of-network / unknown status
//! - [`PatientProfile`]: The patient being matched
//! - [`ProviderRecord`]: A candidate provider from the directory lookup
//!
//! ## Identifier Normalization
//!
//! Coverage files list identifiers as JSON numbers or strings, and directory
//! responses do the same. Both are reduced to one canonical string:
//!
//! | Raw value        | Canonical     |
//! |------------------|---------------|
//! | `1234567893`     | `1234567893`  |
//! | `"1234567893 "`  | `1234567893`  |
//! | `1234567893.0`   | `1234567893`  |
//!
//! [`ProviderId`]: types::ProviderId
//! [`Sex`]: types::Sex
//! [`NetworkStatus`]: types::NetworkStatus
//! [`PatientProfile`]: patient::PatientProfile
//! [`ProviderRecord`]: provider::ProviderRecord

pub mod patient;
pub mod provider;
pub mod taxonomy;
pub mod types;
