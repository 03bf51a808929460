//! Streaming network-coverage lookup.
//!
//! Payer coverage documents list in-network providers under
//! `provider_references[].provider_groups[].npi[]`. These files routinely run
//! to gigabytes, so they are decoded incrementally and only the identifiers
//! in a [`TargetSet`] are retained.
//!
//! - [`CoverageSource`]: opens a file or stream, gunzipping when needed
//! - [`CoverageScanner`]: push-style scan with a `ControlFlow` callback
//! - [`MatchEvents`]: pull-style lazy iterator over the same scan
//! - [`CoverageIndex`]: O(1) membership queries over the scan's results
//!
//! [`TargetSet`]: scanner::TargetSet
//! [`CoverageSource`]: source::CoverageSource
//! [`CoverageScanner`]: scanner::CoverageScanner
//! [`MatchEvents`]: events::MatchEvents
//! [`CoverageIndex`]: index::CoverageIndex

pub mod events;
pub mod index;
pub mod scanner;
pub mod source;

pub use events::{MatchEvents, DEFAULT_EVENT_CAPACITY};
pub use index::{CoverageEntry, CoverageIndex, CoverageIndexBuilder};
pub use scanner::{CoverageScanner, MatchEvent, ScanError, ScanSummary, TargetSet};
pub use source::CoverageSource;
