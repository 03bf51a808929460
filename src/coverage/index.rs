use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::core::provider::ProviderRecord;
use crate::core::types::{NetworkStatus, ProviderId};

use super::scanner::{MatchEvent, TargetSet};

/// What the coverage document says about one identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageEntry {
    pub in_network: bool,

    /// Distinct group keys the identifier appeared under, in first-seen order
    pub groups: Vec<String>,

    /// Number of groups the identifier appeared in
    pub match_count: usize,
}

/// Accumulates match events into a [`CoverageIndex`]
#[derive(Debug)]
pub struct CoverageIndexBuilder {
    targets: Arc<TargetSet>,
    entries: HashMap<ProviderId, CoverageEntry>,
}

impl CoverageIndexBuilder {
    pub fn new(targets: Arc<TargetSet>) -> Self {
        Self {
            targets,
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, event: MatchEvent) {
        let entry = self.entries.entry(event.id).or_default();
        // Membership only ever goes from false to true
        entry.in_network |= event.in_network;
        entry.match_count += 1;
        if let Some(key) = event.group_key {
            if !entry.groups.contains(&key) {
                entry.groups.push(key);
            }
        }
    }

    /// Freeze the index. `scan_complete` says whether the whole document was
    /// read; only then can absent targets be reported out of network.
    pub fn finish(self, scan_complete: bool) -> CoverageIndex {
        debug!(
            "Coverage index built: {} of {} targets found (complete scan: {scan_complete})",
            self.entries.len(),
            self.targets.len()
        );
        CoverageIndex {
            targets: self.targets,
            entries: self.entries,
            complete: scan_complete,
        }
    }
}

impl Extend<MatchEvent> for CoverageIndexBuilder {
    fn extend<I: IntoIterator<Item = MatchEvent>>(&mut self, events: I) {
        for event in events {
            self.record(event);
        }
    }
}

/// Network membership of the scanned targets.
///
/// Immutable once built, so lookups are safe from any number of threads.
#[derive(Debug, Clone)]
pub struct CoverageIndex {
    targets: Arc<TargetSet>,
    entries: HashMap<ProviderId, CoverageEntry>,
    complete: bool,
}

impl CoverageIndex {
    /// Build an index from the events of a scan that read the whole document
    pub fn accumulate(targets: Arc<TargetSet>, events: impl IntoIterator<Item = MatchEvent>) -> Self {
        let mut builder = CoverageIndexBuilder::new(targets);
        builder.extend(events);
        builder.finish(true)
    }

    /// True if the identifier was seen in at least one coverage group
    pub fn lookup(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| e.in_network)
    }

    /// Three-way status: a target not found by a complete scan is out of
    /// network; anything else not found is unknown.
    pub fn status(&self, id: &str) -> NetworkStatus {
        if self.lookup(id) {
            NetworkStatus::InNetwork
        } else if self.complete && self.targets.contains(id) {
            NetworkStatus::OutOfNetwork
        } else {
            NetworkStatus::Unknown
        }
    }

    pub fn entry(&self, id: &str) -> Option<&CoverageEntry> {
        self.entries.get(id)
    }

    /// Identifiers found in network, sorted
    pub fn in_network_ids(&self) -> Vec<&ProviderId> {
        let mut ids: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.in_network)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of identifiers found in network
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.in_network).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the candidates with their network status filled in from this
    /// index, in their original order.
    pub fn annotate(&self, candidates: Vec<ProviderRecord>) -> Vec<ProviderRecord> {
        candidates
            .into_iter()
            .map(|record| {
                let status = self.status(record.id.as_str());
                record.with_network(status)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Sex;

    fn targets(ids: &[&str]) -> Arc<TargetSet> {
        Arc::new(ids.iter().map(|s| ProviderId::new(s)).collect())
    }

    fn event(id: &str, key: Option<&str>) -> MatchEvent {
        MatchEvent::new(ProviderId::new(id), key.map(str::to_string))
    }

    #[test]
    fn test_lookup_and_status() {
        let index = CoverageIndex::accumulate(
            targets(&["1111111111", "9999999999"]),
            vec![event("1111111111", Some("12-3456789"))],
        );

        assert!(index.lookup("1111111111"));
        assert!(!index.lookup("9999999999"));
        assert_eq!(index.status("1111111111"), NetworkStatus::InNetwork);
        assert_eq!(index.status("9999999999"), NetworkStatus::OutOfNetwork);
        assert_eq!(index.status("5555555555"), NetworkStatus::Unknown);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_incomplete_scan_reports_unknown() {
        let mut builder = CoverageIndexBuilder::new(targets(&["1", "2"]));
        builder.record(event("1", None));
        let index = builder.finish(false);

        assert_eq!(index.status("1"), NetworkStatus::InNetwork);
        assert_eq!(index.status("2"), NetworkStatus::Unknown);
        assert!(!index.is_complete());
    }

    #[test]
    fn test_groups_are_distinct_and_ordered() {
        let index = CoverageIndex::accumulate(
            targets(&["1"]),
            vec![
                event("1", Some("b")),
                event("1", Some("a")),
                event("1", Some("b")),
                event("1", None),
            ],
        );

        let entry = index.entry("1").unwrap();
        assert_eq!(entry.groups, vec!["b", "a"]);
        assert_eq!(entry.match_count, 4);
    }

    #[test]
    fn test_accumulation_is_order_independent_for_membership() {
        let forward = CoverageIndex::accumulate(targets(&["1", "2"]), vec![event("1", None), event("2", None)]);
        let backward = CoverageIndex::accumulate(targets(&["1", "2"]), vec![event("2", None), event("1", None)]);
        assert_eq!(forward.in_network_ids(), backward.in_network_ids());
    }

    #[test]
    fn test_annotate_preserves_order_and_fields() {
        let index = CoverageIndex::accumulate(targets(&["1", "2"]), vec![event("2", None)]);
        let candidates = vec![
            ProviderRecord::new("1", Sex::Male, "10001").with_name("A"),
            ProviderRecord::new("2", Sex::Female, "10002").with_name("B"),
            ProviderRecord::new("3", Sex::Female, "10003"),
        ];

        let annotated = index.annotate(candidates);
        let statuses: Vec<_> = annotated.iter().map(|r| r.network).collect();
        assert_eq!(
            statuses,
            vec![
                NetworkStatus::OutOfNetwork,
                NetworkStatus::InNetwork,
                NetworkStatus::Unknown
            ]
        );
        assert_eq!(annotated[1].name.as_deref(), Some("B"));
        assert_eq!(annotated[2].postal_code, "10003");
    }
}
