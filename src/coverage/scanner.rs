use std::collections::HashSet;
use std::fmt;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::types::ProviderId;

use super::events::MatchEvents;

/// Marker message used to unwind the decoder when the consumer stops early
const CANCELLED: &str = "coverage scan cancelled";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Coverage source not found or unreadable: {}: {source}", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed coverage document after {records_processed} records: {message}")]
    MalformedDocument {
        records_processed: usize,
        message: String,
        /// Counters up to the point of failure
        summary: ScanSummary,
    },
}

/// Identifiers a scan is looking for.
///
/// Backed by a hash set so membership is O(1) on average no matter how many
/// targets there are.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    ids: HashSet<ProviderId>,
}

impl TargetSet {
    pub fn new(ids: impl IntoIterator<Item = ProviderId>) -> Self {
        Self {
            ids: ids.into_iter().filter(|id| !id.is_empty()).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderId> {
        self.ids.iter()
    }
}

impl FromIterator<ProviderId> for TargetSet {
    fn from_iter<I: IntoIterator<Item = ProviderId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// A target identifier found inside one coverage group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: ProviderId,

    /// Always true for events produced by a scan
    pub in_network: bool,

    /// Tax identification number of the group (`tin.value`), if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
}

impl MatchEvent {
    pub fn new(id: ProviderId, group_key: Option<String>) -> Self {
        Self {
            id,
            in_network: true,
            group_key,
        }
    }
}

/// Counters describing one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Top-level records decoded successfully
    pub records_processed: usize,
    /// Top-level records skipped because their shape was wrong
    pub records_skipped: usize,
    /// Coverage groups examined
    pub groups_seen: usize,
    /// Groups skipped because their shape was wrong
    pub groups_skipped: usize,
    /// Identifier values examined
    pub identifiers_seen: usize,
    /// Identifier values that were neither strings nor numbers
    pub identifiers_skipped: usize,
    /// Match events emitted
    pub matches: usize,
    /// The consumer stopped the scan before the end of the document
    pub cancelled: bool,
}

/// Streams a coverage document and reports every target identifier it finds.
///
/// The document is never held in memory: the `provider_references` array is
/// decoded one record at a time and each record's `provider_groups` one group
/// at a time. Everything outside `npi` and `tin.value` is skipped unparsed.
#[derive(Debug, Clone)]
pub struct CoverageScanner {
    targets: Arc<TargetSet>,
}

impl CoverageScanner {
    pub fn new(targets: TargetSet) -> Self {
        Self {
            targets: Arc::new(targets),
        }
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    /// Shared handle to the target set, e.g. for building a coverage index
    pub fn shared_targets(&self) -> Arc<TargetSet> {
        Arc::clone(&self.targets)
    }

    /// Scan `reader`, calling `on_match` for every match as soon as the group
    /// containing it has been read. Returning `ControlFlow::Break` from the
    /// callback stops the scan; the summary then has `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedDocument` if the document is not a
    /// coverage document or cannot be decoded past some point.
    pub fn scan<R, F>(&self, reader: R, mut on_match: F) -> Result<ScanSummary, ScanError>
    where
        R: Read,
        F: FnMut(MatchEvent) -> ControlFlow<()>,
    {
        self.scan_inner(reader, None, &mut on_match)
    }

    /// Like [`CoverageScanner::scan`], but also stops at the next group
    /// boundary once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedDocument` as for [`CoverageScanner::scan`].
    pub fn scan_cancellable<R, F>(
        &self,
        reader: R,
        cancel: &AtomicBool,
        mut on_match: F,
    ) -> Result<ScanSummary, ScanError>
    where
        R: Read,
        F: FnMut(MatchEvent) -> ControlFlow<()>,
    {
        self.scan_inner(reader, Some(cancel), &mut on_match)
    }

    /// Start a scan on a worker thread and return its matches as a lazy
    /// iterator. At most `capacity` events are buffered ahead of the consumer.
    pub fn events<R>(&self, reader: R, capacity: usize) -> MatchEvents
    where
        R: Read + Send + 'static,
    {
        MatchEvents::spawn(self.clone(), reader, capacity)
    }

    /// Collect every match of a complete scan
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedDocument` as for [`CoverageScanner::scan`].
    pub fn collect<R: Read>(&self, reader: R) -> Result<(Vec<MatchEvent>, ScanSummary), ScanError> {
        let mut events = Vec::new();
        let summary = self.scan(reader, |event| {
            events.push(event);
            ControlFlow::Continue(())
        })?;
        Ok((events, summary))
    }

    fn scan_inner<R: Read>(
        &self,
        reader: R,
        cancel: Option<&AtomicBool>,
        on_match: &mut dyn FnMut(MatchEvent) -> ControlFlow<()>,
    ) -> Result<ScanSummary, ScanError> {
        let mut ctx = ScanContext {
            targets: &self.targets,
            on_match,
            cancel,
            summary: ScanSummary::default(),
            stopped: false,
        };

        let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
        let result = DocumentSeed { ctx: &mut ctx }
            .deserialize(&mut de)
            .and_then(|()| de.end());

        let mut summary = ctx.summary;
        match result {
            Ok(()) => {
                info!(
                    "Coverage scan complete: {} records, {} groups, {} identifiers, {} matches",
                    summary.records_processed,
                    summary.groups_seen,
                    summary.identifiers_seen,
                    summary.matches
                );
                Ok(summary)
            }
            Err(_) if ctx.stopped => {
                summary.cancelled = true;
                info!(
                    "Coverage scan stopped by consumer after {} records ({} matches)",
                    summary.records_processed, summary.matches
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(
                    "Coverage scan failed after {} records: {e}",
                    summary.records_processed
                );
                Err(ScanError::MalformedDocument {
                    records_processed: summary.records_processed,
                    message: e.to_string(),
                    summary,
                })
            }
        }
    }
}

/// Mutable state threaded through the decoder visitors
struct ScanContext<'a> {
    targets: &'a TargetSet,
    on_match: &'a mut dyn FnMut(MatchEvent) -> ControlFlow<()>,
    cancel: Option<&'a AtomicBool>,
    summary: ScanSummary,
    stopped: bool,
}

impl ScanContext<'_> {
    fn should_stop(&mut self) -> bool {
        if !self.stopped && self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            self.stopped = true;
        }
        self.stopped
    }

    fn emit_group(&mut self, hits: GroupHits, group_key: Option<String>) {
        for id in hits.order {
            if self.stopped {
                return;
            }
            self.summary.matches += 1;
            let event = MatchEvent::new(id, group_key.clone());
            if (self.on_match)(event).is_break() {
                self.stopped = true;
            }
        }
    }
}

/// Distinct targets of one group, in first-seen order
#[derive(Default)]
struct GroupHits {
    order: Vec<ProviderId>,
    seen: HashSet<ProviderId>,
}

impl GroupHits {
    fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn insert(&mut self, id: ProviderId) {
        if self.seen.insert(id.clone()) {
            self.order.push(id);
        }
    }
}

fn cancelled<E: de::Error>() -> E {
    E::custom(CANCELLED)
}

fn drain_seq<'de, A: SeqAccess<'de>>(mut seq: A) -> Result<(), A::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(())
}

fn drain_map<'de, A: MapAccess<'de>>(mut map: A) -> Result<(), A::Error> {
    while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
    Ok(())
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum DocumentField {
    ProviderReferences,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum RecordField {
    ProviderGroups,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum GroupField {
    Npi,
    Tin,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "snake_case")]
enum TinField {
    Value,
    #[serde(other)]
    Other,
}

// ============================================================================
// Document level: { "provider_references": [ ... ], ... }
// ============================================================================

struct DocumentSeed<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a coverage document object with a `provider_references` array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut found = false;

        while let Some(key) = map.next_key::<DocumentField>()? {
            match key {
                DocumentField::ProviderReferences if !found => {
                    map.next_value_seed(ReferencesSeed {
                        ctx: &mut *self.ctx,
                    })?;
                    found = true;
                }
                DocumentField::ProviderReferences => {
                    warn!("Duplicate `provider_references` key ignored");
                    map.next_value::<IgnoredAny>()?;
                }
                DocumentField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if found {
            Ok(())
        } else {
            Err(de::Error::missing_field("provider_references"))
        }
    }
}

struct ReferencesSeed<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

impl<'de> DeserializeSeed<'de> for ReferencesSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ReferencesSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of provider references")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        loop {
            if self.ctx.should_stop() {
                return Err(cancelled());
            }

            let position = self.ctx.summary.records_processed + self.ctx.summary.records_skipped;
            match seq.next_element_seed(RecordSeed {
                ctx: &mut *self.ctx,
            })? {
                None => return Ok(()),
                Some(Ok(())) => self.ctx.summary.records_processed += 1,
                Some(Err(reason)) => {
                    warn!("Skipping provider reference #{position}: {reason}");
                    self.ctx.summary.records_skipped += 1;
                }
            }
        }
    }
}

// ============================================================================
// Record level: { "provider_groups": [ ... ], ... }
// ============================================================================

/// Decodes one provider reference. A wrong shape is reported as `Err(reason)`
/// inside `Ok`, after the offending value has been fully consumed, so the
/// decoder stays positioned at the next record.
struct RecordSeed<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

type Recovered = Result<(), &'static str>;

impl<'de> DeserializeSeed<'de> for RecordSeed<'_, '_> {
    type Value = Recovered;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Recovered, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for RecordSeed<'_, '_> {
    type Value = Recovered;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a provider reference object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Recovered, A::Error> {
        let mut outcome = Ok(());

        while let Some(key) = map.next_key::<RecordField>()? {
            match key {
                RecordField::ProviderGroups => {
                    let groups = map.next_value_seed(GroupsSeed {
                        ctx: &mut *self.ctx,
                    })?;
                    if groups.is_err() {
                        outcome = groups;
                    }
                }
                RecordField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        Ok(outcome)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Recovered, A::Error> {
        drain_seq(seq)?;
        Ok(Err("record is an array, not an object"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Recovered, E> {
        Ok(Err("record is a string, not an object"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Recovered, E> {
        Ok(Err("record is a boolean, not an object"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Recovered, E> {
        Ok(Err("record is a number, not an object"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Recovered, E> {
        Ok(Err("record is a number, not an object"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Recovered, E> {
        Ok(Err("record is a number, not an object"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Recovered, E> {
        Ok(Err("record is null"))
    }
}

struct GroupsSeed<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

impl<'de> DeserializeSeed<'de> for GroupsSeed<'_, '_> {
    type Value = Recovered;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Recovered, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for GroupsSeed<'_, '_> {
    type Value = Recovered;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of provider groups")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Recovered, A::Error> {
        loop {
            if self.ctx.should_stop() {
                return Err(cancelled());
            }

            match seq.next_element_seed(GroupSeed {
                ctx: &mut *self.ctx,
            })? {
                None => return Ok(Ok(())),
                Some(Ok(())) => self.ctx.summary.groups_seen += 1,
                Some(Err(reason)) => {
                    debug!("Skipping provider group: {reason}");
                    self.ctx.summary.groups_seen += 1;
                    self.ctx.summary.groups_skipped += 1;
                }
            }

            // The consumer may have asked to stop while this group was emitted
            if self.ctx.stopped {
                return Err(cancelled());
            }
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Recovered, A::Error> {
        drain_map(map)?;
        Ok(Err("`provider_groups` is an object, not an array"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Recovered, E> {
        Ok(Err("`provider_groups` is a string, not an array"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Recovered, E> {
        Ok(Err("`provider_groups` is a boolean, not an array"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Recovered, E> {
        Ok(Err("`provider_groups` is a number, not an array"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Recovered, E> {
        Ok(Err("`provider_groups` is a number, not an array"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Recovered, E> {
        Ok(Err("`provider_groups` is a number, not an array"))
    }

    // `"provider_groups": null` carries no groups but is not malformed
    fn visit_unit<E: de::Error>(self) -> Result<Recovered, E> {
        Ok(Ok(()))
    }
}

// ============================================================================
// Group level: { "npi": [ ... ], "tin": { "value": ... }, ... }
// ============================================================================

struct GroupSeed<'c, 'a> {
    ctx: &'c mut ScanContext<'a>,
}

impl<'de> DeserializeSeed<'de> for GroupSeed<'_, '_> {
    type Value = Recovered;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Recovered, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for GroupSeed<'_, '_> {
    type Value = Recovered;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a provider group object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Recovered, A::Error> {
        let mut hits = GroupHits::default();
        let mut group_key = None;
        let mut outcome = Ok(());

        while let Some(key) = map.next_key::<GroupField>()? {
            match key {
                GroupField::Npi => {
                    let npis = map.next_value_seed(NpiListSeed {
                        ctx: &mut *self.ctx,
                        hits: &mut hits,
                    })?;
                    if npis.is_err() {
                        outcome = npis;
                    }
                }
                GroupField::Tin => {
                    group_key = map.next_value::<GroupKey>()?.0;
                }
                GroupField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        // `tin` may follow `npi`, so matches go out once the group is closed
        self.ctx.emit_group(hits, group_key);
        Ok(outcome)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Recovered, A::Error> {
        drain_seq(seq)?;
        Ok(Err("group is an array, not an object"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Recovered, E> {
        Ok(Err("group is a string, not an object"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Recovered, E> {
        Ok(Err("group is a boolean, not an object"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Recovered, E> {
        Ok(Err("group is a number, not an object"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Recovered, E> {
        Ok(Err("group is a number, not an object"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Recovered, E> {
        Ok(Err("group is a number, not an object"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Recovered, E> {
        Ok(Err("group is null"))
    }
}

/// Walks an `npi` array, collecting the distinct targets it contains
struct NpiListSeed<'c, 'a, 'h> {
    ctx: &'c mut ScanContext<'a>,
    hits: &'h mut GroupHits,
}

impl<'de> DeserializeSeed<'de> for NpiListSeed<'_, '_, '_> {
    type Value = Recovered;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Recovered, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NpiListSeed<'_, '_, '_> {
    type Value = Recovered;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of provider identifiers")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Recovered, A::Error> {
        while let Some(value) = seq.next_element_seed(IdentifierSeed {
            targets: self.ctx.targets,
        })? {
            self.ctx.summary.identifiers_seen += 1;
            match value {
                Identifier::Hit(id) => {
                    if !self.hits.contains(id.as_str()) {
                        debug!("Found target identifier {id} in coverage group");
                        self.hits.insert(id);
                    }
                }
                Identifier::Miss => {}
                Identifier::Invalid => {
                    self.ctx.summary.identifiers_skipped += 1;
                }
            }
        }
        Ok(Ok(()))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Recovered, A::Error> {
        drain_map(map)?;
        Ok(Err("`npi` is an object, not an array"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Recovered, E> {
        Ok(Err("`npi` is a string, not an array"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Recovered, E> {
        Ok(Err("`npi` is a boolean, not an array"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Recovered, E> {
        Ok(Err("`npi` is a number, not an array"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Recovered, E> {
        Ok(Err("`npi` is a number, not an array"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Recovered, E> {
        Ok(Err("`npi` is a number, not an array"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Recovered, E> {
        Ok(Ok(()))
    }
}

enum Identifier {
    Hit(ProviderId),
    Miss,
    Invalid,
}

/// Normalizes one identifier value and tests it against the targets.
/// Only hits allocate.
struct IdentifierSeed<'a> {
    targets: &'a TargetSet,
}

impl IdentifierSeed<'_> {
    fn check(&self, id: &str) -> Identifier {
        if self.targets.contains(id) {
            Identifier::Hit(ProviderId::new(id))
        } else {
            Identifier::Miss
        }
    }
}

impl<'de> DeserializeSeed<'de> for IdentifierSeed<'_> {
    type Value = Identifier;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Identifier, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for IdentifierSeed<'_> {
    type Value = Identifier;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a provider identifier string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Identifier, E> {
        Ok(self.check(v.trim()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Identifier, E> {
        Ok(self.check(ProviderId::from_u64(v).as_str()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Identifier, E> {
        Ok(self.check(ProviderId::from_i64(v).as_str()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Identifier, E> {
        Ok(self.check(ProviderId::from_f64(v).as_str()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Identifier, E> {
        Ok(Identifier::Invalid)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Identifier, E> {
        Ok(Identifier::Invalid)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Identifier, A::Error> {
        drain_seq(seq)?;
        Ok(Identifier::Invalid)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Identifier, A::Error> {
        drain_map(map)?;
        Ok(Identifier::Invalid)
    }
}

/// The `tin` payload of a group, reduced to its `value`.
///
/// A bare string or number is accepted as the value itself; any other shape
/// yields no key.
struct GroupKey(Option<String>);

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GroupKeyVisitor)
    }
}

struct GroupKeyVisitor;

impl<'de> Visitor<'de> for GroupKeyVisitor {
    type Value = GroupKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a tin object with a `value`")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<GroupKey, A::Error> {
        let mut value = None;
        while let Some(key) = map.next_key::<TinField>()? {
            match key {
                TinField::Value => value = map.next_value::<GroupKey>()?.0,
                TinField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(GroupKey(value))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<GroupKey, E> {
        let v = v.trim();
        Ok(GroupKey((!v.is_empty()).then(|| v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<GroupKey, E> {
        Ok(GroupKey(Some(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<GroupKey, E> {
        Ok(GroupKey(Some(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<GroupKey, E> {
        Ok(GroupKey(Some(ProviderId::from_f64(v).to_string())))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<GroupKey, E> {
        Ok(GroupKey(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<GroupKey, E> {
        Ok(GroupKey(None))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<GroupKey, A::Error> {
        drain_seq(seq)?;
        Ok(GroupKey(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(ids: &[&str]) -> TargetSet {
        ids.iter().map(|s| ProviderId::new(s)).collect()
    }

    fn scan_str(doc: &str, ids: &[&str]) -> Result<(Vec<MatchEvent>, ScanSummary), ScanError> {
        CoverageScanner::new(targets(ids)).collect(doc.as_bytes())
    }

    #[test]
    fn test_finds_target_and_ignores_absent() {
        let doc = r#"{
            "reporting_entity_name": "Example Health Plan",
            "provider_references": [
                {
                    "provider_group_id": 1,
                    "provider_groups": [
                        {"npi": [1111111111, 2222222222], "tin": {"type": "ein", "value": "12-3456789"}}
                    ]
                }
            ],
            "in_network": []
        }"#;

        let (events, summary) = scan_str(doc, &["1111111111", "9999999999"]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_str(), "1111111111");
        assert!(events[0].in_network);
        assert_eq!(events[0].group_key.as_deref(), Some("12-3456789"));
        assert_eq!(summary.records_processed, 1);
        assert_eq!(summary.groups_seen, 1);
        assert_eq!(summary.identifiers_seen, 2);
        assert_eq!(summary.matches, 1);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_string_identifiers_and_tin_after_npi() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"tin": {"value": "A"}, "npi": [" 1111111111 "]}]},
            {"provider_groups": [{"npi": ["1111111111"], "tin": {"value": "B"}}]}
        ]}"#;

        let (events, _) = scan_str(doc, &["1111111111"]).unwrap();
        let keys: Vec<_> = events.iter().map(|e| e.group_key.clone()).collect();
        assert_eq!(keys, vec![Some("A".to_string()), Some("B".to_string())]);
    }

    #[test]
    fn test_duplicate_identifier_in_one_group_emits_once() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"npi": [1111111111, "1111111111", 1111111111.0]}]}
        ]}"#;

        let (events, summary) = scan_str(doc, &["1111111111"]).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].group_key.is_none());
        assert_eq!(summary.identifiers_seen, 3);
    }

    #[test]
    fn test_large_group_emits_each_target_once_in_first_seen_order() {
        let ids: Vec<String> = (1..=5000).map(|i| i.to_string()).collect();
        // Every identifier twice, the repeats in reverse
        let npis: Vec<&str> = ids.iter().chain(ids.iter().rev()).map(String::as_str).collect();
        let doc = format!(
            r#"{{"provider_references": [{{"provider_groups": [{{"npi": [{}], "tin": {{"value": "11-1111111"}}}}]}}]}}"#,
            npis.join(",")
        );

        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (events, summary) = scan_str(&doc, &refs).unwrap();

        assert_eq!(events.len(), 5000);
        let order: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, refs);
        assert!(events.iter().all(|e| e.group_key.as_deref() == Some("11-1111111")));
        assert_eq!(summary.identifiers_seen, 10_000);
        assert_eq!(summary.matches, 5000);
    }

    #[test]
    fn test_scans_every_group() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"npi": [1]}, {"npi": [2]}]},
            {"provider_groups": [{"npi": [1]}]}
        ]}"#;

        let (events, summary) = scan_str(doc, &["1", "2"]).unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "1"]);
        assert_eq!(summary.records_processed, 2);
        assert_eq!(summary.groups_seen, 3);
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let doc = r#"{"provider_references": [{"provider_groups": [{"npi": [5]}]}]}"#;
        let (events, summary) = scan_str(doc, &["1"]).unwrap();
        assert!(events.is_empty());
        assert_eq!(summary.records_processed, 1);

        let (events, summary) = scan_str(r#"{"provider_references": []}"#, &["1"]).unwrap();
        assert!(events.is_empty());
        assert_eq!(summary.records_processed, 0);
    }

    #[test]
    fn test_missing_provider_references_is_malformed() {
        let err = scan_str(r#"{"in_network": []}"#, &["1"]).unwrap_err();
        assert!(matches!(
            err,
            ScanError::MalformedDocument {
                records_processed: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_top_level_array_is_malformed() {
        // The shape some hand-made fixtures use; not a coverage document
        let err = scan_str(r#"[{"npi": "1111111111", "in_network": true}]"#, &["1111111111"])
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedDocument { .. }));
    }

    #[test]
    fn test_provider_references_not_array_is_malformed() {
        let err = scan_str(r#"{"provider_references": "nope"}"#, &["1"]).unwrap_err();
        assert!(matches!(err, ScanError::MalformedDocument { .. }));
    }

    #[test]
    fn test_truncated_trailing_record_reports_count() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"npi": [1]}]},
            {"provider_groups": [{"npi": [2]}]},
            {"provider_groups": [{"npi": [3"#;

        match scan_str(doc, &["1", "2", "3"]) {
            Err(ScanError::MalformedDocument {
                records_processed,
                summary,
                ..
            }) => {
                assert_eq!(records_processed, 2);
                assert_eq!(summary.records_processed, 2);
                assert_eq!(summary.groups_seen, 2);
                assert_eq!(summary.matches, 2);
            }
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_garbage_is_malformed() {
        let doc = r#"{"provider_references": [{"provider_groups": [{"npi": [1]}]}]} extra"#;
        match scan_str(doc, &["1"]) {
            Err(ScanError::MalformedDocument {
                records_processed, ..
            }) => assert_eq!(records_processed, 1),
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let doc = r#"{"provider_references": [
            "not a record",
            {"provider_groups": {"npi": [1]}},
            {"provider_groups": [{"npi": [1]}]},
            [1, 2, 3],
            {"location": "https://example.com/refs/2.json"}
        ]}"#;

        let (events, summary) = scan_str(doc, &["1"]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(summary.records_processed, 2);
        assert_eq!(summary.records_skipped, 3);
    }

    #[test]
    fn test_bad_groups_and_identifiers_are_skipped() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [
                "junk",
                {"npi": "1"},
                {"npi": [{"nested": 1}, true, null, 1], "tin": ["x"]}
            ]}
        ]}"#;

        let (events, summary) = scan_str(doc, &["1"]).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].group_key.is_none());
        assert_eq!(summary.groups_seen, 3);
        assert_eq!(summary.groups_skipped, 2);
        assert_eq!(summary.identifiers_skipped, 3);
        assert_eq!(summary.records_processed, 1);
        assert_eq!(summary.records_skipped, 0);
    }

    #[test]
    fn test_consumer_can_stop_early() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"npi": [1]}]},
            {"provider_groups": [{"npi": [1]}]},
            {"provider_groups": [{"npi": [1]}]}
        ]}"#;

        let scanner = CoverageScanner::new(targets(&["1"]));
        let mut seen = 0;
        let summary = scanner
            .scan(doc.as_bytes(), |_| {
                seen += 1;
                ControlFlow::Break(())
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert!(summary.cancelled);
        assert_eq!(summary.matches, 1);
    }

    #[test]
    fn test_cancel_flag_stops_scan() {
        let doc = r#"{"provider_references": [{"provider_groups": [{"npi": [1]}]}]}"#;
        let scanner = CoverageScanner::new(targets(&["1"]));
        let cancel = AtomicBool::new(true);

        let summary = scanner
            .scan_cancellable(doc.as_bytes(), &cancel, |_| ControlFlow::Continue(()))
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.matches, 0);
    }

    #[test]
    fn test_rescan_is_deterministic() {
        let doc = r#"{"provider_references": [
            {"provider_groups": [{"npi": [3, 1, 2], "tin": {"value": "t1"}}]},
            {"provider_groups": [{"npi": [2], "tin": {"value": "t2"}}]}
        ]}"#;

        let first = scan_str(doc, &["1", "2", "3"]).unwrap();
        let second = scan_str(doc, &["1", "2", "3"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_target_set_drops_empty_ids() {
        let set = targets(&["", "  ", "1"]);
        assert_eq!(set.len(), 1);
        assert!(set.contains("1"));
    }
}
