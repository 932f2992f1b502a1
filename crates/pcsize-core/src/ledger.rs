//! Deduplicated pipeline store with usage counters.
//!
//! A ledger is owned by one thread. Sharded runs keep one ledger per shard
//! and combine them with [`PipelineLedger::merge`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use pcsize_protocol::{FeatureSet, PipelineDescription, PipelineIdentifier};
use tracing::{debug, trace, warn};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLedger {
    entries: BTreeMap<PipelineIdentifier, PipelineDescription>,
}

impl PipelineLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more use of a pipeline by `test_name`.
    ///
    /// The blob, features and extensions of an already known pipeline are
    /// kept from its first encounter.
    pub fn upsert(
        &mut self,
        identifier: PipelineIdentifier,
        compiled_blob: Vec<u8>,
        required_features: FeatureSet,
        required_extensions: Vec<String>,
        test_name: &str,
    ) -> &PipelineDescription {
        match self.entries.entry(identifier) {
            Entry::Vacant(slot) => {
                debug!(pipeline = %identifier, test = test_name, "new pipeline");
                slot.insert(PipelineDescription {
                    identifier,
                    compiled_blob,
                    required_features,
                    required_extensions,
                    originating_tests: [test_name.to_string()].into(),
                    current_ref_count: 1,
                    peak_ref_count: 1,
                    total_ref_count: 1,
                })
            }
            Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                if !entry.originating_tests.contains(test_name) {
                    entry.originating_tests.insert(test_name.to_string());
                }
                entry.current_ref_count = entry.current_ref_count.saturating_add(1);
                entry.total_ref_count = entry.total_ref_count.saturating_add(1);
                entry.peak_ref_count = entry.peak_ref_count.max(entry.current_ref_count);
                trace!(
                    pipeline = %identifier,
                    current = entry.current_ref_count,
                    peak = entry.peak_ref_count,
                    "pipeline reused"
                );
                entry
            }
        }
    }

    /// Drop one live use of a pipeline. Peak and total are unaffected.
    pub fn release(&mut self, identifier: &PipelineIdentifier) -> CoreResult<&PipelineDescription> {
        let entry = self
            .entries
            .get_mut(identifier)
            .ok_or(CoreError::UnknownPipeline(*identifier))?;
        if entry.current_ref_count == 0 {
            warn!(pipeline = %identifier, "release of pipeline with no live uses");
        }
        entry.current_ref_count = entry.current_ref_count.saturating_sub(1);
        Ok(&*entry)
    }

    /// Fold a shard ledger into this one.
    ///
    /// Tests are unioned, totals and live counts summed, peaks maxed. Shards
    /// must cover disjoint time windows; the merged peak is raised to the
    /// summed live count so it never falls below it.
    pub fn merge(&mut self, other: PipelineLedger) {
        for (identifier, theirs) in other.entries {
            match self.entries.entry(identifier) {
                Entry::Vacant(slot) => {
                    slot.insert(theirs);
                }
                Entry::Occupied(slot) => {
                    let ours = slot.into_mut();
                    ours.originating_tests.extend(theirs.originating_tests);
                    ours.total_ref_count = ours.total_ref_count.saturating_add(theirs.total_ref_count);
                    ours.current_ref_count =
                        ours.current_ref_count.saturating_add(theirs.current_ref_count);
                    ours.peak_ref_count = ours
                        .peak_ref_count
                        .max(theirs.peak_ref_count)
                        .max(ours.current_ref_count);
                }
            }
        }
    }

    /// Mark every pipeline as no longer live, e.g. at the end of a test.
    pub fn reset_current(&mut self) {
        for entry in self.entries.values_mut() {
            entry.current_ref_count = 0;
        }
    }

    pub fn get(&self, identifier: &PipelineIdentifier) -> Option<&PipelineDescription> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &PipelineIdentifier) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Pipelines in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &PipelineDescription> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_descriptions(self) -> Vec<PipelineDescription> {
        self.entries.into_values().collect()
    }

    /// Rebuild a ledger from decoded descriptions. Repeated identifiers are
    /// merged.
    pub fn from_descriptions(descriptions: Vec<PipelineDescription>) -> Self {
        let mut ledger = Self::new();
        for description in descriptions {
            let mut single = BTreeMap::new();
            single.insert(description.identifier, description);
            ledger.merge(PipelineLedger { entries: single });
        }
        ledger
    }
}
