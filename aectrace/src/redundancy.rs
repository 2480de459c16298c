// SPDX-License-Identifier: Apache-2.0

//! Memory-load redundancy per acyclic execution context.
//!
//! Every heap load is attributed to the AEC it executed under. An AEC whose
//! loads keep hitting a small set of locations is doing repeated work; the
//! score in [`redundancy_score`] summarizes how concentrated those loads are.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::aec::{Aec, AecError};
use crate::error::TraceError;
use crate::exec_context::ExecutionContext;
use crate::replay::{replay_source, HeapLoadSite, TraceObserver, TraceSource};
use crate::report::RedundancyReport;
use crate::trace_event::Iid;

/// A logical storage slot: a field of a particular object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryLocation {
    pub object_id: i64,
    pub field: String,
}

/// Score and ascending load counts for one AEC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AecRedundancy {
    pub score: f64,
    pub counts: Vec<u64>,
}

impl AecRedundancy {
    pub fn from_counts(mut counts: Vec<u64>) -> Self {
        counts.sort_unstable();
        Self {
            score: redundancy_score(&counts),
            counts,
        }
    }

    pub fn total_loads(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Scores a multiset of per-location load counts.
///
/// With `n` distinct locations and `S` loads in total the score is
/// `(S/n - 1) * (n - 1) / S`, and `0.0` when `S < 2`. It is zero when every
/// location is loaded once, and also for a single location, and approaches
/// one as a few locations absorb most of the loads.
pub fn redundancy_score(counts: &[u64]) -> f64 {
    let total = counts.iter().sum::<u64>() as f64;
    if total < 2.0 {
        return 0.0;
    }
    let unique = counts.len() as f64;
    let average = total / unique;
    (average - 1.0) * (unique - 1.0) / total
}

/// AEC -> location -> load count.
#[derive(Debug, Clone, Default)]
pub struct RedundancyTable {
    counts: HashMap<Aec, HashMap<MemoryLocation, u64>>,
}

impl RedundancyTable {
    pub fn record(&mut self, aec: Aec, location: MemoryLocation) {
        *self
            .counts
            .entry(aec)
            .or_default()
            .entry(location)
            .or_insert(0) += 1;
    }

    pub fn count(&self, aec: &Aec, location: &MemoryLocation) -> u64 {
        self.counts
            .get(aec)
            .and_then(|m| m.get(location))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct AECs with at least one load.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn redundancies(&self) -> BTreeMap<Aec, AecRedundancy> {
        self.counts
            .iter()
            .map(|(aec, locations)| {
                let counts = locations.values().copied().collect();
                (aec.clone(), AecRedundancy::from_counts(counts))
            })
            .collect()
    }
}

/// Accumulates heap-load redundancy over one or more traces.
///
/// Each trace gets a fresh call stack; counts and the iid -> line table carry
/// over between traces of the same analysis.
#[derive(Debug, Default)]
pub struct RedundancyAnalysis {
    table: RedundancyTable,
    // Loads since the last end-of-input marker.
    pending: RedundancyTable,
    inputs: Vec<(String, RedundancyTable)>,
    line_numbers: BTreeMap<Iid, u32>,
}

impl RedundancyAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_trace(&mut self, source: &TraceSource) -> Result<(), TraceError> {
        let tracker = replay_source(source, self)?;
        self.line_numbers.extend(tracker.into_line_numbers());
        Ok(())
    }

    pub fn process_traces<'a, I>(&mut self, sources: I) -> Result<(), TraceError>
    where
        I: IntoIterator<Item = &'a TraceSource>,
    {
        for source in sources {
            self.process_trace(source)?;
        }
        Ok(())
    }

    pub fn table(&self) -> &RedundancyTable {
        &self.table
    }

    pub fn line_numbers(&self) -> &BTreeMap<Iid, u32> {
        &self.line_numbers
    }

    pub fn compute_redundancies(&self) -> RedundancyReport {
        RedundancyReport {
            aecs: self.table.redundancies(),
            line_numbers: self.line_numbers.clone(),
        }
    }

    /// Redundancy per input, for traces delimited by end-of-input markers, in
    /// the order the inputs were seen.
    pub fn input_redundancies(&self) -> Vec<(String, BTreeMap<Aec, AecRedundancy>)> {
        self.inputs
            .iter()
            .map(|(label, table)| (label.clone(), table.redundancies()))
            .collect()
    }
}

impl TraceObserver for RedundancyAnalysis {
    fn on_heap_load(
        &mut self,
        ec: &ExecutionContext,
        site: HeapLoadSite<'_>,
    ) -> Result<(), AecError> {
        let aec = Aec::reduce(ec.frames())?;
        let location = MemoryLocation {
            object_id: site.object_id,
            field: site.field.to_string(),
        };
        self.pending.record(aec.clone(), location.clone());
        self.table.record(aec, location);
        Ok(())
    }

    fn on_end_of_input(&mut self, label: &str) {
        let snapshot = std::mem::take(&mut self.pending);
        log::debug!(
            "end of input {:?}: {} AECs with heap loads",
            label,
            snapshot.len()
        );
        self.inputs.push((label.to_string(), snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec_context::Frame;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(&[1], 0.0; "single load")]
    #[test_case(&[2, 2], 0.25; "two locations twice each")]
    #[test_case(&[5], 0.0; "single location")]
    #[test_case(&[1, 1, 1, 7], 0.45; "one hot location")]
    #[test_case(&[1, 1, 1], 0.0; "no repetition")]
    #[test_case(&[], 0.0; "no loads")]
    fn score_examples(counts: &[u64], want: f64) {
        let got = redundancy_score(counts);
        assert!((got - want).abs() < 1e-12, "got {} want {}", got, want);
    }

    #[test]
    fn score_is_non_negative_and_below_one() {
        for n in 1..8u64 {
            for hot in 1..50u64 {
                let mut counts = vec![1u64; n as usize];
                counts[0] = hot;
                let s = redundancy_score(&counts);
                assert!((0.0..1.0).contains(&s), "{:?} -> {}", counts, s);
            }
        }
    }

    #[test]
    fn counts_are_reported_sorted() {
        let r = AecRedundancy::from_counts(vec![7, 1, 1, 1]);
        assert_eq!(r.counts, vec![1, 1, 1, 7]);
        assert_eq!(r.total_loads(), 10);
    }

    #[test]
    fn loads_group_by_aec_across_recursion() {
        let trace = "\
BEGIN main
CALL(1,10,f)
HEAPLOAD(2,20,100,x)
CALL(3,21,f)
HEAPLOAD(2,20,100,x)
CALL(3,21,f)
HEAPLOAD(2,20,101,x)
RET
RET
RET
HEAPLOAD(4,11,100,x)
";
        let mut analysis = RedundancyAnalysis::new();
        analysis
            .process_trace(&TraceSource::Text(trace.to_string()))
            .unwrap();
        let report = analysis.compute_redundancies();
        assert_eq!(report.aecs.len(), 2);

        let in_f = Aec::from(vec![Frame::new("main", 1), Frame::new("f", 2)]);
        assert_eq!(report.aecs[&in_f].counts, vec![1, 2]);
        let in_main = Aec::from(vec![Frame::new("main", 4)]);
        assert_eq!(report.aecs[&in_main].counts, vec![1]);
        assert_eq!(report.line_numbers.get(&3), Some(&21));
    }

    #[test]
    fn end_of_input_snapshots_per_input_counts() {
        let trace = "\
BEGIN main
HEAPLOAD(1,10,1,f)
HEAPLOAD(1,10,1,f)
# End first
HEAPLOAD(1,10,2,f)
# End second
";
        let mut analysis = RedundancyAnalysis::new();
        analysis
            .process_trace(&TraceSource::Text(trace.to_string()))
            .unwrap();
        let inputs = analysis.input_redundancies();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].0, "first");
        let aec = Aec::from(vec![Frame::new("main", 1)]);
        assert_eq!(inputs[0].1[&aec].counts, vec![2]);
        assert_eq!(inputs[1].1[&aec].counts, vec![1]);
        // The global aggregate is not reset.
        assert_eq!(
            analysis.compute_redundancies().aecs[&aec].counts,
            vec![1, 2]
        );

        let location = |object_id| MemoryLocation {
            object_id,
            field: "f".to_string(),
        };
        assert_eq!(analysis.table().count(&aec, &location(1)), 2);
        assert_eq!(analysis.table().count(&aec, &location(2)), 1);
        assert_eq!(analysis.table().count(&aec, &location(3)), 0);
    }

    #[test]
    fn line_numbers_accumulate_across_traces() {
        let mut analysis = RedundancyAnalysis::new();
        analysis
            .process_traces(&[
                TraceSource::Text("BEGIN a\nHEAPLOAD(1,10,1,f)\n".to_string()),
                TraceSource::Text("BEGIN b\nHEAPLOAD(2,20,1,f)\n".to_string()),
            ])
            .unwrap();
        assert_eq!(analysis.line_numbers().len(), 2);
        assert_eq!(analysis.table().len(), 2);
    }
}
