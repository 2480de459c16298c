// SPDX-License-Identifier: Apache-2.0

//! Finds, for every branch outcome, the input that executed it most often.
//!
//! A trace may hold the events of many inputs back to back, each closed by an
//! `# End <input>` marker. Branch counts are kept per input and compared once
//! the trace has been consumed.

use std::collections::{BTreeMap, HashMap};

use crate::aec::AecError;
use crate::error::TraceError;
use crate::exec_context::ExecutionContext;
use crate::replay::{replay_source, BranchSite, TraceObserver, TraceSource};
use crate::source_location::render_frame;
use crate::trace_event::Iid;

/// A branch instruction together with the arm taken (absent for traces that
/// do not record arms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchOutcome {
    pub iid: Iid,
    pub arm: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaximizingInput {
    pub outcome: BranchOutcome,
    pub input: String,
    pub count: u64,
    pub source_location: String,
}

#[derive(Debug, Default)]
pub struct BranchMaximizers {
    current: HashMap<BranchOutcome, u64>,
    inputs: Vec<(String, HashMap<BranchOutcome, u64>)>,
    source_locations: HashMap<Iid, String>,
}

impl BranchMaximizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_trace(&mut self, source: &TraceSource) -> Result<(), TraceError> {
        replay_source(source, self)?;
        Ok(())
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Per branch outcome, the input with the highest count (the earliest
    /// input on ties), highest counts first.
    pub fn maximizing_inputs(&self) -> Vec<MaximizingInput> {
        let mut best: BTreeMap<BranchOutcome, (&str, u64)> = BTreeMap::new();
        for (input, counts) in self.inputs.iter() {
            for (&outcome, &count) in counts.iter() {
                let entry = best.entry(outcome).or_insert((input.as_str(), 0));
                if count > entry.1 {
                    *entry = (input.as_str(), count);
                }
            }
        }
        let mut result: Vec<MaximizingInput> = best
            .into_iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(outcome, (input, count))| MaximizingInput {
                outcome,
                input: input.to_string(),
                count,
                source_location: self
                    .source_locations
                    .get(&outcome.iid)
                    .cloned()
                    .unwrap_or_else(|| format!("iid {}", outcome.iid)),
            })
            .collect();
        // Stable: ties keep outcome order.
        result.sort_by(|a, b| b.count.cmp(&a.count));
        result
    }
}

impl TraceObserver for BranchMaximizers {
    fn on_branch(&mut self, ec: &ExecutionContext, site: BranchSite) -> Result<(), AecError> {
        if !self.source_locations.contains_key(&site.iid) {
            if let Some(frame) = ec.current() {
                let lines: BTreeMap<Iid, u32> = [(site.iid, site.line)].into_iter().collect();
                self.source_locations
                    .insert(site.iid, render_frame(&frame.method, site.iid, &lines));
            }
        }
        *self
            .current
            .entry(BranchOutcome {
                iid: site.iid,
                arm: site.arm,
            })
            .or_insert(0) += 1;
        Ok(())
    }

    fn on_end_of_input(&mut self, label: &str) {
        let counts = std::mem::take(&mut self.current);
        match self.inputs.iter_mut().find(|(l, _)| l == label) {
            Some(slot) => slot.1 = counts,
            None => self.inputs.push((label.to_string(), counts)),
        }
    }
}
