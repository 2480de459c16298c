// SPDX-License-Identifier: Apache-2.0

//! Counts branch executions per AEC. Branches under the same AEC executing
//! many times indicate a hot loop or recursion at that call path.

use std::collections::{BTreeMap, HashMap};

use crate::aec::{Aec, AecError};
use crate::error::TraceError;
use crate::exec_context::ExecutionContext;
use crate::replay::{replay_source, BranchSite, TraceObserver, TraceSource};
use crate::report::CycleCountReport;
use crate::trace_event::Iid;

#[derive(Debug, Default)]
pub struct CycleCounter {
    counts: HashMap<Aec, u64>,
    line_numbers: BTreeMap<Iid, u32>,
}

impl CycleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_trace(&mut self, source: &TraceSource) -> Result<(), TraceError> {
        let tracker = replay_source(source, self)?;
        self.line_numbers.extend(tracker.into_line_numbers());
        Ok(())
    }

    pub fn distinct_aecs(&self) -> usize {
        self.counts.len()
    }

    pub fn report(&self) -> CycleCountReport {
        CycleCountReport {
            counts: self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            line_numbers: self.line_numbers.clone(),
        }
    }
}

impl TraceObserver for CycleCounter {
    fn on_branch(&mut self, ec: &ExecutionContext, _site: BranchSite) -> Result<(), AecError> {
        *self.counts.entry(Aec::reduce(ec.frames())?).or_insert(0) += 1;
        Ok(())
    }
}
