// SPDX-License-Identifier: Apache-2.0

//! Drives a trace through a [`ContextTracker`] and hands instrumented events
//! to a [`TraceObserver`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::aec::AecError;
use crate::error::TraceError;
use crate::exec_context::{ContextTracker, ExecutionContext, StackError};
use crate::trace_event::{parse_line, Event, Iid, ParseError, TraceLine};

/// Where a trace comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceSource {
    File(PathBuf),
    Text(String),
}

/// A branch event as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchSite {
    pub iid: Iid,
    pub arm: Option<i64>,
    pub line: u32,
}

/// A heap load as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLoadSite<'a> {
    pub iid: Iid,
    pub line: u32,
    pub object_id: i64,
    pub field: &'a str,
}

/// Receives the instrumented events of a trace, each together with the
/// execution context it happened in.
///
/// Observers fail only when an execution context cannot be reduced.
pub trait TraceObserver {
    fn on_branch(&mut self, _ec: &ExecutionContext, _site: BranchSite) -> Result<(), AecError> {
        Ok(())
    }

    fn on_heap_load(
        &mut self,
        _ec: &ExecutionContext,
        _site: HeapLoadSite<'_>,
    ) -> Result<(), AecError> {
        Ok(())
    }

    fn on_end_of_input(&mut self, _label: &str) {}
}

fn stack_error(line_no: usize, e: StackError) -> TraceError {
    match e {
        StackError::Underflow => TraceError::StackUnderflow { line_no },
        StackError::NoActiveFrame { event } => TraceError::NoActiveFrame { line_no, event },
    }
}

/// Replays every event of `reader` until end of input or the first blank line.
///
/// Returns the number of events applied.
pub fn replay<R: BufRead, O: TraceObserver + ?Sized>(
    reader: R,
    tracker: &mut ContextTracker,
    observer: &mut O,
) -> Result<usize, TraceError> {
    let mut events = 0usize;
    for (index, bytes) in reader.split(b'\n').enumerate() {
        let mut bytes = bytes?;
        let line_no = index + 1;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes());
                let error = ParseError::new(&lossy, "line is not valid UTF-8");
                return Err(TraceError::Parse { line_no, error });
            }
        };
        let event = match parse_line(&line) {
            Ok(TraceLine::Event(event)) => event,
            Ok(TraceLine::Comment) => continue,
            Ok(TraceLine::Blank) => break,
            Err(error) => return Err(TraceError::Parse { line_no, error }),
        };

        tracker
            .apply(&event)
            .map_err(|e| stack_error(line_no, e))?;
        events += 1;

        match &event {
            Event::Branch { iid, arm, line } => {
                let ec = tracker.execution_context();
                let site = BranchSite {
                    iid: *iid,
                    arm: *arm,
                    line: *line,
                };
                observer
                    .on_branch(&ec, site)
                    .map_err(|error| TraceError::Aec { line_no, error })?;
            }
            Event::HeapLoad {
                iid,
                line,
                object_id,
                field,
            } => {
                let ec = tracker.execution_context();
                let site = HeapLoadSite {
                    iid: *iid,
                    line: *line,
                    object_id: *object_id,
                    field: field.as_str(),
                };
                observer
                    .on_heap_load(&ec, site)
                    .map_err(|error| TraceError::Aec { line_no, error })?;
            }
            Event::EndOfInput { label } => observer.on_end_of_input(label),
            Event::Begin { .. } | Event::Call { .. } | Event::Alloc { .. } | Event::Ret => {}
        }
    }
    log::debug!("replayed {} events", events);
    Ok(events)
}

/// Replays one trace with a fresh call stack, returning the tracker so the
/// caller can harvest its line-number table.
pub fn replay_source<O: TraceObserver + ?Sized>(
    source: &TraceSource,
    observer: &mut O,
) -> Result<ContextTracker, TraceError> {
    let mut tracker = ContextTracker::new();
    match source {
        TraceSource::File(path) => replay_file(path, &mut tracker, observer)?,
        TraceSource::Text(text) => replay(text.as_bytes(), &mut tracker, observer)?,
    };
    Ok(tracker)
}

pub fn replay_file<O: TraceObserver + ?Sized>(
    path: &Path,
    tracker: &mut ContextTracker,
    observer: &mut O,
) -> Result<usize, TraceError> {
    log::info!("replaying trace {}", path.display());
    let file = File::open(path)?;
    replay(BufReader::new(file), tracker, observer)
}
