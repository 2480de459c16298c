// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::io;

use crate::aec::AecError;
use crate::trace_event::ParseError;

/// Fatal conditions encountered while replaying one trace.
///
/// `line_no` is the 1-based line number within the trace being replayed.
#[derive(Debug)]
pub enum TraceError {
    Io(io::Error),
    Parse { line_no: usize, error: ParseError },
    /// `RET` with nothing left on the call stack.
    StackUnderflow { line_no: usize },
    /// A program-counter update arrived before any frame was entered.
    NoActiveFrame { line_no: usize, event: &'static str },
    Aec { line_no: usize, error: AecError },
}

impl TraceError {
    pub fn line_no(&self) -> Option<usize> {
        match self {
            TraceError::Io(_) => None,
            TraceError::Parse { line_no, .. }
            | TraceError::StackUnderflow { line_no }
            | TraceError::NoActiveFrame { line_no, .. }
            | TraceError::Aec { line_no, .. } => Some(*line_no),
        }
    }
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::Io(e) => write!(f, "trace I/O error: {}", e),
            TraceError::Parse { line_no, error } => write!(f, "line {}: {}", line_no, error),
            TraceError::StackUnderflow { line_no } => {
                write!(f, "line {}: RET on an empty call stack", line_no)
            }
            TraceError::NoActiveFrame { line_no, event } => {
                write!(f, "line {}: {} outside of any frame", line_no, event)
            }
            TraceError::Aec { line_no, error } => write!(f, "line {}: {}", line_no, error),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Io(e) => Some(e),
            TraceError::Parse { error, .. } => Some(error),
            TraceError::Aec { error, .. } => Some(error),
            TraceError::StackUnderflow { .. } | TraceError::NoActiveFrame { .. } => None,
        }
    }
}

impl From<io::Error> for TraceError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
