// SPDX-License-Identifier: Apache-2.0

//! Call-stack simulation over the trace event stream.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trace_event::{Event, Iid};

/// One `(method, iid)` pair: a stack frame together with the instruction it is
/// currently at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub method: String,
    pub iid: Iid,
}

impl Frame {
    pub fn new(method: impl Into<String>, iid: Iid) -> Self {
        Self {
            method: method.into(),
            iid,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.method, self.iid)
    }
}

/// Snapshot of the call stack at an instrumented event, root frame first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionContext(Vec<Frame>);

impl ExecutionContext {
    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The frame currently executing.
    pub fn current(&self) -> Option<&Frame> {
        self.0.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Underflow,
    NoActiveFrame { event: &'static str },
}

/// Maintains the live call stack for a single trace, plus the instruction to
/// line-number table observed so far.
#[derive(Debug, Default)]
pub struct ContextTracker {
    stack: Vec<Frame>,
    line_numbers: BTreeMap<Iid, u32>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn line_numbers(&self) -> &BTreeMap<Iid, u32> {
        &self.line_numbers
    }

    pub fn into_line_numbers(self) -> BTreeMap<Iid, u32> {
        self.line_numbers
    }

    /// Copies the current stack out as an execution context.
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext(self.stack.clone())
    }

    fn set_pc(&mut self, iid: Iid, event: &'static str) -> Result<(), StackError> {
        match self.stack.last_mut() {
            Some(top) => {
                top.iid = iid;
                Ok(())
            }
            None => Err(StackError::NoActiveFrame { event }),
        }
    }

    /// Applies one event to the stack.
    pub fn apply(&mut self, event: &Event) -> Result<(), StackError> {
        if let Some((iid, line)) = event.site() {
            self.line_numbers.insert(iid, line);
        }
        match event {
            Event::Begin { method } => {
                self.stack.push(Frame::new(method.clone(), 0));
            }
            Event::Call { iid, callee, .. } => {
                if let Some(top) = self.stack.last_mut() {
                    top.iid = *iid;
                }
                if let Some(callee) = callee {
                    self.stack.push(Frame::new(callee.clone(), 0));
                }
            }
            Event::Branch { iid, .. } | Event::HeapLoad { iid, .. } | Event::Alloc { iid, .. } => {
                self.set_pc(*iid, event.kind_name())?;
            }
            Event::Ret => {
                if self.stack.pop().is_none() {
                    return Err(StackError::Underflow);
                }
            }
            Event::EndOfInput { .. } => {}
        }
        Ok(())
    }
}
