// SPDX-License-Identifier: Apache-2.0

//! Acyclic execution contexts.
//!
//! An execution context lists every live frame, so recursion and loops that
//! re-enter a method make the set of distinct contexts unbounded. The acyclic
//! reduction keeps, for every method, only the frame that first called it and
//! then walks those first-call edges back from the current frame to the root.
//! The result is the shortest call path to the current instruction and is
//! insensitive to recursion depth.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exec_context::Frame;
use crate::trace_event::Iid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AecError {
    EmptyContext,
    /// The backward walk reached a method that never appeared in the context.
    MissingPredecessor { method: String },
}

impl fmt::Display for AecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AecError::EmptyContext => write!(f, "cannot reduce an empty execution context"),
            AecError::MissingPredecessor { method } => write!(
                f,
                "method {:?} has no recorded predecessor in the execution context",
                method
            ),
        }
    }
}

impl std::error::Error for AecError {}

/// Acyclic execution context, root first. No method occurs twice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Aec(Vec<Frame>);

impl Aec {
    /// Reduces an execution context (root first) to its acyclic form.
    pub fn reduce(ec: &[Frame]) -> Result<Aec, AecError> {
        let last = ec.last().ok_or(AecError::EmptyContext)?;

        // method -> frame that was current right before its first appearance.
        let mut predecessors: HashMap<&str, Option<(&str, Iid)>> = HashMap::new();
        let mut previous: Option<&Frame> = None;
        for frame in ec {
            predecessors
                .entry(frame.method.as_str())
                .or_insert_with(|| previous.map(|p| (p.method.as_str(), p.iid)));
            previous = Some(frame);
        }

        let mut path = vec![last.clone()];
        let mut method = last.method.as_str();
        loop {
            match predecessors.get(method) {
                None => {
                    return Err(AecError::MissingPredecessor {
                        method: method.to_string(),
                    })
                }
                Some(None) => break,
                Some(Some((pred_method, pred_iid))) => {
                    path.push(Frame::new(*pred_method, *pred_iid));
                    method = *pred_method;
                }
            }
        }
        path.reverse();
        Ok(Aec(path))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Frame>> for Aec {
    fn from(frames: Vec<Frame>) -> Self {
        Aec(frames)
    }
}

impl fmt::Display for Aec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, frame) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", frame)?;
        }
        write!(f, "]")
    }
}
