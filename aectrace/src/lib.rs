// SPDX-License-Identifier: Apache-2.0

//! Offline analyses over instrumentation traces of a managed-language
//! program: call-stack replay, acyclic execution context (AEC) reduction,
//! heap-load redundancy scoring, per-AEC branch counting and per-input branch
//! maximizers.

pub mod aec;
pub mod branch_maximizers;
pub mod cycle_count;
pub mod error;
pub mod exec_context;
pub mod redundancy;
pub mod replay;
pub mod report;
pub mod source_location;
pub mod trace_event;

pub use aec::{Aec, AecError};
pub use error::TraceError;
pub use exec_context::{ContextTracker, ExecutionContext, Frame};
pub use replay::{TraceObserver, TraceSource};
pub use trace_event::Iid;
