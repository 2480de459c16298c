// SPDX-License-Identifier: Apache-2.0

//! A greedy, energy-weighted seed mutation loop. Mutants are kept when they
//! raise the best known redundancy score of some acyclic execution context.

pub mod corpus;
pub mod error;
pub mod mutate;
pub mod runner;
pub mod seed_gen;
pub mod session;

pub use corpus::{Seed, SeedCorpus};
pub use error::FuzzError;
pub use runner::{CommandRunner, RunnerError, TraceRunner};
pub use session::{FuzzConfig, FuzzReport, FuzzSession};
