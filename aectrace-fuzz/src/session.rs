// SPDX-License-Identifier: Apache-2.0

//! The feedback loop: pick a seed by energy, mutate it, run the mutants and
//! keep the ones that push some AEC's redundancy past its best known score.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aectrace::redundancy::RedundancyAnalysis;
use aectrace::report::RedundancyReport;
use aectrace::{Aec, TraceError, TraceSource};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::corpus::SeedCorpus;
use crate::error::FuzzError;
use crate::mutate::mutate_siblings;
use crate::runner::TraceRunner;

pub const DEFAULT_MUTANTS_PER_ITERATION: usize = 4;
pub const DEFAULT_IMPROVEMENT_THRESHOLD: f64 = 0.02;
pub const DEFAULT_DECAY: f64 = 0.05;
pub const DEFAULT_BOOST: f64 = 0.75;
pub const DEFAULT_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzConfig {
    pub seed: u64,
    /// `None` runs until the stop flag is raised.
    pub max_iters: Option<u64>,
    pub mutants_per_iteration: usize,
    /// A mutant is kept when its improvement is strictly above this.
    pub threshold: f64,
    /// Fraction of energy every existing seed loses when a seed is added.
    pub decay: f64,
    /// Fraction of energy a parent gains when one of its mutants is kept.
    pub boost: f64,
    /// Longest accepted initial seed, in characters.
    pub max_len: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        FuzzConfig {
            seed: 0,
            max_iters: None,
            mutants_per_iteration: DEFAULT_MUTANTS_PER_ITERATION,
            threshold: DEFAULT_IMPROVEMENT_THRESHOLD,
            decay: DEFAULT_DECAY,
            boost: DEFAULT_BOOST,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// Redundancy of every AEC over all traces of one run.
pub fn score_traces(traces: &[TraceSource]) -> Result<RedundancyReport, TraceError> {
    let mut analysis = RedundancyAnalysis::new();
    analysis.process_traces(traces)?;
    Ok(analysis.compute_redundancies())
}

/// What happened to one mutant.
#[derive(Debug, Clone, PartialEq)]
pub enum MutantOutcome {
    Accepted { improvement: f64, run_max: f64 },
    BelowThreshold { improvement: f64, run_max: f64 },
    /// Improved enough, but the content is already a seed.
    Duplicate { improvement: f64, run_max: f64 },
    RunFailure,
    AnalysisFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzStats {
    pub iterations: u64,
    pub runs: u64,
    pub accepted: u64,
    pub below_threshold: u64,
    pub duplicates: u64,
    pub run_failures: u64,
    pub analysis_failures: u64,
}

impl FuzzStats {
    fn record(&mut self, outcome: &MutantOutcome) {
        match outcome {
            MutantOutcome::Accepted { .. } => self.accepted += 1,
            MutantOutcome::BelowThreshold { .. } => self.below_threshold += 1,
            MutantOutcome::Duplicate { .. } => self.duplicates += 1,
            MutantOutcome::RunFailure => self.run_failures += 1,
            MutantOutcome::AnalysisFailure => self.analysis_failures += 1,
        }
    }
}

pub trait CorpusSink {
    fn on_new_seed(&mut self, content: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzProgress {
    pub iters: u64,
    pub corpus_len: usize,
    pub global_best: f64,
    pub mutant: String,
    pub outcome: MutantOutcome,
}

pub trait ProgressSink {
    fn on_progress(&mut self, p: &FuzzProgress);
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzReport {
    pub iters: u64,
    pub corpus_len: usize,
    pub global_best: f64,
    pub aecs_seen: usize,
    pub stats: FuzzStats,
}

enum Evaluation {
    Scored(RedundancyReport),
    Failed(MutantOutcome),
}

pub struct FuzzSession<R: TraceRunner> {
    config: FuzzConfig,
    runner: R,
    rng: StdRng,
    stop: Arc<AtomicBool>,
    corpus: SeedCorpus,
    best_scores: HashMap<Aec, f64>,
    global_best: f64,
    stats: FuzzStats,
}

impl<R: TraceRunner> FuzzSession<R> {
    pub fn new(config: FuzzConfig, runner: R) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            runner,
            rng,
            stop: Arc::new(AtomicBool::new(false)),
            corpus: SeedCorpus::new(),
            best_scores: HashMap::new(),
            global_best: 0.0,
            stats: FuzzStats::default(),
        }
    }

    pub fn set_stop_flag(&mut self, stop: Arc<AtomicBool>) {
        self.stop = stop;
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    pub fn corpus(&self) -> &SeedCorpus {
        &self.corpus
    }

    pub fn best_score(&self, aec: &Aec) -> Option<f64> {
        self.best_scores.get(aec).copied()
    }

    pub fn global_best(&self) -> f64 {
        self.global_best
    }

    pub fn stats(&self) -> &FuzzStats {
        &self.stats
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Adds the initial seeds at full energy and runs each once to populate
    /// the best-score map. Duplicates are dropped; a seed longer than
    /// `max_len` is an error and leaves the corpus untouched.
    pub fn initialize<I, S>(&mut self, seeds: I) -> Result<(), FuzzError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seeds: Vec<S> = seeds.into_iter().collect();
        for seed in seeds.iter() {
            let content = seed.as_ref();
            let len = content.chars().count();
            if len > self.config.max_len {
                return Err(FuzzError::SeedTooLong {
                    content: content.to_string(),
                    len,
                    max_len: self.config.max_len,
                });
            }
        }
        for seed in seeds.iter() {
            let content = seed.as_ref();
            if !self.corpus.insert_initial(content) {
                log::debug!("dropping duplicate initial seed {:?}", content);
                continue;
            }
            match self.evaluate(content) {
                Evaluation::Scored(report) => {
                    let improvement = self.update_best_scores(&report);
                    log::info!(
                        "initial seed {:?}: max score {:.4}, improvement {:.4}",
                        content,
                        report.max_score(),
                        improvement
                    );
                }
                Evaluation::Failed(outcome) => self.stats.record(&outcome),
            }
        }
        log::info!(
            "initialized corpus with {} seeds; global best {:.4}",
            self.corpus.len(),
            self.global_best
        );
        Ok(())
    }

    fn evaluate(&mut self, input: &str) -> Evaluation {
        self.stats.runs += 1;
        let traces = match self.runner.run(input) {
            Ok(traces) => traces,
            Err(e) => {
                log::warn!("run of {:?} failed: {}", input, e);
                return Evaluation::Failed(MutantOutcome::RunFailure);
            }
        };
        match score_traces(&traces) {
            Ok(report) => {
                self.global_best = self.global_best.max(report.max_score());
                Evaluation::Scored(report)
            }
            Err(e) => {
                log::warn!("analysis of the traces for {:?} failed: {}", input, e);
                Evaluation::Failed(MutantOutcome::AnalysisFailure)
            }
        }
    }

    /// Raises the best score of every AEC that beat it and returns the
    /// largest positive gain, `0.0` if none.
    fn update_best_scores(&mut self, report: &RedundancyReport) -> f64 {
        let mut improvement = 0.0f64;
        for (aec, r) in report.aecs.iter() {
            let best = self.best_scores.get(aec).copied().unwrap_or(0.0);
            if r.score > best {
                improvement = improvement.max(r.score - best);
                self.best_scores.insert(aec.clone(), r.score);
            }
        }
        improvement
    }

    /// One iteration: select a parent, evaluate its mutants in order, apply
    /// acceptance. Stops early between mutants if the stop flag is raised.
    pub fn step(
        &mut self,
        mut corpus_sink: Option<&mut (dyn CorpusSink + '_)>,
        mut progress: Option<&mut (dyn ProgressSink + '_)>,
    ) -> Result<Vec<MutantOutcome>, FuzzError> {
        let parent = self.corpus.pick_seed(&mut self.rng)?.content.clone();
        let mutants = mutate_siblings(&parent, self.config.mutants_per_iteration, &mut self.rng);
        log::debug!("parent {:?} -> mutants {:?}", parent, mutants);

        let mut outcomes = Vec::with_capacity(mutants.len());
        for mutant in mutants {
            if self.stopped() {
                break;
            }
            let outcome = match self.evaluate(&mutant) {
                Evaluation::Failed(outcome) => outcome,
                Evaluation::Scored(report) => {
                    let run_max = report.max_score();
                    let improvement = self.update_best_scores(&report);
                    if improvement <= self.config.threshold {
                        MutantOutcome::BelowThreshold {
                            improvement,
                            run_max,
                        }
                    } else if self.corpus.contains(&mutant) {
                        MutantOutcome::Duplicate {
                            improvement,
                            run_max,
                        }
                    } else {
                        self.corpus.add_seed(&mutant, self.config.decay)?;
                        self.corpus.boost_seed(&parent, self.config.boost);
                        log::info!(
                            "kept {:?} (parent {:?}): improvement {:.4}, run max {:.4}",
                            mutant,
                            parent,
                            improvement,
                            run_max
                        );
                        if let Some(sink) = corpus_sink.as_deref_mut() {
                            sink.on_new_seed(&mutant);
                        }
                        MutantOutcome::Accepted {
                            improvement,
                            run_max,
                        }
                    }
                }
            };
            self.stats.record(&outcome);
            if let Some(p) = progress.as_deref_mut() {
                p.on_progress(&FuzzProgress {
                    iters: self.stats.iterations + 1,
                    corpus_len: self.corpus.len(),
                    global_best: self.global_best,
                    mutant: mutant.clone(),
                    outcome: outcome.clone(),
                });
            }
            outcomes.push(outcome);
        }
        self.stats.iterations += 1;
        Ok(outcomes)
    }

    pub fn run(&mut self) -> Result<FuzzReport, FuzzError> {
        self.run_with_sinks(None, None)
    }

    pub fn run_with_sinks(
        &mut self,
        mut corpus_sink: Option<&mut (dyn CorpusSink + '_)>,
        mut progress: Option<&mut (dyn ProgressSink + '_)>,
    ) -> Result<FuzzReport, FuzzError> {
        let mut iters: u64 = 0;
        loop {
            if self.stopped() {
                log::info!("stop requested after {} iterations", iters);
                break;
            }
            if let Some(max) = self.config.max_iters {
                if iters >= max {
                    break;
                }
            }
            self.step(corpus_sink.as_deref_mut(), progress.as_deref_mut())?;
            iters += 1;
        }
        Ok(self.report(iters))
    }

    fn report(&self, iters: u64) -> FuzzReport {
        FuzzReport {
            iters,
            corpus_len: self.corpus.len(),
            global_best: self.global_best,
            aecs_seen: self.best_scores.len(),
            stats: self.stats.clone(),
        }
    }
}
