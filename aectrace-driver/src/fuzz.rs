// SPDX-License-Identifier: Apache-2.0

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aectrace_fuzz::session::{CorpusSink, FuzzProgress, MutantOutcome, ProgressSink};
use aectrace_fuzz::{CommandRunner, FuzzSession};
use anyhow::Context;
use clap::ArgMatches;

use crate::fuzz_config::{load_fuzz_config, resolve_fuzz_settings};

/// Appends accepted seeds, one per line. The first write error is kept and
/// reported once the session ends.
struct FileSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> CorpusSink for FileSink<W> {
    fn on_new_seed(&mut self, content: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{}", content).and_then(|_| self.writer.flush()) {
            self.error = Some(e);
        }
    }
}

struct StdoutProgressSink {
    best: f64,
}

impl ProgressSink for StdoutProgressSink {
    fn on_progress(&mut self, p: &FuzzProgress) {
        let (improvement, run_max) = match p.outcome {
            MutantOutcome::Accepted {
                improvement,
                run_max,
            }
            | MutantOutcome::BelowThreshold {
                improvement,
                run_max,
            }
            | MutantOutcome::Duplicate {
                improvement,
                run_max,
            } => (improvement, run_max),
            MutantOutcome::RunFailure | MutantOutcome::AnalysisFailure => {
                println!("Input = {} failed", p.mutant);
                return;
            }
        };
        println!("Input = {} Improvement = {:.5}", p.mutant, improvement);
        if let MutantOutcome::Accepted { .. } = p.outcome {
            println!("  ...adding to seeds!");
        }
        if run_max > self.best {
            self.best = run_max;
            println!(
                "  ...best input found so far! (MaxRedundancy = {})",
                run_max
            );
        }
    }
}

/// Non-empty lines of a previously written corpus file, if it exists.
fn read_corpus_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("cannot open {}", path.display())),
    };
    let mut seeds = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("cannot read {}", path.display()))?;
        if !line.is_empty() {
            seeds.push(line);
        }
    }
    Ok(seeds)
}

pub fn handle_fuzz(matches: &ArgMatches) -> anyhow::Result<()> {
    let file_config = match matches.get_one::<String>("config") {
        Some(path) => Some(load_fuzz_config(Path::new(path))?),
        None => None,
    };
    let settings = resolve_fuzz_settings(matches, &file_config)?;

    let mut seeds = settings.seed_inputs.clone();
    if let Some(corpus_path) = settings.corpus_file.as_ref() {
        let previous = read_corpus_file(corpus_path)?;
        log::info!(
            "loaded {} seeds from {}",
            previous.len(),
            corpus_path.display()
        );
        seeds.extend(previous);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })
        .context("cannot install the Ctrl-C handler")?;
    }

    let runner = CommandRunner::new(
        PathBuf::from(&settings.runner),
        settings.runner_args.clone(),
        settings.trace_files.clone(),
    );
    log::info!(
        "runner {} writes {:?}",
        runner.program().display(),
        runner.trace_files()
    );
    let mut session = FuzzSession::new(settings.config.clone(), runner);
    session.set_stop_flag(stop);
    log::info!("fuzz config: {:?}", session.config());
    session.initialize(&seeds)?;

    let mut progress = StdoutProgressSink {
        best: session.global_best(),
    };
    let report = match settings.corpus_file.as_ref() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open {} for append", path.display()))?;
            let mut sink = FileSink {
                writer: BufWriter::new(file),
                error: None,
            };
            let report = session.run_with_sinks(Some(&mut sink), Some(&mut progress))?;
            if let Some(e) = sink.error {
                return Err(e).with_context(|| format!("cannot append to {}", path.display()));
            }
            report
        }
        None => session.run_with_sinks(None, Some(&mut progress))?,
    };

    println!(
        "iterations={} corpus_len={} max_redundancy={} aecs_seen={} accepted={} run_failures={} analysis_failures={}",
        report.iters,
        report.corpus_len,
        report.global_best,
        report.aecs_seen,
        report.stats.accepted,
        report.stats.run_failures,
        report.stats.analysis_failures
    );
    Ok(())
}
