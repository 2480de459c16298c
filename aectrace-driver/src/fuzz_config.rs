// SPDX-License-Identifier: Apache-2.0

//! Settings for the `fuzz` subcommand. A value given on the command line
//! wins over the `[fuzz]` table of the `--config` file, which wins over the
//! built-in default.

use std::path::{Path, PathBuf};

use aectrace_fuzz::FuzzConfig;
use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches};
use serde::Deserialize;

pub const DEFAULT_TRACE_FILE: &str = "main.log";
pub const DEFAULT_SEED_INPUTS: [&str; 4] = ["ABC", "ABCD", "abCD", "AAAAbcd"];

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FuzzFileConfig {
    /// Program invoked as `<runner> <runner_args...> <input>`.
    pub runner: Option<String>,
    pub runner_args: Option<Vec<String>>,

    /// Trace files the runner writes for every input.
    pub trace_files: Option<Vec<String>>,

    pub seed_inputs: Option<Vec<String>>,

    /// Accepted seeds are appended here; existing lines are loaded as extra
    /// initial seeds.
    pub corpus_file: Option<String>,

    pub seed: Option<u64>,
    pub max_iters: Option<u64>,
    pub max_len: Option<usize>,
    pub mutants_per_iteration: Option<usize>,
    pub threshold: Option<f64>,
    pub decay: Option<f64>,
    pub boost: Option<f64>,
}

#[derive(Deserialize)]
struct FuzzToml {
    fuzz: FuzzFileConfig,
}

pub fn parse_fuzz_config(text: &str) -> anyhow::Result<FuzzFileConfig> {
    let parsed: FuzzToml = toml::from_str(text).context("invalid fuzz config")?;
    Ok(parsed.fuzz)
}

pub fn load_fuzz_config(path: &Path) -> anyhow::Result<FuzzFileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read fuzz config {}", path.display()))?;
    log::info!("using fuzz config {}", path.display());
    parse_fuzz_config(&text)
}

/// Everything the `fuzz` subcommand needs, after precedence is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzSettings {
    pub config: FuzzConfig,
    pub runner: String,
    pub runner_args: Vec<String>,
    pub trace_files: Vec<PathBuf>,
    pub seed_inputs: Vec<String>,
    pub corpus_file: Option<PathBuf>,
}

pub fn add_fuzz_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        Arg::new("runner")
            .long("runner")
            .value_name("PROGRAM")
            .help("Program that runs the instrumented target on one input")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("runner_arg")
            .long("runner-arg")
            .value_name("ARG")
            .help("Argument passed to the runner before the input; repeatable")
            .allow_hyphen_values(true)
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("trace_file")
            .long("trace-file")
            .value_name("PATH")
            .help("Trace file written by the runner; repeatable (default main.log)")
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("seed_input")
            .long("seed-input")
            .value_name("INPUT")
            .help("Initial seed; repeatable")
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("max_len")
            .long("max-len")
            .value_name("N")
            .help("Longest allowed initial seed")
            .value_parser(value_parser!(usize))
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("max_iters")
            .long("max-iters")
            .value_name("N")
            .help("Stop after this many iterations (default: until Ctrl-C)")
            .value_parser(value_parser!(u64))
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("seed")
            .long("seed")
            .value_name("N")
            .help("Random seed")
            .value_parser(value_parser!(u64))
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("config")
            .long("config")
            .value_name("TOML")
            .help("Path to a TOML file with a [fuzz] table")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("corpus_file")
            .long("corpus-file")
            .value_name("PATH")
            .help("File accepted seeds are appended to, one per line")
            .action(ArgAction::Set),
    )
}

fn many(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
}

pub fn resolve_fuzz_settings(
    matches: &ArgMatches,
    file: &Option<FuzzFileConfig>,
) -> anyhow::Result<FuzzSettings> {
    let empty = FuzzFileConfig::default();
    let file = file.as_ref().unwrap_or(&empty);
    let defaults = FuzzConfig::default();

    let runner = match matches.get_one::<String>("runner").or(file.runner.as_ref()) {
        Some(runner) => runner.clone(),
        None => bail!("no runner given; pass --runner or set `runner` in the config file"),
    };

    let config = FuzzConfig {
        seed: matches
            .get_one::<u64>("seed")
            .copied()
            .or(file.seed)
            .unwrap_or(defaults.seed),
        max_iters: matches
            .get_one::<u64>("max_iters")
            .copied()
            .or(file.max_iters),
        max_len: matches
            .get_one::<usize>("max_len")
            .copied()
            .or(file.max_len)
            .unwrap_or(defaults.max_len),
        mutants_per_iteration: file
            .mutants_per_iteration
            .unwrap_or(defaults.mutants_per_iteration),
        threshold: file.threshold.unwrap_or(defaults.threshold),
        decay: file.decay.unwrap_or(defaults.decay),
        boost: file.boost.unwrap_or(defaults.boost),
    };
    if config.mutants_per_iteration == 0 {
        bail!("mutants_per_iteration must be at least 1");
    }
    if !(0.0..1.0).contains(&config.decay) {
        bail!("decay must be in [0, 1); got {}", config.decay);
    }
    if config.boost < 0.0 || config.threshold < 0.0 {
        bail!("boost and threshold must not be negative");
    }

    let trace_files = many(matches, "trace_file")
        .or_else(|| file.trace_files.clone())
        .unwrap_or_else(|| vec![DEFAULT_TRACE_FILE.to_string()]);
    let seed_inputs = many(matches, "seed_input")
        .or_else(|| file.seed_inputs.clone())
        .unwrap_or_else(|| DEFAULT_SEED_INPUTS.iter().map(|s| s.to_string()).collect());

    Ok(FuzzSettings {
        config,
        runner,
        runner_args: many(matches, "runner_arg")
            .or_else(|| file.runner_args.clone())
            .unwrap_or_default(),
        trace_files: trace_files.into_iter().map(PathBuf::from).collect(),
        seed_inputs,
        corpus_file: matches
            .get_one::<String>("corpus_file")
            .or(file.corpus_file.as_ref())
            .map(PathBuf::from),
    })
}
