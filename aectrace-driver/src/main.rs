// SPDX-License-Identifier: Apache-2.0

//! Command line driver for trace redundancy analysis.
//!
//! Commands are given like:
//!
//! ```text
//! aectrace-driver <command> <command-args-and-options>
//! ```
//!
//! Commands are:
//!
//! - redundancy: Scores the heap-load redundancy of every acyclic execution
//!   context (AEC) in a trace.
//! - count-cycles: Counts branch executions per AEC and shows the hottest.
//! - diff: Compares two reports saved with `--serialize`.
//! - maximizing-inputs: For every branch, names the input that executed it
//!   most often.
//! - fuzz: Mutates inputs to maximize redundancy, driving an external runner.
//! - colliding-strings: Prints strings with equal Java hash codes.
//!
//! Sample usage:
//!
//! ```shell
//! $ cargo run -- redundancy --input main.log --serialize before.bin
//! $ cargo run -- count-cycles --input main.log
//! $ cargo run -- diff before.bin after.bin
//! $ cargo run -- fuzz --runner ./datatraces.sh --runner-arg main.Main \
//!     --max-iters 100
//! ```

mod colliding_strings;
mod count_cycles;
mod diff;
mod fuzz;
mod fuzz_config;
mod maximizing_inputs;
mod redundancy;
mod report_cli_error;

use clap::{value_parser, Arg, ArgAction, ArgMatches};
use report_cli_error::report_cli_error_and_exit;

trait AppExt {
    fn add_input_arg(self) -> Self;
    fn add_serialize_arg(self) -> Self;
}

impl AppExt for clap::Command {
    fn add_input_arg(self) -> Self {
        self.arg(
            Arg::new("input")
                .long("input")
                .value_name("TRACE")
                .help("Trace file containing the event log")
                .default_value("main.log")
                .action(ArgAction::Set),
        )
    }

    fn add_serialize_arg(self) -> Self {
        self.arg(
            Arg::new("serialize")
                .long("serialize")
                .value_name("PATH")
                .help("Also save the report to this file for a later diff")
                .action(ArgAction::Set),
        )
    }
}

fn build_cli() -> clap::Command {
    clap::Command::new("aectrace-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Acyclic execution context analyses over instrumentation traces")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            clap::Command::new("redundancy")
                .about("Scores heap-load redundancy per AEC")
                .add_input_arg()
                .add_serialize_arg()
                .arg(
                    Arg::new("min_score")
                        .long("min-score")
                        .value_name("F")
                        .help("Hide AECs scoring below this")
                        .value_parser(value_parser!(f64))
                        .default_value("0.0001")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("per_input")
                        .long("per-input")
                        .help("Also print redundancy per '# End <input>' section")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            clap::Command::new("count-cycles")
                .about("Counts branch executions per AEC")
                .add_input_arg()
                .add_serialize_arg(),
        )
        .subcommand(
            clap::Command::new("diff")
                .about("Prints per-AEC differences between two saved reports")
                .arg(
                    Arg::new("before")
                        .help("Report of the first run")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("after")
                        .help("Report of the second run")
                        .required(true)
                        .index(2),
                ),
        )
        .subcommand(
            clap::Command::new("maximizing-inputs")
                .about("Finds the input that executes each branch most often")
                .add_input_arg(),
        )
        .subcommand(fuzz_config::add_fuzz_args(
            clap::Command::new("fuzz").about("Searches for inputs with high memory redundancy"),
        ))
        .subcommand(
            clap::Command::new("colliding-strings")
                .about("Prints all strings of N blocks from An, BO, C0")
                .arg(
                    Arg::new("pairs")
                        .help("Number of two-character blocks")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .index(1),
                ),
        )
}

fn dispatch(subcommand: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    match subcommand {
        "redundancy" => redundancy::handle_redundancy(matches),
        "count-cycles" => count_cycles::handle_count_cycles(matches),
        "diff" => diff::handle_diff(matches),
        "maximizing-inputs" => maximizing_inputs::handle_maximizing_inputs(matches),
        "fuzz" => fuzz::handle_fuzz(matches),
        "colliding-strings" => colliding_strings::handle_colliding_strings(matches),
        other => anyhow::bail!("unknown subcommand {}", other),
    }
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "aectrace-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let matches = build_cli().get_matches();
    let Some((subcommand, sub_matches)) = matches.subcommand() else {
        report_cli_error_and_exit(&anyhow::anyhow!("no subcommand given"), None);
    };
    if let Err(e) = dispatch(subcommand, sub_matches) {
        report_cli_error_and_exit(&e, Some(subcommand));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn redundancy_defaults() {
        let m = build_cli()
            .try_get_matches_from(["aectrace-driver", "redundancy"])
            .unwrap();
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "redundancy");
        assert_eq!(sub.get_one::<String>("input").unwrap(), "main.log");
        assert_eq!(*sub.get_one::<f64>("min_score").unwrap(), 0.0001);
        assert!(!sub.get_flag("per_input"));
        assert!(sub.get_one::<String>("serialize").is_none());
    }

    #[test_case("count-cycles"; "count cycles")]
    #[test_case("maximizing-inputs"; "maximizing inputs")]
    fn input_is_overridable(subcommand: &str) {
        let m = build_cli()
            .try_get_matches_from(["aectrace-driver", subcommand, "--input", "run2.log"])
            .unwrap();
        let (_, sub) = m.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("input").unwrap(), "run2.log");
    }

    #[test]
    fn diff_requires_two_reports() {
        assert!(build_cli()
            .try_get_matches_from(["aectrace-driver", "diff", "a.bin"])
            .is_err());
    }
}
