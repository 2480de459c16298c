// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use aectrace::redundancy::RedundancyAnalysis;
use aectrace::report::{RedundancyReport, SerializedReport};
use aectrace::source_location::render_aec;
use aectrace::TraceSource;
use anyhow::Context;
use clap::ArgMatches;

/// AECs at or above `min_score`, least redundant first, each followed by its
/// stack trace.
pub fn format_redundancies(report: &RedundancyReport, min_score: f64) -> String {
    let mut out = String::new();
    for (aec, r) in report.ranked(min_score) {
        out.push_str(&format!("Redundancy = {} {:?}\n", r.score, r.counts));
        out.push_str(&render_aec(aec, &report.line_numbers));
    }
    out
}

pub fn handle_redundancy(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .expect("input has a default value"),
    );
    let min_score = *matches
        .get_one::<f64>("min_score")
        .expect("min_score has a default value");

    let mut analysis = RedundancyAnalysis::new();
    analysis
        .process_trace(&TraceSource::File(input.clone()))
        .with_context(|| format!("cannot analyze trace {}", input.display()))?;
    let report = analysis.compute_redundancies();
    log::info!(
        "{}: {} AECs with heap loads, max redundancy {}",
        input.display(),
        report.aecs.len(),
        report.max_score()
    );

    print!("{}", format_redundancies(&report, min_score));

    if matches.get_flag("per_input") {
        for (label, aecs) in analysis.input_redundancies() {
            println!("Input = {}", label);
            let per_input = RedundancyReport {
                aecs,
                line_numbers: report.line_numbers.clone(),
            };
            print!("{}", format_redundancies(&per_input, min_score));
        }
    }

    if let Some(path) = matches.get_one::<String>("serialize") {
        SerializedReport::Redundancy(report)
            .save(path.as_ref())
            .with_context(|| format!("cannot write report {}", path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_only_redundant_aecs() {
        let mut analysis = RedundancyAnalysis::new();
        let trace = aectrace_test_helpers::TraceBuilder::new()
            .begin("p/M#main()V")
            .heap_load(1, 10, 1, "f")
            .call(2, 11, "p/M#get()I")
            .heap_load(3, 20, 1, "f")
            .heap_load(3, 20, 1, "f")
            .heap_load(3, 20, 2, "f")
            .heap_load(3, 20, 2, "f")
            .build();
        analysis
            .process_trace(&TraceSource::Text(trace))
            .unwrap();
        let got = format_redundancies(&analysis.compute_redundancies(), 0.0001);
        assert_eq!(
            got,
            "Redundancy = 0.25 [2, 2]\n  p.M#get(p/M.java:20)\n  p.M#main(p/M.java:11)\n"
        );
    }
}
