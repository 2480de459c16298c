// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use aectrace::cycle_count::CycleCounter;
use aectrace::report::{CycleCountReport, SerializedReport};
use aectrace::source_location::render_aec;
use aectrace::TraceSource;
use anyhow::Context;
use clap::ArgMatches;

pub fn format_top_aec(report: &CycleCountReport) -> String {
    let mut out = format!("{} distinct AECs found.\n", report.counts.len());
    if let Some((aec, count)) = report.top() {
        out.push_str(&format!("Count = {}\n", count));
        out.push_str(&render_aec(aec, &report.line_numbers));
    }
    out
}

pub fn handle_count_cycles(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .expect("input has a default value"),
    );
    let mut counter = CycleCounter::new();
    counter
        .process_trace(&TraceSource::File(input.clone()))
        .with_context(|| format!("cannot analyze trace {}", input.display()))?;
    let report = counter.report();
    print!("{}", format_top_aec(&report));

    if let Some(path) = matches.get_one::<String>("serialize") {
        SerializedReport::CycleCounts(report)
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
    fn empty_report_prints_only_the_total() {
        assert_eq!(
            format_top_aec(&CycleCountReport::default()),
            "0 distinct AECs found.\n"
        );
    }

    #[test]
    fn hottest_aec_is_printed() {
        let mut counter = CycleCounter::new();
        counter
            .process_trace(&TraceSource::Text(
                "BEGIN p/M#main()V\nBRANCH(1,0,3)\nBRANCH(2,0,4)\nBRANCH(2,1,4)\n".to_string(),
            ))
            .unwrap();
        assert_eq!(
            format_top_aec(&counter.report()),
            "2 distinct AECs found.\nCount = 2\n  p.M#main(p/M.java:4)\n"
        );
    }
}
