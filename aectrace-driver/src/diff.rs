// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use aectrace::report::{
    diff_cycle_counts, diff_redundancy, RedundancyDelta, ReportDiff, ReportError,
    SerializedReport,
};
use aectrace::source_location::render_aec;
use anyhow::Context;
use clap::ArgMatches;

/// Per-AEC changes, most negative first.
pub fn format_redundancy_diff(diff: &ReportDiff<RedundancyDelta>) -> String {
    let mut entries: Vec<_> = diff.deltas.iter().collect();
    entries.sort_by(|a, b| a.1.score.total_cmp(&b.1.score));
    let mut out = String::new();
    for (aec, delta) in entries {
        out.push_str(&format!(
            "Diff = {} loads={:+} locations={:+}\n",
            delta.score, delta.loads, delta.locations
        ));
        out.push_str(&render_aec(aec, &diff.line_numbers));
    }
    out
}

pub fn format_cycle_diff(diff: &ReportDiff<i64>) -> String {
    let mut entries: Vec<_> = diff.deltas.iter().collect();
    entries.sort_by_key(|(_, delta)| **delta);
    let mut out = String::new();
    for (aec, delta) in entries {
        out.push_str(&format!("Diff = {}\n", delta));
        out.push_str(&render_aec(aec, &diff.line_numbers));
    }
    out
}

/// Diffs two saved reports of the same kind (`after - before`).
pub fn diff_reports(before: &SerializedReport, after: &SerializedReport) -> Result<String, ReportError> {
    match (before, after) {
        (SerializedReport::Redundancy(b), SerializedReport::Redundancy(a)) => {
            Ok(format_redundancy_diff(&diff_redundancy(b, a)?))
        }
        (SerializedReport::CycleCounts(b), SerializedReport::CycleCounts(a)) => {
            Ok(format_cycle_diff(&diff_cycle_counts(b, a)?))
        }
        _ => Err(ReportError::KindMismatch {
            before: before.kind_name(),
            after: after.kind_name(),
        }),
    }
}

fn load(path: &str) -> anyhow::Result<SerializedReport> {
    SerializedReport::load(Path::new(path)).with_context(|| format!("cannot load report {}", path))
}

pub fn handle_diff(matches: &ArgMatches) -> anyhow::Result<()> {
    let before_path = matches
        .get_one::<String>("before")
        .expect("before is required");
    let after_path = matches
        .get_one::<String>("after")
        .expect("after is required");
    let before = load(before_path)?;
    let after = load(after_path)?;
    let text = diff_reports(&before, &after)
        .with_context(|| format!("cannot diff {} against {}", before_path, after_path))?;
    print!("{}", text);
    Ok(())
}
