// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use aectrace::branch_maximizers::{BranchMaximizers, MaximizingInput};
use aectrace::TraceSource;
use anyhow::Context;
use clap::ArgMatches;

/// `<count> <location>[.<arm>] <input>` per branch outcome.
pub fn format_maximizing_inputs(entries: &[MaximizingInput]) -> String {
    let mut out = String::new();
    for m in entries {
        let arm = m
            .outcome
            .arm
            .map(|arm| format!(".{}", arm))
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {}{} {}\n",
            m.count, m.source_location, arm, m.input
        ));
    }
    out
}

pub fn handle_maximizing_inputs(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .expect("input has a default value"),
    );
    let mut maximizers = BranchMaximizers::new();
    maximizers
        .process_trace(&TraceSource::File(input.clone()))
        .with_context(|| format!("cannot analyze trace {}", input.display()))?;
    log::info!("{} inputs in {}", maximizers.input_count(), input.display());
    print!(
        "{}",
        format_maximizing_inputs(&maximizers.maximizing_inputs())
    );
    Ok(())
}
