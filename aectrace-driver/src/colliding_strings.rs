// SPDX-License-Identifier: Apache-2.0

use aectrace_fuzz::seed_gen::colliding_strings;
use clap::ArgMatches;

pub fn handle_colliding_strings(matches: &ArgMatches) -> anyhow::Result<()> {
    let pairs = *matches
        .get_one::<usize>("pairs")
        .expect("pairs is required");
    if pairs > 12 {
        anyhow::bail!("{} pairs would print 3^{} strings; use at most 12", pairs, pairs);
    }
    println!("{}", colliding_strings(pairs).join(" "));
    Ok(())
}
