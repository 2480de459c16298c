// SPDX-License-Identifier: Apache-2.0

use colored::Colorize;

/// Prints the error headline in bold red, then one indented line per
/// underlying cause, and exits with status 1.
pub fn report_cli_error_and_exit(error: &anyhow::Error, subcommand: Option<&str>) -> ! {
    let subcommand_str = match subcommand {
        Some(subcommand) => format!("{}: ", subcommand),
        None => String::new(),
    };
    eprintln!(
        "aectrace-driver: {}{}",
        subcommand_str,
        error.to_string().red().bold()
    );
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    std::process::exit(1);
}
