// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use json_report_cli::JsonReportApp;

fn main() -> Result<()> {
    color_eyre::install()?;

    let app = JsonReportApp::parse();
    let output = app.init_output();

    let stdout = std::io::stdout();
    match app.exec(output, &mut stdout.lock()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
