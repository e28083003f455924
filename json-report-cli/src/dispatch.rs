// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line parsing and command execution.

use crate::{
    errors::{ExpectedError, ReportReadError, Result},
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use json_report::{
    SaveStatus,
    config::{
        OmitCategory, ReportConfig, ReportFile, ReportOptions, ReportOverrides, TracebackStyle,
    },
    merge_reports, save_report,
    serializer::{redact, write_json},
};
use json_report_metadata::{ReportExitCode, SessionReport, TestOutcome};
use owo_colors::OwoColorize;
use std::io::Write;
use tracing::{debug, info};

/// Inspects and merges JSON test reports.
#[derive(Debug, Parser)]
#[command(version, max_term_width = 100)]
pub struct JsonReportApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl JsonReportApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, writing command output to `stdout`.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, stdout: &mut dyn Write) -> Result<i32> {
        match self.command {
            Command::Summary(opts) => opts.exec(output, stdout),
            Command::Merge(opts) => opts.exec(output, stdout),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the summary of a saved report.
    ///
    /// Exits with a non-zero code if the report contains failed or errored tests.
    Summary(SummaryOpts),

    /// Merge reports written by worker processes into a single report.
    Merge(MergeOpts),
}

#[derive(Debug, Args)]
struct SummaryOpts {
    /// The report to summarize.
    #[arg(value_name = "FILE")]
    file: Utf8PathBuf,
}

impl SummaryOpts {
    fn exec(self, output: OutputContext, stdout: &mut dyn Write) -> Result<i32> {
        let report = read_report(&self.file)?;
        let summary = &report.summary;
        let styles = output.summary_styles();

        writeln!(
            stdout,
            "{} tests ran in {:.2}s (root: {})",
            summary.total.style(styles.count), report.duration.as_secs_f64(), report.root,
        )
        .map_err(ExpectedError::write_stdout)?;
        for outcome in TestOutcome::ALL {
            let count = summary.count(outcome);
            if count > 0 {
                writeln!(
                    stdout,
                    "{:>8} {}",
                    count.style(styles.count), outcome.style(styles.outcome(outcome)),
                )
                .map_err(ExpectedError::write_stdout)?;
            }
        }
        if summary.deselected > 0 {
            writeln!(
                stdout,
                "{:>8} deselected",
                summary.deselected.style(styles.count)
            )
            .map_err(ExpectedError::write_stdout)?;
        }

        if summary.failure_count() > 0 {
            Ok(ReportExitCode::TESTS_FAILED)
        } else {
            Ok(ReportExitCode::OK)
        }
    }
}

#[derive(Debug, Args)]
struct MergeOpts {
    /// The reports to merge, in order.
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    files: Vec<Utf8PathBuf>,

    /// Where to write the merged report.
    ///
    /// Defaults to the configured report file. If saving is disabled there, the merged report is
    /// written to standard output.
    #[arg(long, short = 'o', value_name = "OUT")]
    output: Option<Utf8PathBuf>,

    #[clap(flatten)]
    report: ReportOpts,
}

impl MergeOpts {
    fn exec(self, output: OutputContext, stdout: &mut dyn Write) -> Result<i32> {
        let options = self.report.resolve()?;

        let mut reports = Vec::with_capacity(self.files.len());
        for path in &self.files {
            reports.push(read_report(path)?);
        }
        let Some(mut merged) = merge_reports(reports) else {
            // clap requires at least one file.
            return Ok(ReportExitCode::OK);
        };
        redact(&mut merged, &options);

        let target = match self.output {
            Some(path) => ReportFile::Path(path),
            None => options.file.clone(),
        };
        let status = match target {
            ReportFile::Path(path) => {
                save_report(&merged, &path, options.indent)?;
                SaveStatus::Saved(path)
            }
            ReportFile::Disabled => {
                write_json(&merged, &mut *stdout, options.indent)
                    .map_err(ExpectedError::write_stdout)?;
                writeln!(stdout).map_err(ExpectedError::write_stdout)?;
                SaveStatus::Skipped
            }
        };

        let verbosity = options.verbosity.unwrap_or(output.verbosity());
        if status.min_verbosity() <= verbosity {
            info!("{}", status.message());
        }

        Ok(ReportExitCode::OK)
    }
}

/// Options controlling the shape of a written report.
///
/// Command-line values take precedence over the `[json-report]` table of `--config`.
#[derive(Debug, Args)]
#[command(next_help_heading = "Report options")]
struct ReportOpts {
    /// Configuration file with a [json-report] table
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Where to save the report ("none" to disable saving)
    #[arg(long = "json-report-file", value_name = "PATH")]
    file: Option<ReportFile>,

    /// Categories to leave out of the report
    #[arg(
        long = "json-report-omit",
        value_name = "CATEGORY",
        value_delimiter = ',',
        num_args = 1..,
    )]
    omit: Vec<OmitCategory>,

    /// Only keep the session fields and the summary
    #[arg(long = "json-report-summary")]
    summary_only: bool,

    /// Indentation for the report (compact if unset)
    #[arg(long = "json-report-indent", value_name = "N")]
    indent: Option<usize>,

    /// Verbosity for status messages, in place of --verbose
    #[arg(
        long = "json-report-verbosity",
        value_name = "LEVEL",
        allow_negative_numbers = true
    )]
    verbosity: Option<i32>,

    /// Traceback style of the failures in the report
    #[arg(long = "tb", value_name = "STYLE")]
    traceback_style: Option<TracebackStyle>,
}

impl ReportOpts {
    fn resolve(&self) -> Result<ReportOptions> {
        let config = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|error| ExpectedError::config_read(path.clone(), error))?;
                ReportConfig::from_toml_str(&contents)
                    .map_err(|error| ExpectedError::config_parse(path.clone(), error))?
            }
            None => ReportConfig::default(),
        };

        let overrides = ReportOverrides {
            file: self.file.clone(),
            omit: self.omit.clone(),
            summary_only: self.summary_only,
            indent: self.indent,
            verbosity: self.verbosity,
            traceback_style: self.traceback_style,
        };
        Ok(ReportOptions::resolve(&config, &overrides))
    }
}

fn read_report(path: &Utf8Path) -> Result<SessionReport, ReportReadError> {
    let contents = std::fs::read_to_string(path).map_err(|error| ReportReadError::Read {
        path: path.to_owned(),
        error,
    })?;
    let report: SessionReport =
        serde_json::from_str(&contents).map_err(|error| ReportReadError::Parse {
            path: path.to_owned(),
            error,
        })?;
    debug!("read report at {path} ({} tests)", report.summary.total);
    Ok(report)
}
