// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session-level collector.

use crate::{
    config::{ReportFile, ReportOptions},
    errors::{DisplayErrorChain, SaveReportError},
    events::{SessionEnd, TestItem},
    hooks::ReportHooks,
    log_capture::LogCapture,
    merger::RecordMerger,
    metadata::{JsonMetadata, MetadataAccumulator},
    persist,
    serializer::{self, SessionInfo},
    stopwatch::{StopwatchStart, stopwatch, unix_seconds},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use std::io;
use swrite::{SWrite, swriteln};
use tracing::{debug, info, warn};

/// The title of the terminal summary section.
pub const TERMINAL_SUMMARY_TITLE: &str = "JSON report";

const TERMINAL_WIDTH: usize = 80;

/// Whether this process assembles reports or only collects data for another process.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportMode {
    /// Builds and saves the session report.
    Controller,

    /// Collects per-phase data but never builds or saves a report.
    Worker,
}

/// What happened to the report at the end of the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SaveStatus {
    /// The report was saved to this path.
    Saved(Utf8PathBuf),

    /// The report could not be saved.
    Failed(String),

    /// Saving was disabled.
    Skipped,
}

impl SaveStatus {
    /// Returns the one-line status message.
    pub fn message(&self) -> String {
        match self {
            Self::Saved(path) => format!("report saved to: {path}"),
            Self::Failed(error) => format!("could not save report: {error}"),
            Self::Skipped => "report auto-save skipped".to_owned(),
        }
    }

    /// Returns the verbosity the host must be at for the status to be shown.
    pub fn min_verbosity(&self) -> i32 {
        match self {
            Self::Saved(_) | Self::Failed(_) => 0,
            Self::Skipped => 1,
        }
    }
}

/// Collects a JSON report over one test session.
///
/// The host drives the [`RecordMerger`] (through [`merger_mut`](Self::merger_mut)) with lifecycle
/// notifications between [`on_session_start`](Self::on_session_start) and
/// [`on_session_finish`](Self::on_session_finish).
#[derive(Debug)]
pub struct JsonReport {
    mode: ReportMode,
    merger: RecordMerger,
    start: Option<StopwatchStart>,
    report: Option<Map<String, Value>>,
    status: Option<SaveStatus>,
}

impl JsonReport {
    /// Creates a collector that builds and saves the session report.
    pub fn new(options: ReportOptions, hooks: ReportHooks) -> Self {
        Self::with_mode(ReportMode::Controller, options, hooks)
    }

    /// Creates a collector for a worker process.
    pub fn worker(options: ReportOptions, hooks: ReportHooks) -> Self {
        Self::with_mode(ReportMode::Worker, options, hooks)
    }

    fn with_mode(mode: ReportMode, options: ReportOptions, hooks: ReportHooks) -> Self {
        Self {
            mode,
            merger: RecordMerger::new(options.normalized(), hooks),
            start: None,
            report: None,
            status: None,
        }
    }

    /// Captures `tracing` events into stage logs through `log_capture`.
    pub fn with_log_capture(mut self, log_capture: LogCapture) -> Self {
        self.merger = self.merger.with_log_capture(log_capture);
        self
    }

    /// Returns the mode of this collector.
    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    /// Returns the options in use.
    pub fn options(&self) -> &ReportOptions {
        self.merger.options()
    }

    /// Returns the record merger.
    pub fn merger(&self) -> &RecordMerger {
        &self.merger
    }

    /// Returns the record merger, for delivering lifecycle notifications.
    pub fn merger_mut(&mut self) -> &mut RecordMerger {
        &mut self.merger
    }

    /// Called when the session starts.
    pub fn on_session_start(&mut self) {
        debug!("JSON report session started ({:?})", self.mode);
        self.start = Some(stopwatch());
    }

    /// Called when the session finishes.
    ///
    /// Builds the report, runs the report-modification hooks, keeps the result in memory, and
    /// saves it if a target file is configured. Failures to save are recorded in the
    /// [status](Self::status) rather than returned. Workers do nothing here.
    pub fn on_session_finish(&mut self, end: SessionEnd) {
        if self.mode == ReportMode::Worker {
            debug!("worker session finished, not building a report");
            return;
        }

        self.merger.settle();

        let snapshot = self.start.get_or_insert_with(stopwatch).snapshot();
        let session = SessionInfo {
            created: unix_seconds(snapshot.end_time()),
            duration: snapshot.duration,
            exit_code: end.exit_code,
            root: end.root,
            environment: end.environment,
        };
        let built = serializer::build(&session, &self.merger, self.merger.options());
        let report = match serializer::finalize(&built, self.merger.hooks()) {
            Ok(report) => report,
            Err(error) => {
                let error = DisplayErrorChain::new(&error).to_string();
                warn!("failed to finalize JSON report: {error}");
                self.status = Some(SaveStatus::Failed(error));
                return;
            }
        };
        self.report = Some(report);

        let status = match &self.options().file {
            ReportFile::Path(path) => match self.save_report(path) {
                Ok(()) => {
                    info!("JSON report saved to {path}");
                    SaveStatus::Saved(path.clone())
                }
                Err(error) => {
                    let error = DisplayErrorChain::new(&error).to_string();
                    warn!("could not save JSON report: {error}");
                    SaveStatus::Failed(error)
                }
            },
            ReportFile::Disabled => SaveStatus::Skipped,
        };
        self.status = Some(status);
    }

    /// Returns the finalized report, once the session has finished.
    pub fn report(&self) -> Option<&Map<String, Value>> {
        self.report.as_ref()
    }

    /// Returns what happened to the report at the end of the session.
    pub fn status(&self) -> Option<&SaveStatus> {
        self.status.as_ref()
    }

    /// Saves the finalized report to `path`.
    pub fn save_report(&self, path: &Utf8Path) -> Result<(), SaveReportError> {
        let report = self.report.as_ref().ok_or(SaveReportError::NoReport)?;
        persist::save_report(report, path, self.options().indent)
    }

    /// Returns the terminal summary section, if it should be shown at `host_verbosity`.
    ///
    /// A configured verbosity takes precedence over the host's.
    pub fn terminal_summary(&self, host_verbosity: i32) -> Option<String> {
        let status = self.status.as_ref()?;
        let verbosity = self.options().verbosity.unwrap_or(host_verbosity);
        if status.min_verbosity() > verbosity {
            return None;
        }

        let mut out = String::new();
        let title = format!(" {TERMINAL_SUMMARY_TITLE} ");
        swriteln!(out, "{title:-^TERMINAL_WIDTH$}");
        swriteln!(out, "{}", status.message());
        Some(out)
    }

    /// Writes the terminal summary section to `writer`, if it should be shown.
    pub fn write_terminal_summary(
        &self,
        mut writer: impl io::Write,
        host_verbosity: i32,
    ) -> io::Result<()> {
        match self.terminal_summary(host_verbosity) {
            Some(summary) => writer.write_all(summary.as_bytes()),
            None => Ok(()),
        }
    }
}

/// Returns a handle for contributing metadata to `item`.
///
/// With reporting disabled (`report` is `None`), or once the test's teardown has been recorded,
/// the handle is an inert container whose contents are discarded.
pub fn json_metadata<'a>(
    report: Option<&'a mut JsonReport>,
    item: &TestItem,
) -> JsonMetadata<'a> {
    match report.and_then(|report| report.merger_mut().metadata_for(item)) {
        Some(accumulator) => JsonMetadata::Live(accumulator),
        None => JsonMetadata::Inert(MetadataAccumulator::new()),
    }
}
