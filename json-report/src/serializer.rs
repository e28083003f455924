// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds session reports out of accumulated records.

use crate::{
    config::{OmitCategory, ReportOptions},
    errors::FinalizeError,
    hooks::ReportHooks,
    merger::RecordMerger,
};
use camino::Utf8PathBuf;
use json_report_metadata::{Phase, SessionReport, StageEntry, Summary};
use serde::Serialize;
use serde_json::{Map, Value, ser::PrettyFormatter};
use std::{io, time::Duration};

/// Session-level fields of a report.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionInfo {
    /// When the report was created, as seconds since the Unix epoch.
    pub created: f64,

    /// How long the session took.
    pub duration: Duration,

    /// The process exit code.
    pub exit_code: i32,

    /// The session root directory.
    pub root: Utf8PathBuf,

    /// Environment metadata.
    pub environment: Map<String, Value>,
}

/// Builds a report from the current state of `merger`.
///
/// This does not modify the merger: callers that want metadata of unfinished tests validated
/// should call [`RecordMerger::settle`] first.
pub fn build(
    session: &SessionInfo,
    merger: &RecordMerger,
    options: &ReportOptions,
) -> SessionReport {
    let summary = Summary::tally(merger.tests(), merger.deselected_count());
    let mut report = SessionReport::new(
        session.created,
        session.duration,
        session.exit_code,
        session.root.clone(),
        summary,
    );
    report.environment = session.environment.clone();

    if !options.summary_only {
        let collectors: Vec<_> = merger.collectors().cloned().collect();
        report.collectors = (!collectors.is_empty()).then_some(collectors);
        report.tests = Some(merger.tests().cloned().collect());
        report.warnings = (!merger.warnings().is_empty()).then(|| merger.warnings().to_vec());
    }

    redact(&mut report, options);
    report
}

/// Removes everything `options` excludes from an already-built report.
///
/// Custom stages produced by hooks are left as they are.
pub fn redact(report: &mut SessionReport, options: &ReportOptions) {
    if options.summary_only {
        report.collectors = None;
        report.tests = None;
        report.warnings = None;
        return;
    }

    if options.omits(OmitCategory::Collectors) {
        report.collectors = None;
    }
    if options.omits(OmitCategory::Warnings) {
        report.warnings = None;
    }

    for test in report.tests.iter_mut().flatten() {
        if options.omits(OmitCategory::Keywords) {
            test.keywords = None;
        }
        for phase in Phase::ALL {
            let Some(stage) = test
                .stage_mut(phase)
                .as_mut()
                .and_then(StageEntry::as_standard_mut)
            else {
                continue;
            };
            if options.omits(OmitCategory::Streams) {
                stage.stdout = None;
                stage.stderr = None;
            }
            if options.omits(OmitCategory::Log) {
                stage.log = None;
            }
            if options.omits(OmitCategory::Traceback) {
                stage.traceback = None;
            }
        }
    }
}

/// Converts a built report to a JSON object and runs the report-modification hooks over it.
pub fn finalize(
    report: &SessionReport,
    hooks: &ReportHooks,
) -> Result<Map<String, Value>, FinalizeError> {
    let Value::Object(mut map) = serde_json::to_value(report)? else {
        return Err(FinalizeError::NotAnObject);
    };
    hooks.modify_report(&mut map);
    Ok(map)
}

/// Writes `value` as JSON, compact if `indent` is `None` and pretty-printed otherwise.
pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    writer: impl io::Write,
    indent: Option<usize>,
) -> serde_json::Result<()> {
    match indent {
        Some(width) => {
            let indent = " ".repeat(width);
            let formatter = PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
            value.serialize(&mut serializer)
        }
        None => serde_json::to_writer(writer, value),
    }
}
