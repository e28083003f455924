// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Collects the lifecycle notifications of a test session into a JSON report.
//!
//! The host test framework owns discovery and execution. It reports what happens through a
//! [`JsonReport`]:
//!
//! 1. [`JsonReport::on_session_start`] when the session begins.
//! 2. Collection, deselection, warning and per-phase notifications through the
//!    [`RecordMerger`] returned by [`JsonReport::merger_mut`].
//! 3. [`JsonReport::on_session_finish`] once everything has run. The report is built, passed
//!    through the [`ReportHooks`], kept in memory and saved to disk.
//!
//! The emitted data model lives in the `json-report-metadata` crate.

pub mod config;
pub mod errors;
pub mod events;
mod hooks;
mod log_capture;
mod merge;
mod merger;
mod metadata;
mod persist;
mod reporter;
pub mod serializer;
mod stopwatch;

pub use hooks::ReportHooks;
pub use log_capture::{LogCapture, LogCaptureLayer, PhaseCapture};
pub use merge::merge_reports;
pub use merger::{REPORT_WARNING_CATEGORY, RecordMerger};
pub use metadata::{JsonMetadata, MetadataAccumulator, SerializedValue};
pub use persist::save_report;
pub use reporter::{JsonReport, ReportMode, SaveStatus, TERMINAL_SUMMARY_TITLE, json_metadata};
