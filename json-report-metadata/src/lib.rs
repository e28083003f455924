// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to JSON test reports.
//!
//! A JSON report is a single nested object describing one test session: per-test outcomes
//! broken down by phase (setup, call and teardown), captured output and logs, collection
//! results, warnings, and a summary block. The types in this crate mirror that object and can
//! be used to either produce or consume reports.
//!
//! For the collector that produces these reports, see the `json-report` crate.

mod exit_codes;
mod report;

pub use exit_codes::*;
pub use report::*;
