// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for JSON reports.
//!
//! Options are resolved from three layers, later layers winning: built-in defaults, the
//! `[json-report]` table of a TOML configuration file ([`ReportConfig`]), and command-line
//! overrides ([`ReportOverrides`]).

mod omit;
mod options;
mod report_config;
mod traceback;

pub use omit::*;
pub use options::*;
pub use report_config::*;
pub use traceback::*;
