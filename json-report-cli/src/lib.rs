// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspects and merges JSON test reports.
//!
//! The `json-report` binary reads reports saved by the `json-report` collector. It can print the
//! summary of a report, or merge the reports written by several worker processes into one.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, OutputContext, StderrStyles};
