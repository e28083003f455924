// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for the `json-report` command-line tool.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ReportExitCode {}

impl ReportExitCode {
    /// No errors occurred and the command exited normally.
    pub const OK: i32 = 0;

    /// The command-line arguments could not be parsed.
    pub const INVALID_ARGUMENTS: i32 = 2;

    /// A report could not be read or decoded.
    pub const REPORT_READ_FAILED: i32 = 3;

    /// A report could not be written.
    pub const REPORT_WRITE_FAILED: i32 = 4;

    /// The inspected report contains failed or errored tests.
    pub const TESTS_FAILED: i32 = 100;
}
