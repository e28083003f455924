// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use json_report::errors::{ConfigParseError, SaveReportError};
use json_report_metadata::ReportExitCode;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// An error that occurred while reading a saved report.
#[derive(Debug, Error)]
pub enum ReportReadError {
    /// The report could not be read from disk.
    #[error("error reading report at {path}")]
    Read {
        /// The path of the report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The report is not a valid JSON report.
    #[error("error parsing report at {path}")]
    Parse {
        /// The path of the report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

// The #[error()] strings are placeholders: errors are meant to be printed with display_to_stderr.

/// An error that the command-line tool knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("error reading report")]
    ReportRead {
        #[from]
        error: ReportReadError,
    },
    #[error("error reading config file")]
    ConfigRead {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("error parsing config file")]
    ConfigParse {
        path: Utf8PathBuf,
        #[source]
        error: ConfigParseError,
    },
    #[error("error writing merged report")]
    ReportSave {
        #[from]
        error: SaveReportError,
    },
    #[error("error writing to standard output")]
    WriteStdout {
        #[source]
        error: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn config_read(path: Utf8PathBuf, error: std::io::Error) -> Self {
        Self::ConfigRead { path, error }
    }

    pub(crate) fn config_parse(path: Utf8PathBuf, error: ConfigParseError) -> Self {
        Self::ConfigParse { path, error }
    }

    pub(crate) fn write_stdout(error: impl Into<std::io::Error>) -> Self {
        Self::WriteStdout {
            error: error.into(),
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ReportRead { .. } => ReportExitCode::REPORT_READ_FAILED,
            Self::ConfigRead { .. } | Self::ConfigParse { .. } => {
                ReportExitCode::INVALID_ARGUMENTS
            }
            Self::ReportSave { .. } | Self::WriteStdout { .. } => {
                ReportExitCode::REPORT_WRITE_FAILED
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ReportRead { error } => {
                let (action, path) = match error {
                    ReportReadError::Read { path, .. } => ("reading", path),
                    ReportReadError::Parse { path, .. } => ("parsing", path),
                };
                tracing::error!("error {action} report at `{}`", path.style(styles.bold));
                error.source()
            }
            Self::ConfigRead { path, error } => {
                tracing::error!("failed to read config file `{}`", path.style(styles.bold));
                Some(error as &dyn Error)
            }
            Self::ConfigParse { path, error } => {
                tracing::error!("failed to parse config file `{}`", path.style(styles.bold));
                error.source()
            }
            Self::ReportSave { error } => {
                tracing::error!("{error}");
                error.source()
            }
            Self::WriteStdout { error } => {
                tracing::error!("failed to write to standard output");
                Some(error as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
