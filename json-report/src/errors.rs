// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while collecting and persisting JSON reports.

use crate::config::{OmitCategory, TracebackStyle};
use camino::Utf8PathBuf;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the `[json-report]` configuration.
#[derive(Debug, Error)]
#[error("failed to parse JSON report config")]
#[non_exhaustive]
pub struct ConfigParseError {
    #[source]
    err: toml::de::Error,
}

impl ConfigParseError {
    pub(crate) fn new(err: toml::de::Error) -> Self {
        Self { err }
    }
}

/// Error returned while parsing an [`OmitCategory`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for omitted field: {input}\n(known values: {})",
    OmitCategory::variants().join(", "),
)]
pub struct OmitCategoryParseError {
    input: String,
}

impl OmitCategoryParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Error returned while parsing a [`TracebackStyle`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for traceback style: {input}\n(known values: {})",
    TracebackStyle::variants().join(", "),
)]
pub struct TracebackStyleParseError {
    input: String,
}

impl TracebackStyleParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while saving a report to disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SaveReportError {
    /// The session has not finished, so there is no report to save.
    #[error("no report available")]
    NoReport,

    /// The directory the report should be written to could not be created.
    #[error("error creating directory {dir}")]
    CreateDir {
        /// The directory being created.
        dir: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// The report could not be written.
    #[error("error writing report to {path}")]
    Write {
        /// The output file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that occurred while turning a built report into a JSON object.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FinalizeError {
    /// The report could not be encoded.
    #[error("error encoding report")]
    Encode(#[from] serde_json::Error),

    /// The report encoded to something other than a JSON object.
    #[error("report did not encode to a JSON object")]
    NotAnObject,
}

/// Displays an error along with its chain of sources, on a single line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
