// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{OmitCategory, OmitSet, ReportConfig, TracebackStyle};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{convert::Infallible, fmt, str::FromStr};

/// Where a report is saved.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(from = "String")]
pub enum ReportFile {
    /// Save the report to this path.
    Path(Utf8PathBuf),

    /// Don't save the report automatically.
    Disabled,
}

impl ReportFile {
    /// The path reports are saved to by default.
    pub const DEFAULT_PATH: &'static str = ".report.json";

    /// The value that disables automatic saving. Matched case-insensitively.
    pub const DISABLED: &'static str = "none";

    /// Returns the path, if saving is enabled.
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Disabled => None,
        }
    }
}

impl Default for ReportFile {
    fn default() -> Self {
        Self::Path(Self::DEFAULT_PATH.into())
    }
}

impl FromStr for ReportFile {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<String> for ReportFile {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case(Self::DISABLED) {
            Self::Disabled
        } else {
            Self::Path(s.into())
        }
    }
}

impl fmt::Display for ReportFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Disabled => f.write_str(Self::DISABLED),
        }
    }
}

/// Command-line overrides for report options.
///
/// Unset fields fall through to the configuration file and then to the defaults.
#[derive(Clone, Debug, Default)]
pub struct ReportOverrides {
    /// Overrides the report file.
    pub file: Option<ReportFile>,

    /// Categories to omit. A non-empty list replaces the configured one.
    pub omit: Vec<OmitCategory>,

    /// Produces a summary-only report if set.
    pub summary_only: bool,

    /// Overrides the indentation level.
    pub indent: Option<usize>,

    /// Overrides the verbosity used to decide whether to print the terminal summary.
    pub verbosity: Option<i32>,

    /// Overrides the traceback style.
    pub traceback_style: Option<TracebackStyle>,
}

/// Options controlling how a report is built, saved, and announced.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReportOptions {
    /// Where the report is saved at the end of the session.
    pub file: ReportFile,

    /// Categories left out of the report.
    pub omit: OmitSet,

    /// If set, the report holds only the session fields and the summary.
    pub summary_only: bool,

    /// Indentation for the saved document. `None` produces compact output.
    pub indent: Option<usize>,

    /// The verbosity to use for the terminal summary, in place of the host's.
    pub verbosity: Option<i32>,

    /// The traceback style used by the host.
    pub traceback_style: TracebackStyle,
}

impl ReportOptions {
    /// Resolves options from configuration and command-line overrides.
    pub fn resolve(config: &ReportConfig, overrides: &ReportOverrides) -> Self {
        let mut options = Self::default();

        if let Some(file) = &config.file {
            options.file = file.clone();
        }
        if let Some(omit) = &config.omit {
            options.omit = omit.iter().copied().collect();
        }
        if let Some(summary_only) = config.summary {
            options.summary_only = summary_only;
        }
        options.indent = config.indent;
        options.verbosity = config.verbosity;
        if let Some(style) = config.traceback_style {
            options.traceback_style = style;
        }

        if let Some(file) = &overrides.file {
            options.file = file.clone();
        }
        if !overrides.omit.is_empty() {
            options.omit = overrides.omit.iter().copied().collect();
        }
        options.summary_only |= overrides.summary_only;
        if let Some(indent) = overrides.indent {
            options.indent = Some(indent);
        }
        if let Some(verbosity) = overrides.verbosity {
            options.verbosity = Some(verbosity);
        }
        if let Some(style) = overrides.traceback_style {
            options.traceback_style = style;
        }

        options.normalized()
    }

    /// Returns true if `category` is left out of the report.
    pub fn omits(&self, category: OmitCategory) -> bool {
        self.omit.omits(category)
    }

    /// Returns true if traceback frames should be captured for failures.
    pub fn captures_frames(&self) -> bool {
        self.traceback_style.captures_frames() && !self.omits(OmitCategory::Traceback)
    }

    /// Returns these options with derived omissions applied.
    ///
    /// The `no` traceback style implies omitting tracebacks.
    pub fn normalized(mut self) -> Self {
        if self.traceback_style == TracebackStyle::No {
            self.omit.add(OmitCategory::Traceback);
        }
        self
    }
}
