// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TracebackStyleParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// The traceback display style used by the host framework.
///
/// Only the detailed styles (`auto`, `long` and `short`) carry per-frame information, so
/// traceback frames are captured for those alone. Crash summaries and failure representations
/// are recorded regardless of the style.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TracebackStyle {
    /// Long tracebacks for the first and last entry, short ones for the rest.
    #[default]
    Auto,
    /// Exhaustive, informative tracebacks.
    Long,
    /// Shorter tracebacks.
    Short,
    /// A single line per failure.
    Line,
    /// The language runtime's own traceback formatting.
    Native,
    /// No traceback at all.
    No,
}

impl TracebackStyle {
    /// All styles.
    pub const ALL: [Self; 6] = [
        Self::Auto,
        Self::Long,
        Self::Short,
        Self::Line,
        Self::Native,
        Self::No,
    ];

    /// Returns string representations of all known variants.
    pub fn variants() -> [&'static str; 6] {
        Self::ALL.map(Self::as_str)
    }

    /// Returns the name of this style.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Long => "long",
            Self::Short => "short",
            Self::Line => "line",
            Self::Native => "native",
            Self::No => "no",
        }
    }

    /// Returns true if failures displayed in this style carry traceback frames.
    pub fn captures_frames(self) -> bool {
        match self {
            Self::Auto | Self::Long | Self::Short => true,
            Self::Line | Self::Native | Self::No => false,
        }
    }
}

impl fmt::Display for TracebackStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TracebackStyle {
    type Err = TracebackStyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| TracebackStyleParseError::new(s))
    }
}
