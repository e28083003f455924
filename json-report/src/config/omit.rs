// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::OmitCategoryParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// A section of the report that can be left out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OmitCategory {
    /// Collection results.
    Collectors,
    /// Captured log records.
    Log,
    /// Traceback frames of failures.
    Traceback,
    /// Captured standard output and standard error.
    Streams,
    /// Session warnings.
    Warnings,
    /// Test keywords.
    Keywords,
}

impl OmitCategory {
    /// All categories.
    pub const ALL: [Self; 6] = [
        Self::Collectors,
        Self::Log,
        Self::Traceback,
        Self::Streams,
        Self::Warnings,
        Self::Keywords,
    ];

    /// Returns string representations of all known variants.
    pub fn variants() -> [&'static str; 6] {
        Self::ALL.map(Self::as_str)
    }

    /// Returns the name of this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collectors => "collectors",
            Self::Log => "log",
            Self::Traceback => "traceback",
            Self::Streams => "streams",
            Self::Warnings => "warnings",
            Self::Keywords => "keywords",
        }
    }

    fn flag(self) -> OmitSet {
        match self {
            Self::Collectors => OmitSet::COLLECTORS,
            Self::Log => OmitSet::LOG,
            Self::Traceback => OmitSet::TRACEBACK,
            Self::Streams => OmitSet::STREAMS,
            Self::Warnings => OmitSet::WARNINGS,
            Self::Keywords => OmitSet::KEYWORDS,
        }
    }
}

impl fmt::Display for OmitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OmitCategory {
    type Err = OmitCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| OmitCategoryParseError::new(s))
    }
}

bitflags::bitflags! {
    /// A set of [`OmitCategory`] values.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct OmitSet: u8 {
        /// See [`OmitCategory::Collectors`].
        const COLLECTORS = 1 << 0;
        /// See [`OmitCategory::Log`].
        const LOG = 1 << 1;
        /// See [`OmitCategory::Traceback`].
        const TRACEBACK = 1 << 2;
        /// See [`OmitCategory::Streams`].
        const STREAMS = 1 << 3;
        /// See [`OmitCategory::Warnings`].
        const WARNINGS = 1 << 4;
        /// See [`OmitCategory::Keywords`].
        const KEYWORDS = 1 << 5;
    }
}

impl OmitSet {
    /// Returns true if `category` is omitted.
    pub fn omits(self, category: OmitCategory) -> bool {
        self.contains(category.flag())
    }

    /// Adds `category` to the set.
    pub fn add(&mut self, category: OmitCategory) {
        self.insert(category.flag());
    }

    /// Iterates over the omitted categories.
    pub fn categories(self) -> impl Iterator<Item = OmitCategory> {
        OmitCategory::ALL
            .into_iter()
            .filter(move |category| self.omits(*category))
    }
}

impl FromIterator<OmitCategory> for OmitSet {
    fn from_iter<I: IntoIterator<Item = OmitCategory>>(iter: I) -> Self {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl Extend<OmitCategory> for OmitSet {
    fn extend<I: IntoIterator<Item = OmitCategory>>(&mut self, iter: I) {
        for category in iter {
            self.add(category);
        }
    }
}
