// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{OmitCategory, ReportFile, TracebackStyle};
use crate::errors::ConfigParseError;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// The `[json-report]` table of a configuration file.
///
/// Every field is optional. Unset fields fall back to the defaults in
/// [`ReportOptions`](super::ReportOptions).
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Where to save the report. `"none"` disables saving.
    #[serde(default)]
    pub file: Option<ReportFile>,

    /// Categories to omit.
    #[serde(default)]
    pub omit: Option<Vec<OmitCategory>>,

    /// Whether to produce a summary-only report.
    #[serde(default)]
    pub summary: Option<bool>,

    /// Indentation for the saved document.
    #[serde(default)]
    pub indent: Option<usize>,

    /// Verbosity for the terminal summary.
    #[serde(default)]
    pub verbosity: Option<i32>,

    /// The host's traceback style.
    #[serde(default)]
    pub traceback_style: Option<TracebackStyle>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    #[serde(rename = "json-report", default)]
    json_report: ReportConfig,
}

impl ReportConfig {
    /// The name of the table this configuration is read from.
    pub const TABLE: &'static str = "json-report";

    /// Parses the `[json-report]` table out of a TOML document.
    ///
    /// Other tables are ignored, since the document is usually shared with the host. Unknown keys
    /// within `[json-report]` produce a warning.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigParseError> {
        let (config, unknown) = Self::deserialize_toml(contents).map_err(ConfigParseError::new)?;

        let prefix = format!("{}.", Self::TABLE);
        let unknown: Vec<_> = unknown
            .into_iter()
            .filter(|path| path.starts_with(&prefix))
            .collect();
        if !unknown.is_empty() {
            warn!(
                "ignoring unknown JSON report configuration keys: {}",
                unknown.join(", ")
            );
        }

        Ok(config)
    }

    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::de::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let document: ConfigDocument = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((document.json_report, unknown))
    }
}
