// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extension points for customizing reports.
//!
//! Handlers are invoked in registration order. Each hook documents how the results of several
//! handlers are combined.

use crate::events::{PhaseReport, TestItem};
use serde_json::{Map, Value};
use std::fmt;

type MetadataHandler =
    Box<dyn Fn(&TestItem, &PhaseReport) -> Option<Map<String, Value>> + Send + Sync>;
type StageHandler = Box<dyn Fn(&PhaseReport) -> Option<Value> + Send + Sync>;
type ModifyReportHandler = Box<dyn Fn(&mut Map<String, Value>) + Send + Sync>;

/// Registered extension handlers.
#[derive(Default)]
pub struct ReportHooks {
    runtest_metadata: Vec<MetadataHandler>,
    runtest_stage: Vec<StageHandler>,
    modify_report: Vec<ModifyReportHandler>,
}

impl ReportHooks {
    /// Creates an empty set of hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler contributing metadata at the end of every phase.
    ///
    /// Every non-empty result is shallow-merged into the test's metadata, with later handlers
    /// winning per key.
    pub fn on_runtest_metadata<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&TestItem, &PhaseReport) -> Option<Map<String, Value>> + Send + Sync + 'static,
    {
        self.runtest_metadata.push(Box::new(handler));
        self
    }

    /// Registers a handler overriding the representation of a stage.
    ///
    /// The first handler returning `Some` wins; later handlers are not called.
    pub fn on_runtest_stage(
        &mut self,
        handler: impl Fn(&PhaseReport) -> Option<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.runtest_stage.push(Box::new(handler));
        self
    }

    /// Registers a handler mutating the built report before it is stored and saved.
    ///
    /// All handlers run, exactly once per report.
    pub fn on_modify_report(
        &mut self,
        handler: impl Fn(&mut Map<String, Value>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.modify_report.push(Box::new(handler));
        self
    }

    pub(crate) fn runtest_metadata(
        &self,
        item: &TestItem,
        report: &PhaseReport,
    ) -> Map<String, Value> {
        let mut merged = Map::new();
        for handler in &self.runtest_metadata {
            if let Some(mapping) = handler(item, report) {
                merged.extend(mapping);
            }
        }
        merged
    }

    pub(crate) fn runtest_stage(&self, report: &PhaseReport) -> Option<Value> {
        self.runtest_stage
            .iter()
            .find_map(|handler| handler(report))
    }

    pub(crate) fn modify_report(&self, report: &mut Map<String, Value>) {
        for handler in &self.modify_report {
            handler(report);
        }
    }
}

impl fmt::Debug for ReportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportHooks")
            .field("runtest_metadata", &self.runtest_metadata.len())
            .field("runtest_stage", &self.runtest_stage.len())
            .field("modify_report", &self.modify_report.len())
            .finish()
    }
}
