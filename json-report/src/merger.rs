// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles per-test records from lifecycle notifications.
//!
//! Notifications for different tests interleave arbitrarily. For any one test, phases arrive in
//! setup, call, teardown order. The merger keeps one entry per test identifier in a keyed table,
//! created on the first notification that mentions it.

use crate::{
    config::{OmitCategory, ReportOptions},
    events::{CollectReport, FailureRepr, PhaseReport, TestItem},
    hooks::ReportHooks,
    log_capture::{LogCapture, PhaseCapture},
    metadata::MetadataAccumulator,
};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use json_report_metadata::{
    CollectorRecord, LogRecord, NodeId, Phase, StageEntry, StageRecord, TestOutcome, TestRecord,
    WarningRecord, WarningWhen,
};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};

/// The category used for warnings produced by the collector itself.
pub const REPORT_WARNING_CATEGORY: &str = "JsonReportWarning";

#[derive(Debug)]
struct TestEntry {
    record: TestRecord,
    path: Option<Utf8PathBuf>,
    // Set once a phase notification arrives. Entries created only by metadata contributions are
    // not reported.
    notified: bool,
    completed: [bool; 3],
    metadata: MetadataAccumulator,
    metadata_warned: bool,
    pending_logs: HashMap<Phase, Arc<Mutex<Vec<LogRecord>>>>,
}

impl TestEntry {
    fn new(id: NodeId) -> Self {
        Self {
            record: TestRecord::new(id),
            path: None,
            notified: false,
            completed: [false; 3],
            metadata: MetadataAccumulator::new(),
            metadata_warned: false,
            pending_logs: HashMap::new(),
        }
    }

    fn observe(&mut self, item: &TestItem, keywords: bool) {
        if self.path.is_none() {
            self.path = Some(item.path.clone());
        }
        if self.record.lineno.is_none() {
            self.record.lineno = item.lineno;
        }
        if keywords && self.record.keywords.is_none() {
            self.record.keywords = Some(item.keywords.clone());
        }
    }

    fn is_completed(&self, phase: Phase) -> bool {
        self.completed[phase_index(phase)]
    }

    fn is_settled(&self) -> bool {
        self.is_completed(Phase::Teardown)
    }

    fn warning(&self, message: String) -> WarningRecord {
        WarningRecord::new(
            REPORT_WARNING_CATEGORY,
            self.path.clone().unwrap_or_default(),
            self.record.lineno.unwrap_or(0),
            message,
            WarningWhen::Runtest,
        )
    }
}

fn test_entry<'a>(tests: &'a mut IndexMap<NodeId, TestEntry>, id: &NodeId) -> &'a mut TestEntry {
    tests
        .entry(id.clone())
        .or_insert_with(|| TestEntry::new(id.clone()))
}

fn take_records(buffer: &Mutex<Vec<LogRecord>>) -> Vec<LogRecord> {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}

fn phase_index(phase: Phase) -> usize {
    match phase {
        Phase::Setup => 0,
        Phase::Call => 1,
        Phase::Teardown => 2,
    }
}

/// Accumulates test, collection and warning records for one session.
#[derive(Debug)]
pub struct RecordMerger {
    options: ReportOptions,
    hooks: ReportHooks,
    log_capture: Option<LogCapture>,
    tests: IndexMap<NodeId, TestEntry>,
    collectors: IndexMap<NodeId, CollectorRecord>,
    // Child identifier to the identifier of the collector that reported it.
    collected_children: HashMap<NodeId, NodeId>,
    warnings: Vec<WarningRecord>,
    deselected: usize,
}

impl RecordMerger {
    /// Creates a new merger.
    pub fn new(options: ReportOptions, hooks: ReportHooks) -> Self {
        Self {
            options,
            hooks,
            log_capture: None,
            tests: IndexMap::new(),
            collectors: IndexMap::new(),
            collected_children: HashMap::new(),
            warnings: Vec::new(),
            deselected: 0,
        }
    }

    /// Captures `tracing` events into stage logs through `log_capture`.
    pub fn with_log_capture(mut self, log_capture: LogCapture) -> Self {
        self.log_capture = Some(log_capture);
        self
    }

    /// Returns the options in use.
    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Returns the registered hooks.
    pub fn hooks(&self) -> &ReportHooks {
        &self.hooks
    }

    /// Called when `phase` of `item` starts.
    ///
    /// Returns a guard that captures log events for the phase. The guard must be held while the
    /// phase runs; dropping it detaches the capture.
    pub fn on_phase_start(&mut self, item: &TestItem, phase: Phase) -> PhaseCapture {
        let keywords = !self.options.omits(OmitCategory::Keywords);
        let capture_logs = !self.options.omits(OmitCategory::Log);
        let entry = test_entry(&mut self.tests, &item.id);
        entry.observe(item, keywords);
        entry.notified = true;

        if entry.is_completed(phase) || entry.is_settled() {
            debug!("ignoring start of completed phase {phase} for {}", item.id);
            return PhaseCapture::inert();
        }

        match (&self.log_capture, capture_logs) {
            (Some(log_capture), true) => {
                let capture = log_capture.attach();
                entry.pending_logs.insert(phase, capture.buffer());
                capture
            }
            _ => PhaseCapture::inert(),
        }
    }

    /// Called when `phase` of `item` ends, with the host's report for the phase.
    ///
    /// Each phase of a test is recorded at most once. Reports for a phase that was already
    /// recorded, or for any phase after teardown, are ignored.
    pub fn on_phase_end(&mut self, item: &TestItem, mut report: PhaseReport) {
        let keywords = !self.options.omits(OmitCategory::Keywords);
        let omit_log = self.options.omits(OmitCategory::Log);
        let phase = report.phase;

        let entry = self.entry_mut(&item.id);
        entry.observe(item, keywords);
        entry.notified = true;
        if entry.is_completed(phase) || entry.is_settled() {
            debug!("ignoring repeated {phase} report for {}", item.id);
            return;
        }
        entry.completed[phase_index(phase)] = true;

        let captured = entry
            .pending_logs
            .remove(&phase)
            .map(|buffer| take_records(&buffer))
            .unwrap_or_default();
        if omit_log {
            report.log.clear();
        } else {
            let mut log = captured;
            log.append(&mut report.log);
            report.log = log;
        }

        let contributed = self.hooks.runtest_metadata(item, &report);
        let stage = match self.hooks.runtest_stage(&report) {
            Some(custom) => StageEntry::Custom(custom),
            None => StageEntry::Standard(self.make_stage(&report)),
        };

        let entry = self.entry_mut(&item.id);
        entry.metadata.extend(contributed);
        if let Some(status) = report.status
            && status != TestOutcome::Passed
        {
            entry.record.outcome = Some(status);
        }
        *entry.record.stage_mut(phase) = Some(stage);

        if phase == Phase::Teardown && !report.user_properties.is_empty() {
            self.attach_user_properties(&item.id, &report);
        }
        self.flush_metadata(&item.id);
    }

    /// Merges `mapping` into the metadata of the test `id`.
    ///
    /// Later contributions for the same key win. The metadata is validated when the current phase
    /// ends. Contributions after teardown are ignored.
    pub fn on_metadata_contributed(
        &mut self,
        id: &NodeId,
        phase: Phase,
        mapping: Map<String, Value>,
    ) {
        let entry = self.entry_mut(id);
        if entry.is_settled() {
            debug!("ignoring metadata for {id} contributed during {phase} after teardown");
            return;
        }
        entry.metadata.extend(mapping);
    }

    /// Returns the metadata accumulator for `item`, creating its entry if necessary.
    ///
    /// Returns `None` once the test's teardown has been recorded.
    pub fn metadata_for(&mut self, item: &TestItem) -> Option<&mut MetadataAccumulator> {
        let keywords = !self.options.omits(OmitCategory::Keywords);
        let entry = self.entry_mut(&item.id);
        if entry.is_settled() {
            debug!("not handing out metadata for {} after teardown", item.id);
            return None;
        }
        entry.observe(item, keywords);
        Some(&mut entry.metadata)
    }

    /// Called when the host completes a collection pass over a node.
    pub fn on_collection_result(&mut self, report: CollectReport) {
        if self.options.omits(OmitCategory::Collectors) {
            return;
        }

        let CollectReport {
            id,
            outcome,
            children,
            failure,
        } = report;
        for child in &children {
            self.collected_children
                .insert(child.nodeid.clone(), id.clone());
        }
        let record = CollectorRecord {
            nodeid: id.clone(),
            outcome,
            result: children,
            longrepr: failure.as_ref().map(|failure| failure.text().to_owned()),
        };
        self.collectors.insert(id, record);
    }

    /// Called when the host excludes items from the run after collection.
    ///
    /// Items that were never collected, or whose collection bookkeeping was already released, are
    /// skipped.
    pub fn on_deselected<'a>(&mut self, ids: impl IntoIterator<Item = &'a NodeId>) {
        let omit_collectors = self.options.omits(OmitCategory::Collectors);
        for id in ids {
            self.deselected += 1;
            if omit_collectors {
                continue;
            }

            let child = self
                .collected_children
                .get(id)
                .and_then(|collector| self.collectors.get_mut(collector))
                .and_then(|collector| {
                    collector
                        .result
                        .iter_mut()
                        .find(|child| child.nodeid == *id)
                });
            match child {
                Some(child) => child.deselected = true,
                None => debug!("deselected item {id} has no collection record"),
            }
        }
    }

    /// Called once the host has finished modifying the collected items.
    ///
    /// Deselections that arrive after this point no longer mark collection records.
    pub fn on_collection_modified(&mut self) {
        self.collected_children.clear();
    }

    /// Records a warning emitted during the session.
    pub fn on_warning(&mut self, warning: WarningRecord) {
        if !self.options.omits(OmitCategory::Warnings) {
            self.warnings.push(warning);
        }
    }

    /// Validates metadata for tests whose teardown never arrived.
    ///
    /// Settled tests are not revisited.
    pub fn settle(&mut self) {
        let unsettled: Vec<_> = self
            .tests
            .iter()
            .filter(|(_, entry)| !entry.is_settled())
            .map(|(id, _)| id.clone())
            .collect();
        for id in unsettled {
            self.flush_metadata(&id);
        }
        for entry in self.tests.values_mut() {
            entry.pending_logs.clear();
        }
    }

    /// Returns the records of tests that received at least one phase notification, in the order
    /// the tests were first seen.
    pub fn tests(&self) -> impl Iterator<Item = &TestRecord> {
        self.tests
            .values()
            .filter(|entry| entry.notified)
            .map(|entry| &entry.record)
    }

    /// Returns the record for test `id`, if it received a phase notification.
    pub fn test(&self, id: &str) -> Option<&TestRecord> {
        self.tests
            .get(id)
            .filter(|entry| entry.notified)
            .map(|entry| &entry.record)
    }

    /// Returns the collection records, in order of first report.
    pub fn collectors(&self) -> impl ExactSizeIterator<Item = &CollectorRecord> {
        self.collectors.values()
    }

    /// Returns the warnings recorded so far.
    pub fn warnings(&self) -> &[WarningRecord] {
        &self.warnings
    }

    /// Returns the number of items deselected after collection.
    pub fn deselected_count(&self) -> usize {
        self.deselected
    }

    fn entry_mut(&mut self, id: &NodeId) -> &mut TestEntry {
        test_entry(&mut self.tests, id)
    }

    fn make_stage(&self, report: &PhaseReport) -> StageRecord {
        let mut stage = StageRecord::new(report.outcome, report.duration);

        if !self.options.omits(OmitCategory::Streams) {
            stage.stdout = Some(report.stdout.clone()).filter(|s| !s.is_empty());
            stage.stderr = Some(report.stderr.clone()).filter(|s| !s.is_empty());
        }
        if !self.options.omits(OmitCategory::Log) && !report.log.is_empty() {
            stage.log = Some(report.log.clone());
        }

        match &report.failure {
            Some(FailureRepr::Text(text)) => {
                stage.longrepr = Some(text.clone());
            }
            Some(FailureRepr::Structured(failure)) => {
                stage.longrepr = Some(failure.text.clone());
                stage.crash = failure.crash.clone();
                if self.options.captures_frames() && !failure.traceback.is_empty() {
                    stage.traceback = Some(failure.traceback.clone());
                }
            }
            None => {}
        }

        stage
    }

    fn attach_user_properties(&mut self, id: &NodeId, report: &PhaseReport) {
        let properties: Result<Vec<_>, _> = report
            .user_properties
            .iter()
            .map(|(name, value)| {
                let value = value.as_value()?.clone();
                Ok::<_, &str>(Map::from_iter([(name.clone(), value)]))
            })
            .collect();

        match properties {
            Ok(properties) => {
                self.entry_mut(id).record.user_properties = Some(properties);
            }
            Err(error) => {
                warn!("user properties of {id} are not JSON-serializable: {error}");
                let warning = self
                    .entry_mut(id)
                    .warning(format!("User properties of {id} are not JSON-serializable."));
                self.on_warning(warning);
            }
        }
    }

    fn flush_metadata(&mut self, id: &NodeId) {
        let entry = self.entry_mut(id);
        if entry.metadata.is_empty() {
            return;
        }

        match entry.metadata.to_map().map_err(str::to_owned) {
            Ok(metadata) => {
                entry.record.metadata = Some(metadata);
            }
            Err(error) => {
                entry.metadata.clear();
                entry.record.metadata = None;
                if entry.metadata_warned {
                    debug!("metadata of {id} is still not JSON-serializable: {error}");
                    return;
                }
                entry.metadata_warned = true;
                warn!("metadata of {id} is not JSON-serializable: {error}");
                let warning = entry.warning(format!("Metadata of {id} is not JSON-serializable."));
                self.on_warning(warning);
            }
        }
    }
}
