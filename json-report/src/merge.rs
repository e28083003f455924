// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combines reports produced by cooperating workers into one.

use indexmap::IndexMap;
use json_report_metadata::{CollectorRecord, NodeId, SessionReport, Summary, TestRecord};
use std::collections::BTreeMap;

/// Merges already-built reports, in order.
///
/// * Tests are keyed by identifier and kept in first-seen order. For each field, a value present
///   in a later report replaces the earlier one.
/// * Collectors are keyed by identifier, the later report winning. Warnings are concatenated.
/// * `created` is the earliest, `duration` the longest, `exitcode` the first non-zero one, and
///   `root` the first. Environments are merged key by key, later reports winning.
/// * The summary is recomputed from the merged tests, with the deselected counts of those reports
///   summed. The summaries of summary-only reports, which carry no tests to merge, are added on
///   top.
///
/// Returns `None` if `reports` is empty.
pub fn merge_reports(reports: impl IntoIterator<Item = SessionReport>) -> Option<SessionReport> {
    let mut reports = reports.into_iter();
    let first = reports.next()?;

    let mut merged = MergedReport::new(first);
    for report in reports {
        merged.add(report);
    }
    Some(merged.finish())
}

struct MergedReport {
    base: SessionReport,
    tests: Option<IndexMap<NodeId, TestRecord>>,
    collectors: Option<IndexMap<NodeId, CollectorRecord>>,
    deselected: usize,
    summary_only: Vec<Summary>,
}

impl MergedReport {
    fn new(mut first: SessionReport) -> Self {
        let mut merged = Self {
            tests: None,
            collectors: None,
            deselected: 0,
            summary_only: Vec::new(),
            base: SessionReport::new(
                first.created,
                first.duration,
                first.exitcode,
                std::mem::take(&mut first.root),
                Summary::default(),
            ),
        };
        merged.base.environment = std::mem::take(&mut first.environment);
        merged.add_records(first);
        merged
    }

    fn add(&mut self, mut report: SessionReport) {
        let base = &mut self.base;
        base.created = base.created.min(report.created);
        base.duration = base.duration.max(report.duration);
        if base.exitcode == 0 {
            base.exitcode = report.exitcode;
        }
        base.environment.append(&mut report.environment);
        self.add_records(report);
    }

    fn add_records(&mut self, report: SessionReport) {
        match &report.tests {
            Some(_) => self.deselected += report.summary.deselected,
            None => self.summary_only.push(report.summary),
        }

        if let Some(tests) = report.tests {
            let merged = self.tests.get_or_insert_with(IndexMap::new);
            for test in tests {
                match merged.get_mut(&test.nodeid) {
                    Some(existing) => merge_test(existing, test),
                    None => {
                        merged.insert(test.nodeid.clone(), test);
                    }
                }
            }
        }

        if let Some(collectors) = report.collectors {
            let merged = self.collectors.get_or_insert_with(IndexMap::new);
            for collector in collectors {
                merged.insert(collector.nodeid.clone(), collector);
            }
        }

        if let Some(mut warnings) = report.warnings {
            self.base
                .warnings
                .get_or_insert_with(Vec::new)
                .append(&mut warnings);
        }
    }

    fn finish(self) -> SessionReport {
        let Self {
            mut base,
            tests,
            collectors,
            deselected,
            mut summary_only,
        } = self;

        if let Some(tests) = &tests {
            summary_only.push(Summary::tally(tests.values(), deselected));
        }
        base.summary = sum_summaries(&summary_only);
        base.tests = tests.map(|tests| tests.into_values().collect());
        base.collectors = collectors.map(|collectors| collectors.into_values().collect());
        base
    }
}

fn merge_test(existing: &mut TestRecord, later: TestRecord) {
    let TestRecord {
        nodeid: _,
        lineno,
        keywords,
        outcome,
        setup,
        call,
        teardown,
        metadata,
        user_properties,
    } = later;

    fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
        if value.is_some() {
            *slot = value;
        }
    }

    overwrite(&mut existing.lineno, lineno);
    overwrite(&mut existing.keywords, keywords);
    overwrite(&mut existing.outcome, outcome);
    overwrite(&mut existing.setup, setup);
    overwrite(&mut existing.call, call);
    overwrite(&mut existing.teardown, teardown);
    overwrite(&mut existing.metadata, metadata);
    overwrite(&mut existing.user_properties, user_properties);
}

fn sum_summaries(summaries: &[Summary]) -> Summary {
    let mut outcomes = BTreeMap::new();
    let mut total = Summary::default();
    for summary in summaries {
        for (outcome, count) in &summary.outcomes {
            *outcomes.entry(*outcome).or_insert(0) += count;
        }
        total.total += summary.total;
        total.collected += summary.collected;
        total.deselected += summary.deselected;
    }
    total.outcomes = outcomes;
    total
}
