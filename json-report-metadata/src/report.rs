// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::{borrow::Borrow, collections::BTreeMap, fmt, time::Duration};

/// A stable identifier for a test or a collection node, unique within a session.
///
/// Identifiers are hierarchical paths with an optional parametrization suffix, for example
/// `tests/test_io.py::TestReader::test_read[utf-8]`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(SmolStr);

impl NodeId {
    /// Creates a new `NodeId`.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last `::`-separated component of the identifier.
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(self.as_str())
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The overall outcome of a test, as resolved by the host framework.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// The test passed.
    Passed,
    /// The test failed.
    Failed,
    /// The test was skipped.
    Skipped,
    /// The test failed, and was expected to.
    Xfailed,
    /// The test passed, but was expected to fail.
    Xpassed,
    /// A setup or teardown phase of the test errored out.
    Error,
}

impl TestOutcome {
    /// All outcomes, in summary order.
    pub const ALL: [Self; 6] = [
        Self::Passed,
        Self::Failed,
        Self::Skipped,
        Self::Xfailed,
        Self::Xpassed,
        Self::Error,
    ];

    /// Returns the name of this outcome as it appears in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Xfailed => "xfailed",
            Self::Xpassed => "xpassed",
            Self::Error => "error",
        }
    }

    /// Returns true if this outcome counts against the run.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three phases every test goes through.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fixtures and other prerequisites are being set up.
    Setup,
    /// The test body itself.
    Call,
    /// Fixtures are being torn down.
    Teardown,
}

impl Phase {
    /// All phases, in execution order.
    pub const ALL: [Self; 3] = [Self::Setup, Self::Call, Self::Teardown];

    /// Returns the name of this phase as it appears in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Call => "call",
            Self::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw outcome of a single phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseOutcome {
    /// The phase completed successfully.
    Passed,
    /// The phase raised a failure.
    Failed,
    /// The phase requested a skip.
    Skipped,
}

/// The outcome of collecting a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectOutcome {
    /// The node was collected successfully.
    Passed,
    /// Collecting the node failed, e.g. because of an import error.
    Failed,
}

/// The session stage during which a warning was emitted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningWhen {
    /// While the session was being configured.
    Config,
    /// While tests were being collected.
    Collect,
    /// While tests were running.
    Runtest,
}

/// A `{path, lineno, message}` triple, used for crash summaries and traceback frames.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileLocation {
    /// The source file.
    pub path: Utf8PathBuf,

    /// The line within `path`.
    pub lineno: u32,

    /// A short message, e.g. the exception summary for a crash or the function name for a frame.
    pub message: String,
}

impl FileLocation {
    /// Creates a new `FileLocation`.
    pub fn new(path: impl Into<Utf8PathBuf>, lineno: u32, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lineno,
            message: message.into(),
        }
    }
}

/// A log record captured while a phase was running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// The level, e.g. `INFO`.
    pub level: String,

    /// The logger name (the tracing target).
    pub name: String,

    /// The fully formatted message.
    pub msg: String,

    /// The module path the record was emitted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// The file the record was emitted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// The line the record was emitted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,

    /// Structured fields attached to the record, other than the message.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Creates a new log record with the given level, logger name and message.
    pub fn new(level: impl Into<String>, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            name: name.into(),
            msg: msg.into(),
            module: None,
            filename: None,
            lineno: None,
            fields: Map::new(),
        }
    }
}

/// The standard representation of a single phase of a test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageRecord {
    /// Time spent in this phase.
    ///
    /// This is serialized as the number of seconds.
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// The raw outcome of this phase.
    pub outcome: PhaseOutcome,

    /// Where the failure happened, if this phase failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crash: Option<FileLocation>,

    /// The frames leading to the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<FileLocation>>,

    /// Captured standard output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Captured standard error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Captured log records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<LogRecord>>,

    /// The human-readable failure representation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longrepr: Option<String>,
}

impl StageRecord {
    /// Creates a new stage with the given outcome and duration, and nothing else set.
    pub fn new(outcome: PhaseOutcome, duration: Duration) -> Self {
        Self {
            duration,
            outcome,
            crash: None,
            traceback: None,
            stdout: None,
            stderr: None,
            log: None,
            longrepr: None,
        }
    }
}

/// A stage as it appears in a report.
///
/// Stages are normally [`StageRecord`]s, but an extension hook may replace a stage with an
/// arbitrary JSON value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageEntry {
    /// The standard representation.
    Standard(StageRecord),

    /// A representation produced by an extension hook.
    Custom(Value),
}

impl StageEntry {
    /// Returns the standard representation, if this is one.
    pub fn as_standard(&self) -> Option<&StageRecord> {
        match self {
            Self::Standard(stage) => Some(stage),
            Self::Custom(_) => None,
        }
    }

    /// Returns the standard representation mutably, if this is one.
    pub fn as_standard_mut(&mut self) -> Option<&mut StageRecord> {
        match self {
            Self::Standard(stage) => Some(stage),
            Self::Custom(_) => None,
        }
    }
}

/// The aggregated record for a single test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// The identifier of this test.
    pub nodeid: NodeId,

    /// The line the test is defined on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,

    /// Keywords (markers, names of enclosing scopes) attached to the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// The outcome of the test. Absent means [`TestOutcome::Passed`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TestOutcome>,

    /// The setup phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<StageEntry>,

    /// The call phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<StageEntry>,

    /// The teardown phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown: Option<StageEntry>,

    /// Metadata contributed while the test ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Properties declared by the test, as single-key objects in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<Vec<Map<String, Value>>>,
}

impl TestRecord {
    /// Creates a new, empty record for the given test.
    pub fn new(nodeid: impl Into<NodeId>) -> Self {
        Self {
            nodeid: nodeid.into(),
            lineno: None,
            keywords: None,
            outcome: None,
            setup: None,
            call: None,
            teardown: None,
            metadata: None,
            user_properties: None,
        }
    }

    /// Returns the outcome of this test, defaulting to [`TestOutcome::Passed`].
    pub fn resolved_outcome(&self) -> TestOutcome {
        self.outcome.unwrap_or(TestOutcome::Passed)
    }

    /// Returns the stage for the given phase.
    pub fn stage(&self, phase: Phase) -> Option<&StageEntry> {
        match phase {
            Phase::Setup => self.setup.as_ref(),
            Phase::Call => self.call.as_ref(),
            Phase::Teardown => self.teardown.as_ref(),
        }
    }

    /// Returns the slot for the given phase.
    pub fn stage_mut(&mut self, phase: Phase) -> &mut Option<StageEntry> {
        match phase {
            Phase::Setup => &mut self.setup,
            Phase::Call => &mut self.call,
            Phase::Teardown => &mut self.teardown,
        }
    }
}

/// A child of a collection node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectItem {
    /// The identifier of the child.
    pub nodeid: NodeId,

    /// The kind of node, e.g. `Module` or `Function`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The line the child is defined on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,

    /// Set if the child was excluded from the run after collection.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deselected: bool,
}

impl CollectItem {
    /// Creates a new child descriptor.
    pub fn new(nodeid: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            nodeid: nodeid.into(),
            kind: kind.into(),
            lineno: None,
            deselected: false,
        }
    }

    /// Sets the line the child is defined on.
    pub fn set_lineno(&mut self, lineno: u32) -> &mut Self {
        self.lineno = Some(lineno);
        self
    }
}

/// The record for a collection node: a directory, a file, or a containing scope.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectorRecord {
    /// The identifier of the node.
    pub nodeid: NodeId,

    /// Whether collection succeeded.
    pub outcome: CollectOutcome,

    /// The children found while collecting this node.
    pub result: Vec<CollectItem>,

    /// The failure representation, if collection failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longrepr: Option<String>,
}

/// A warning emitted during the session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// The warning text.
    pub message: String,

    /// The warning category name.
    pub category: String,

    /// The session stage the warning was emitted in.
    pub when: WarningWhen,

    /// The file the warning points at.
    pub filename: Utf8PathBuf,

    /// The line within `filename`.
    pub lineno: u32,
}

impl WarningRecord {
    /// Creates a new warning record.
    pub fn new(
        category: impl Into<String>,
        filename: impl Into<Utf8PathBuf>,
        lineno: u32,
        message: impl Into<String>,
        when: WarningWhen,
    ) -> Self {
        Self {
            message: message.into(),
            category: category.into(),
            when,
            filename: filename.into(),
            lineno,
        }
    }
}

/// Summary counts for a session.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The number of tests per outcome. Outcomes with no tests are absent.
    #[serde(flatten)]
    pub outcomes: BTreeMap<TestOutcome, usize>,

    /// The number of tests in the report.
    pub total: usize,

    /// The number of tests collected, including deselected ones.
    pub collected: usize,

    /// The number of tests excluded from the run after collection.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub deselected: usize,
}

impl Summary {
    /// Computes summary counts over the given tests.
    ///
    /// Tests without an explicit outcome count as passed.
    pub fn tally<'a>(tests: impl IntoIterator<Item = &'a TestRecord>, deselected: usize) -> Self {
        let mut outcomes = BTreeMap::new();
        let mut total = 0;
        for test in tests {
            *outcomes.entry(test.resolved_outcome()).or_insert(0) += 1;
            total += 1;
        }
        Self {
            outcomes,
            total,
            collected: total + deselected,
            deselected,
        }
    }

    /// Returns the number of tests with the given outcome.
    pub fn count(&self, outcome: TestOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Returns the number of failed and errored tests.
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_failure())
            .map(|(_, count)| count)
            .sum()
    }
}

/// The root of a JSON report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// When the report was created, as seconds since the Unix epoch.
    pub created: f64,

    /// The time taken by the session.
    ///
    /// This is serialized as the number of seconds.
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// The exit code of the session.
    pub exitcode: i32,

    /// The session root directory.
    pub root: Utf8PathBuf,

    /// Information about the environment the session ran in.
    #[serde(default)]
    pub environment: Map<String, Value>,

    /// Summary counts.
    pub summary: Summary,

    /// Collection results. Absent for summary-only reports and when nothing was collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collectors: Option<Vec<CollectorRecord>>,

    /// Test records. Absent for summary-only reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestRecord>>,

    /// Warnings. Absent for summary-only reports and when no warnings were emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<WarningRecord>>,
}

impl SessionReport {
    /// Creates a new, summary-only report.
    pub fn new(
        created: f64,
        duration: Duration,
        exitcode: i32,
        root: impl Into<Utf8PathBuf>,
        summary: Summary,
    ) -> Self {
        Self {
            created,
            duration,
            exitcode,
            root: root.into(),
            environment: Map::new(),
            summary,
            collectors: None,
            tests: None,
            warnings: None,
        }
    }

    /// Returns the test records, or an empty slice for summary-only reports.
    pub fn tests(&self) -> &[TestRecord] {
        self.tests.as_deref().unwrap_or_default()
    }

    /// Looks up a test record by identifier.
    pub fn test(&self, nodeid: &str) -> Option<&TestRecord> {
        self.tests()
            .iter()
            .find(|test| test.nodeid.as_str() == nodeid)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(duration.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("tests/test_io.py::TestReader::test_read[utf-8]", "test_read[utf-8]" ; "nested")]
    #[test_case("tests/test_io.py", "tests/test_io.py" ; "module")]
    #[test_case("", "" ; "empty")]
    fn node_id_name(input: &str, expected: &str) {
        assert_eq!(NodeId::new(input).name(), expected);
    }

    #[test]
    fn summary_tally_defaults_to_passed() {
        let mut failed = TestRecord::new("t.py::test_fail");
        failed.outcome = Some(TestOutcome::Failed);
        let tests = [
            TestRecord::new("t.py::test_a"),
            TestRecord::new("t.py::test_b"),
            failed,
        ];

        let summary = Summary::tally(&tests, 0);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.collected, 3);
        assert_eq!(summary.count(TestOutcome::Passed), 2);
        assert_eq!(summary.count(TestOutcome::Failed), 1);
        assert_eq!(summary.count(TestOutcome::Skipped), 0);
        assert_eq!(summary.failure_count(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"passed": 2, "failed": 1, "total": 3, "collected": 3}),
            "deselected is absent when zero"
        );
    }

    #[test]
    fn summary_roundtrips_with_deselected() {
        let input = indoc! {r#"
            {"passed": 1, "error": 2, "total": 3, "collected": 5, "deselected": 2}
        "#};
        let summary: Summary = serde_json::from_str(input).unwrap();
        assert_eq!(summary.count(TestOutcome::Error), 2);
        assert_eq!(summary.deselected, 2);
        assert_eq!(summary.collected, 5);
    }

    #[test]
    fn stage_entry_falls_back_to_custom() {
        let standard = r#"{"duration": 0.5, "outcome": "failed", "longrepr": "boom"}"#;
        let standard: StageEntry = serde_json::from_str(standard).unwrap();
        let stage = standard.as_standard().expect("standard stage");
        assert_eq!(stage.outcome, PhaseOutcome::Failed);
        assert_eq!(stage.duration, Duration::from_millis(500));
        assert_eq!(stage.longrepr.as_deref(), Some("boom"));

        let custom: StageEntry = serde_json::from_str(r#"{"outcome": "passed"}"#).unwrap();
        assert_eq!(
            custom,
            StageEntry::Custom(serde_json::json!({"outcome": "passed"}))
        );

        let extra = r#"{"duration": 0.0, "outcome": "passed", "extra": 1}"#;
        let extra: StageEntry = serde_json::from_str(extra).unwrap();
        assert!(
            extra.as_standard().is_none(),
            "unknown keys keep the stage custom"
        );
    }

    #[test]
    fn test_record_omits_absent_fields() {
        let mut record = TestRecord::new("t.py::test_ok");
        record.lineno = Some(3);
        record.call = Some(StageEntry::Standard(StageRecord::new(
            PhaseOutcome::Passed,
            Duration::ZERO,
        )));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "nodeid": "t.py::test_ok",
                "lineno": 3,
                "call": {"duration": 0.0, "outcome": "passed"},
            })
        );
        assert_eq!(record.resolved_outcome(), TestOutcome::Passed);
    }

    #[test]
    fn collect_item_deselected_flag() {
        let mut item = CollectItem::new("t.py::test_a", "Function");
        item.set_lineno(4);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            serde_json::json!({"nodeid": "t.py::test_a", "type": "Function", "lineno": 4})
        );

        item.deselected = true;
        assert_eq!(serde_json::to_value(&item).unwrap()["deselected"], true);
    }
}
