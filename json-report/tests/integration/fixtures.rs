// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A simulated host session over a small, fixed test module.

use json_report::{
    JsonReport, LogCapture, ReportHooks,
    config::ReportOptions,
    events::{CollectReport, FailureRepr, PhaseReport, SessionEnd, StructuredFailure, TestItem},
};
use json_report_metadata::{
    CollectItem, CollectOutcome, FileLocation, NodeId, Phase, PhaseOutcome, TestOutcome,
    WarningRecord, WarningWhen,
};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;

pub(crate) const MODULE: &str = "test_sample.py";

/// How a phase of a fixture test ends.
#[derive(Clone, Debug)]
pub(crate) struct Step {
    outcome: PhaseOutcome,
    status: TestOutcome,
    stdout: &'static str,
    stderr: &'static str,
    log: Option<&'static str>,
    failure: Option<FailureRepr>,
}

impl Step {
    fn passed() -> Self {
        Self {
            outcome: PhaseOutcome::Passed,
            status: TestOutcome::Passed,
            stdout: "",
            stderr: "",
            log: None,
            failure: None,
        }
    }

    fn failed(status: TestOutcome, failure: impl Into<FailureRepr>) -> Self {
        Self {
            outcome: PhaseOutcome::Failed,
            status,
            failure: Some(failure.into()),
            ..Self::passed()
        }
    }

    fn skipped(status: TestOutcome, reason: &str) -> Self {
        Self {
            outcome: PhaseOutcome::Skipped,
            status,
            failure: Some(reason.into()),
            ..Self::passed()
        }
    }

    fn with_output(mut self, stdout: &'static str, stderr: &'static str) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    fn with_log(mut self, message: &'static str) -> Self {
        self.log = Some(message);
        self
    }
}

/// A test in the fixture module, with the way each of its phases ends.
#[derive(Clone, Debug)]
pub(crate) struct FixtureTest {
    pub(crate) item: TestItem,
    pub(crate) setup: Step,
    pub(crate) call: Option<Step>,
    pub(crate) teardown: Step,
}

impl FixtureTest {
    fn new(name: &str, lineno: u32) -> Self {
        let mut item = TestItem::new(format!("{MODULE}::{name}"), MODULE);
        item.set_lineno(lineno).add_keywords([name, MODULE]);
        Self {
            item,
            setup: Step::passed(),
            call: Some(Step::passed()),
            teardown: Step::passed(),
        }
    }

    fn setup(mut self, step: Step) -> Self {
        self.setup = step;
        self
    }

    fn call(mut self, step: Option<Step>) -> Self {
        self.call = step;
        self
    }

    fn teardown(mut self, step: Step) -> Self {
        self.teardown = step;
        self
    }
}

pub(crate) fn nested_failure() -> StructuredFailure {
    let mut failure = StructuredFailure::new(
        "TypeError: unsupported operand type(s) for -: 'int' and 'NoneType'",
    );
    failure
        .set_crash(FileLocation::new(
            MODULE,
            55,
            "TypeError: unsupported operand type(s) for -: 'int' and 'NoneType'",
        ))
        .add_frames([
            FileLocation::new(MODULE, 66, ""),
            FileLocation::new(MODULE, 64, "in foo"),
            FileLocation::new(MODULE, 60, "in bar"),
            FileLocation::new(MODULE, 55, "TypeError"),
        ]);
    failure
}

/// The ten tests of the fixture module.
pub(crate) fn sample_tests() -> Vec<FixtureTest> {
    let mut assert_false = StructuredFailure::new(
        "def test_fail_with_fixture():\n>       assert False\nE       assert False",
    );
    assert_false
        .set_crash(FileLocation::new(MODULE, 31, "assert False"))
        .add_frames([FileLocation::new(MODULE, 31, "AssertionError")]);

    vec![
        FixtureTest::new("test_pass", 24),
        FixtureTest::new("test_fail_with_fixture", 27)
            .setup(Step::passed().with_output("setup\n", "setuperr\n"))
            .call(Some(
                Step::failed(TestOutcome::Failed, assert_false)
                    .with_output("call\n", "callerr\n")
                    .with_log("calling the fixture"),
            ))
            .teardown(Step::passed().with_output("teardown\n", "teardownerr\n")),
        FixtureTest::new("test_xfail", 33)
            .call(Some(Step::skipped(TestOutcome::Xfailed, "reason: testing xfail"))),
        FixtureTest::new("test_xfail_but_passing", 37).call(Some(Step {
            status: TestOutcome::Xpassed,
            ..Step::passed()
        })),
        FixtureTest::new("test_fail_during_setup", 40)
            .setup(Step::failed(TestOutcome::Error, "fixture setup failed: assert False"))
            .call(None),
        FixtureTest::new("test_fail_during_teardown", 43)
            .teardown(Step::failed(TestOutcome::Error, "finalizer failed: assert False")),
        FixtureTest::new("test_skip", 46)
            .setup(Step::skipped(
                TestOutcome::Skipped,
                "('test_sample.py', 46, 'Skipped: testing skip')",
            ))
            .call(None),
        FixtureTest::new("test_fail_nested", 50)
            .call(Some(Step::failed(TestOutcome::Failed, nested_failure()))),
        FixtureTest::new("test_parametrized[1]", 68),
        FixtureTest::new("test_parametrized[2]", 68)
            .call(Some(Step::failed(TestOutcome::Failed, "assert 2 == 1"))),
    ]
}

pub(crate) fn collect_reports(tests: &[FixtureTest]) -> Vec<CollectReport> {
    let session = CollectReport::new(
        "",
        CollectOutcome::Passed,
        vec![CollectItem::new(MODULE, "Module")],
    );
    let children = tests
        .iter()
        .map(|test| {
            let mut child = CollectItem::new(test.item.id.clone(), "Function");
            if let Some(lineno) = test.item.lineno {
                child.set_lineno(lineno);
            }
            child
        })
        .collect();
    let module = CollectReport::new(MODULE, CollectOutcome::Passed, children);
    vec![session, module]
}

fn phase_report(test: &FixtureTest, phase: Phase, step: &Step) -> PhaseReport {
    let mut report = PhaseReport::new(
        test.item.id.clone(),
        phase,
        step.outcome,
        Duration::from_millis(3),
    );
    report
        .set_status(step.status)
        .set_stdout(step.stdout)
        .set_stderr(step.stderr);
    if let Some(failure) = &step.failure {
        report.set_failure(failure.clone());
    }
    report
}

type DuringCall<'a> = Box<dyn Fn(&mut JsonReport, &TestItem) + 'a>;

/// Ways a test can interfere with the simulated session.
#[derive(Default)]
pub(crate) struct SessionScript<'a> {
    /// Items deselected after collection.
    pub(crate) deselect: Vec<NodeId>,

    /// Called while the call phase of each test runs.
    pub(crate) during_call: Option<DuringCall<'a>>,

    /// Whether to emit a warning while running tests.
    pub(crate) warn: bool,
}

/// Runs a full session over `tests` and returns the finished collector.
pub(crate) fn run_session(
    options: ReportOptions,
    hooks: ReportHooks,
    tests: &[FixtureTest],
    script: SessionScript<'_>,
) -> JsonReport {
    let log_capture = LogCapture::new();
    let subscriber = tracing_subscriber::registry().with(log_capture.layer());
    let mut report = JsonReport::new(options, hooks).with_log_capture(log_capture);

    tracing::subscriber::with_default(subscriber, || {
        report.on_session_start();
        for collected in collect_reports(tests) {
            report.merger_mut().on_collection_result(collected);
        }
        report.merger_mut().on_deselected(&script.deselect);
        report.merger_mut().on_collection_modified();

        for test in tests
            .iter()
            .filter(|test| !script.deselect.contains(&test.item.id))
        {
            run_phase(&mut report, test, Phase::Setup, &test.setup, None);
            if let Some(call) = &test.call {
                run_phase(
                    &mut report,
                    test,
                    Phase::Call,
                    call,
                    script.during_call.as_deref(),
                );
            }
            run_phase(&mut report, test, Phase::Teardown, &test.teardown, None);
        }

        if script.warn {
            report.merger_mut().on_warning(WarningRecord::new(
                "DeprecationWarning",
                MODULE,
                12,
                "sample API is deprecated",
                WarningWhen::Runtest,
            ));
        }

        let mut end = SessionEnd::new(1, "/work/sample");
        end.environment = json!({"Platform": "linux"})
            .as_object()
            .cloned()
            .unwrap_or_default();
        report.on_session_finish(end);
    });

    report
}

fn run_phase(
    report: &mut JsonReport,
    test: &FixtureTest,
    phase: Phase,
    step: &Step,
    during: Option<&(dyn Fn(&mut JsonReport, &TestItem) + '_)>,
) {
    let capture = report.merger_mut().on_phase_start(&test.item, phase);
    if let Some(message) = step.log {
        tracing::info!(target: "sample", "{message}");
    }
    if let Some(during) = during {
        during(report, &test.item);
    }
    drop(capture);
    report
        .merger_mut()
        .on_phase_end(&test.item, phase_report(test, phase, step));
}
