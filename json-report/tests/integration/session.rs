// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{MODULE, SessionScript, run_session, sample_tests};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, eyre};
use json_report::{
    JsonReport, REPORT_WARNING_CATEGORY, ReportHooks, SaveStatus, TERMINAL_SUMMARY_TITLE,
    config::{OmitCategory, ReportFile, ReportOptions},
    events::{SessionEnd, TestItem},
    json_metadata,
};
use json_report_metadata::{NodeId, SessionReport, TestOutcome, WarningRecord, WarningWhen};
use pretty_assertions::assert_eq;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use test_case::test_case;

fn options_without_file() -> ReportOptions {
    ReportOptions {
        file: ReportFile::Disabled,
        ..Default::default()
    }
}

fn run_sample(options: ReportOptions, script: SessionScript<'_>) -> JsonReport {
    run_session(options, ReportHooks::new(), &sample_tests(), script)
}

fn finished_report(report: &JsonReport) -> Result<&Map<String, Value>> {
    report
        .report()
        .ok_or_else(|| eyre!("session finished without a report"))
}

fn test_entry<'a>(report: &'a Map<String, Value>, name: &str) -> Result<&'a Value> {
    let id = format!("{MODULE}::{name}");
    report["tests"]
        .as_array()
        .and_then(|tests| tests.iter().find(|test| test["nodeid"] == id.as_str()))
        .ok_or_else(|| eyre!("no test {id} in report"))
}

#[test]
fn full_session_summary() -> Result<()> {
    let report = run_sample(options_without_file(), SessionScript::default());
    let map = finished_report(&report)?;

    assert_eq!(
        map["summary"],
        json!({
            "total": 10,
            "collected": 10,
            "passed": 2,
            "failed": 3,
            "skipped": 1,
            "xpassed": 1,
            "xfailed": 1,
            "error": 2,
        })
    );
    assert_eq!(map["exitcode"], 1);
    assert_eq!(map["root"], "/work/sample");
    assert_eq!(map["environment"], json!({"Platform": "linux"}));
    assert_eq!(report.status(), Some(&SaveStatus::Skipped));

    let mut keys: Vec<_> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        [
            "collectors",
            "created",
            "duration",
            "environment",
            "exitcode",
            "root",
            "summary",
            "tests",
        ],
        "no warnings key without warnings"
    );
    Ok(())
}

#[test]
fn test_outcomes_and_stages() -> Result<()> {
    let report = run_sample(options_without_file(), SessionScript::default());
    let map = finished_report(&report)?;

    let passed = test_entry(map, "test_pass")?;
    assert!(passed.get("outcome").is_none(), "passed is implicit");
    assert_eq!(passed["lineno"], 24);
    for phase in ["setup", "call", "teardown"] {
        assert_eq!(passed[phase]["outcome"], "passed", "{phase} of test_pass");
    }

    let setup_error = test_entry(map, "test_fail_during_setup")?;
    assert_eq!(setup_error["outcome"], "error");
    assert_eq!(setup_error["setup"]["outcome"], "failed");
    assert!(setup_error.get("call").is_none(), "call never ran");
    assert_eq!(
        setup_error["setup"]["longrepr"],
        "fixture setup failed: assert False"
    );

    let skipped = test_entry(map, "test_skip")?;
    assert_eq!(skipped["outcome"], "skipped");
    assert_eq!(skipped["setup"]["outcome"], "skipped");

    let xfail = test_entry(map, "test_xfail")?;
    assert_eq!(xfail["outcome"], "xfailed");
    assert_eq!(xfail["call"]["longrepr"], "reason: testing xfail");

    let nested = test_entry(map, "test_fail_nested")?;
    assert_eq!(nested["call"]["crash"]["lineno"], 55);
    assert_eq!(nested["call"]["traceback"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[test]
fn streams_and_captured_logs() -> Result<()> {
    let report = run_sample(options_without_file(), SessionScript::default());
    let test = test_entry(finished_report(&report)?, "test_fail_with_fixture")?;

    for (phase, stdout, stderr) in [
        ("setup", "setup\n", "setuperr\n"),
        ("call", "call\n", "callerr\n"),
        ("teardown", "teardown\n", "teardownerr\n"),
    ] {
        assert_eq!(test[phase]["stdout"], stdout);
        assert_eq!(test[phase]["stderr"], stderr);
    }

    let log = test["call"]["log"]
        .as_array()
        .ok_or_else(|| eyre!("call stage has no log"))?;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["msg"], "calling the fixture");
    assert_eq!(log[0]["level"], "INFO");
    assert_eq!(log[0]["name"], "sample");
    assert!(test["setup"].get("log").is_none(), "nothing logged in setup");
    Ok(())
}

#[test_case(OmitCategory::Log, &["log"] ; "log")]
#[test_case(OmitCategory::Streams, &["stdout", "stderr"] ; "streams")]
fn omitted_categories_leave_the_rest(category: OmitCategory, removed: &[&str]) -> Result<()> {
    let options = ReportOptions {
        omit: [category].into_iter().collect(),
        ..options_without_file()
    };
    let report = run_sample(options, SessionScript::default());
    let call = &test_entry(finished_report(&report)?, "test_fail_with_fixture")?["call"];

    for key in ["log", "stdout", "stderr", "crash", "traceback", "longrepr"] {
        assert_eq!(
            call.get(key).is_none(),
            removed.contains(&key),
            "presence of {key} when omitting {category}"
        );
    }
    Ok(())
}

#[test]
fn omit_traceback_keeps_crash() -> Result<()> {
    let options = ReportOptions {
        omit: [OmitCategory::Traceback].into_iter().collect(),
        ..options_without_file()
    };
    let report = run_sample(options, SessionScript::default());
    let call = &test_entry(finished_report(&report)?, "test_fail_nested")?["call"];

    assert!(call.get("traceback").is_none());
    assert_eq!(call["crash"]["lineno"], 55);
    let longrepr = call["longrepr"].as_str().unwrap_or_default();
    assert!(longrepr.starts_with("TypeError"), "{longrepr}");
    Ok(())
}

#[test]
fn omit_keywords_collectors_and_warnings() -> Result<()> {
    let options = ReportOptions {
        omit: [
            OmitCategory::Keywords,
            OmitCategory::Collectors,
            OmitCategory::Warnings,
        ]
        .into_iter()
        .collect(),
        ..options_without_file()
    };
    let script = SessionScript {
        warn: true,
        ..Default::default()
    };
    let report = run_sample(options, script);
    let map = finished_report(&report)?;

    assert!(!map.contains_key("collectors"));
    assert!(!map.contains_key("warnings"));
    assert!(test_entry(map, "test_pass")?.get("keywords").is_none());
    Ok(())
}

#[test]
fn summary_only_drops_details() -> Result<()> {
    let options = ReportOptions {
        summary_only: true,
        ..options_without_file()
    };
    let script = SessionScript {
        warn: true,
        ..Default::default()
    };
    let report = run_sample(options, script);
    let map = finished_report(&report)?;

    let mut keys: Vec<_> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        [
            "created",
            "duration",
            "environment",
            "exitcode",
            "root",
            "summary",
        ]
    );
    assert_eq!(map["summary"]["total"], 10);
    Ok(())
}

#[test]
fn collectors_and_warnings_reported() -> Result<()> {
    let script = SessionScript {
        warn: true,
        ..Default::default()
    };
    let report = run_sample(options_without_file(), script);
    let map = finished_report(&report)?;

    let collectors = map["collectors"]
        .as_array()
        .ok_or_else(|| eyre!("no collectors"))?;
    assert_eq!(collectors.len(), 2);
    assert_eq!(collectors[0]["nodeid"], "");
    assert_eq!(collectors[1]["nodeid"], MODULE);
    assert_eq!(collectors[1]["result"].as_array().map(Vec::len), Some(10));

    assert_eq!(
        map["warnings"],
        json!([{
            "category": "DeprecationWarning",
            "filename": MODULE,
            "lineno": 12,
            "message": "sample API is deprecated",
            "when": "runtest",
        }])
    );
    Ok(())
}

struct OpaqueBlob;

impl Serialize for OpaqueBlob {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("opaque blobs cannot be serialized"))
    }
}

#[test]
fn metadata_from_tests() -> Result<()> {
    let script = SessionScript {
        during_call: Some(Box::new(|report: &mut JsonReport, item: &TestItem| {
            let mut metadata = json_metadata(Some(report), item);
            metadata.insert("name", item.id.name());
            if item.id.as_str().ends_with("test_pass") {
                metadata.insert("blob", &OpaqueBlob);
            }
        })),
        ..Default::default()
    };
    let report = run_sample(options_without_file(), script);
    let map = finished_report(&report)?;

    let passed = test_entry(map, "test_pass")?;
    assert!(passed.get("metadata").is_none(), "invalid metadata dropped");
    let nested = test_entry(map, "test_fail_nested")?;
    assert_eq!(nested["metadata"], json!({"name": "test_fail_nested"}));

    let warnings = map["warnings"]
        .as_array()
        .ok_or_else(|| eyre!("no warnings"))?;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["category"], REPORT_WARNING_CATEGORY);
    assert_eq!(warnings[0]["lineno"], 24);
    assert!(
        warnings[0]["message"]
            .as_str()
            .is_some_and(|message| message.contains(&format!("{MODULE}::test_pass"))),
        "warning names the test"
    );
    Ok(())
}

#[test]
fn metadata_without_a_report_is_discarded() {
    let tests = sample_tests();
    let mut metadata = json_metadata(None, &tests[0].item);
    metadata.insert("key", "value");
    assert!(!metadata.is_live());
    assert!(metadata.get("key").is_some());
}

#[test]
fn deselected_tests() -> Result<()> {
    let tests = sample_tests();
    let deselected: Vec<NodeId> = vec![tests[0].item.id.clone(), tests[1].item.id.clone()];
    let script = SessionScript {
        deselect: deselected.clone(),
        ..Default::default()
    };
    let report = run_session(options_without_file(), ReportHooks::new(), &tests, script);
    let map = finished_report(&report)?;

    assert_eq!(map["summary"]["total"], 8);
    assert_eq!(map["summary"]["deselected"], 2);
    assert_eq!(map["summary"]["collected"], 10);
    for id in &deselected {
        assert!(
            test_entry(map, id.name()).is_err(),
            "{id} is not among the tests"
        );
    }

    let children = map["collectors"][1]["result"]
        .as_array()
        .ok_or_else(|| eyre!("module collector has no children"))?;
    let flagged: Vec<_> = children
        .iter()
        .filter(|child| child.get("deselected") == Some(&Value::Bool(true)))
        .map(|child| child["nodeid"].clone())
        .collect();
    assert_eq!(
        flagged,
        deselected
            .iter()
            .map(|id| Value::from(id.as_str()))
            .collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn hooks_shape_the_report() -> Result<()> {
    let mut hooks = ReportHooks::new();
    hooks
        .on_runtest_metadata(|item, phase| {
            json!({"last_phase": phase.phase.as_str(), "module": item.path.as_str()})
                .as_object()
                .cloned()
        })
        .on_modify_report(|report| {
            report.remove("environment");
            report.insert("ci".to_owned(), json!({"job": 7}));
        });
    let report = run_session(
        options_without_file(),
        hooks,
        &sample_tests(),
        SessionScript::default(),
    );
    let map = finished_report(&report)?;

    assert!(!map.contains_key("environment"));
    assert_eq!(map["ci"], json!({"job": 7}));
    assert_eq!(
        test_entry(map, "test_pass")?["metadata"],
        json!({"last_phase": "teardown", "module": MODULE})
    );
    Ok(())
}

#[test]
fn persisted_report_round_trips() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let path = dir.path().join("nested/dir/report.json");
    let options = ReportOptions {
        file: ReportFile::Path(path.clone()),
        indent: Some(2),
        ..Default::default()
    };
    let report = run_sample(options, SessionScript::default());
    assert_eq!(report.status(), Some(&SaveStatus::Saved(path.clone())));

    let contents = std::fs::read_to_string(&path)?;
    assert!(contents.starts_with("{\n  \""), "indented by two spaces");
    let saved: SessionReport = serde_json::from_str(&contents)?;
    assert_eq!(saved.summary.total, 10);
    assert_eq!(saved.summary.count(TestOutcome::Failed), 3);
    assert_eq!(saved.tests().len(), 10);
    assert_eq!(
        serde_json::to_value(&saved)?,
        Value::Object(finished_report(&report)?.clone())
    );
    Ok(())
}

#[test_case(None, 0, false ; "skipped is quiet by default")]
#[test_case(None, 1, true ; "skipped shown when host is verbose")]
#[test_case(Some(1), 0, true ; "configured verbosity overrides host")]
#[test_case(Some(0), 2, false ; "configured quiet overrides verbose host")]
fn terminal_summary_visibility(verbosity: Option<i32>, host: i32, shown: bool) {
    let options = ReportOptions {
        verbosity,
        ..options_without_file()
    };
    let report = run_sample(options, SessionScript::default());
    let summary = report.terminal_summary(host);
    assert_eq!(summary.is_some(), shown);
    if let Some(summary) = summary {
        let title = summary.lines().next().unwrap_or_default();
        assert!(title.contains(TERMINAL_SUMMARY_TITLE), "{title}");
        assert!(summary.ends_with("report auto-save skipped\n"));
    }
}

#[test]
fn worker_builds_nothing() {
    let mut report = JsonReport::worker(ReportOptions::default(), ReportHooks::new());
    report.on_session_start();
    report.merger_mut().on_warning(WarningRecord::new(
        "UserWarning",
        MODULE,
        1,
        "from a worker",
        WarningWhen::Runtest,
    ));
    report.on_session_finish(SessionEnd::new(0, "/work"));
    assert!(report.report().is_none());
    assert!(report.status().is_none());
    assert_eq!(report.merger().warnings().len(), 1);
}
