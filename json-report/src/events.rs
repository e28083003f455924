// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle notifications delivered by the host framework.
//!
//! The host owns discovery, scheduling and fixtures. It describes what happened through the
//! plain data types in this module, and hands them to a [`RecordMerger`](crate::RecordMerger)
//! or [`JsonReport`](crate::JsonReport).

use crate::metadata::SerializedValue;
use camino::Utf8PathBuf;
use json_report_metadata::{
    CollectItem, CollectOutcome, FileLocation, LogRecord, NodeId, Phase, PhaseOutcome, TestOutcome,
};
use serde_json::{Map, Value};
use std::time::Duration;

/// A test item, as known to the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestItem {
    /// The identifier of the test.
    pub id: NodeId,

    /// The file the test is defined in.
    pub path: Utf8PathBuf,

    /// The line the test is defined on.
    pub lineno: Option<u32>,

    /// Keywords attached to the test, in host order.
    pub keywords: Vec<String>,
}

impl TestItem {
    /// Creates a new test item.
    pub fn new(id: impl Into<NodeId>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            lineno: None,
            keywords: Vec::new(),
        }
    }

    /// Sets the line the test is defined on.
    pub fn set_lineno(&mut self, lineno: u32) -> &mut Self {
        self.lineno = Some(lineno);
        self
    }

    /// Adds keywords to the test.
    pub fn add_keywords(
        &mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }
}

/// A failure representation supplied by the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureRepr {
    /// A plain-text representation, stored verbatim.
    Text(String),

    /// A representation carrying crash and traceback data.
    Structured(StructuredFailure),
}

impl FailureRepr {
    /// Returns the human-readable text of this failure.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Structured(failure) => &failure.text,
        }
    }
}

impl From<String> for FailureRepr {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for FailureRepr {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// A failure with structured crash and traceback data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StructuredFailure {
    /// The human-readable representation.
    pub text: String,

    /// The innermost failure point, if known.
    pub crash: Option<FileLocation>,

    /// The frames leading to the failure, outermost first.
    pub traceback: Vec<FileLocation>,
}

impl StructuredFailure {
    /// Creates a new structured failure with no crash or traceback data.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            crash: None,
            traceback: Vec::new(),
        }
    }

    /// Sets the crash location.
    pub fn set_crash(&mut self, crash: FileLocation) -> &mut Self {
        self.crash = Some(crash);
        self
    }

    /// Appends traceback frames.
    pub fn add_frames(&mut self, frames: impl IntoIterator<Item = FileLocation>) -> &mut Self {
        self.traceback.extend(frames);
        self
    }
}

impl From<StructuredFailure> for FailureRepr {
    fn from(failure: StructuredFailure) -> Self {
        Self::Structured(failure)
    }
}

/// The host's report for one phase of one test.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseReport {
    /// The test this phase belongs to.
    pub id: NodeId,

    /// Which phase this is.
    pub phase: Phase,

    /// The raw outcome of the phase.
    pub outcome: PhaseOutcome,

    /// The test outcome the host resolved for this phase, if any.
    ///
    /// `None` or [`TestOutcome::Passed`] leave the test's recorded outcome untouched.
    pub status: Option<TestOutcome>,

    /// Time spent in the phase.
    pub duration: Duration,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Log records captured by the host, appended after records captured through
    /// [`LogCapture`](crate::LogCapture).
    pub log: Vec<LogRecord>,

    /// The failure representation, if the phase did not pass.
    pub failure: Option<FailureRepr>,

    /// Properties declared by the test. Only read for the teardown phase.
    pub user_properties: Vec<(String, SerializedValue)>,
}

impl PhaseReport {
    /// Creates a new report for the given phase with no captured data.
    pub fn new(
        id: impl Into<NodeId>,
        phase: Phase,
        outcome: PhaseOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            phase,
            outcome,
            status: None,
            duration,
            stdout: String::new(),
            stderr: String::new(),
            log: Vec::new(),
            failure: None,
            user_properties: Vec::new(),
        }
    }

    /// Sets the resolved test outcome.
    pub fn set_status(&mut self, status: TestOutcome) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Sets captured standard output.
    pub fn set_stdout(&mut self, stdout: impl Into<String>) -> &mut Self {
        self.stdout = stdout.into();
        self
    }

    /// Sets captured standard error.
    pub fn set_stderr(&mut self, stderr: impl Into<String>) -> &mut Self {
        self.stderr = stderr.into();
        self
    }

    /// Sets the failure representation.
    pub fn set_failure(&mut self, failure: impl Into<FailureRepr>) -> &mut Self {
        self.failure = Some(failure.into());
        self
    }

    /// Adds a user property.
    pub fn add_user_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<SerializedValue>,
    ) -> &mut Self {
        self.user_properties.push((name.into(), value.into()));
        self
    }
}

/// The result of a completed collection pass over one node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectReport {
    /// The identifier of the node.
    pub id: NodeId,

    /// Whether collection succeeded.
    pub outcome: CollectOutcome,

    /// The children found.
    pub children: Vec<CollectItem>,

    /// The failure representation, if collection failed.
    pub failure: Option<FailureRepr>,
}

impl CollectReport {
    /// Creates a new collection report with the given children.
    pub fn new(id: impl Into<NodeId>, outcome: CollectOutcome, children: Vec<CollectItem>) -> Self {
        Self {
            id: id.into(),
            outcome,
            children,
            failure: None,
        }
    }
}

/// Session-level information available when the session finishes.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionEnd {
    /// The process exit code.
    pub exit_code: i32,

    /// The session root directory.
    pub root: Utf8PathBuf,

    /// Environment metadata gathered by the host.
    pub environment: Map<String, Value>,
}

impl SessionEnd {
    /// Creates a new `SessionEnd` with empty environment metadata.
    pub fn new(exit_code: i32, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            exit_code,
            root: root.into(),
            environment: Map::new(),
        }
    }
}
