// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test metadata contributed while tests run.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A value converted to JSON when it was contributed.
///
/// Conversion failures are kept rather than surfaced immediately, so that the containing
/// accumulator can be validated as a whole once the test settles.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedValue(Result<Value, Arc<str>>);

impl SerializedValue {
    /// Converts `value` to JSON, recording any failure.
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Self {
        Self(serde_json::to_value(value).map_err(|error| error.to_string().into()))
    }

    /// Returns the JSON value, or the conversion error message.
    pub fn as_value(&self) -> Result<&Value, &str> {
        self.0.as_ref().map_err(|error| &**error)
    }

    /// Returns true if the value converted successfully.
    pub fn is_valid(&self) -> bool {
        self.0.is_ok()
    }
}

impl From<Value> for SerializedValue {
    fn from(value: Value) -> Self {
        Self(Ok(value))
    }
}

impl From<&str> for SerializedValue {
    fn from(value: &str) -> Self {
        Self(Ok(Value::String(value.to_owned())))
    }
}

impl From<String> for SerializedValue {
    fn from(value: String) -> Self {
        Self(Ok(Value::String(value)))
    }
}

/// Metadata contributed to a single test across its phases.
///
/// Contributions are shallow: a later value for the same key replaces the earlier one.
#[derive(Clone, Debug, Default)]
pub struct MetadataAccumulator {
    entries: IndexMap<String, SerializedValue>,
}

impl MetadataAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to an already-converted value.
    pub fn insert_serialized(&mut self, key: impl Into<String>, value: SerializedValue) {
        self.entries.insert(key.into(), value);
    }

    /// Sets `key` to `value`.
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) {
        self.insert_serialized(key, SerializedValue::new(value));
    }

    /// Merges a mapping of JSON values into the accumulator.
    pub fn extend(&mut self, mapping: Map<String, Value>) {
        for (key, value) in mapping {
            self.insert_serialized(key, value.into());
        }
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&SerializedValue> {
        self.entries.get(key)
    }

    /// Returns true if nothing has been contributed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Converts the accumulator into a JSON object.
    ///
    /// Fails with the first conversion error if any entry is invalid. Partial results are never
    /// returned.
    pub fn to_map(&self) -> Result<Map<String, Value>, &str> {
        self.entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), value.as_value()?.clone())))
            .collect()
    }
}

/// A handle for contributing metadata to the current test.
///
/// Obtained through [`json_metadata`](crate::json_metadata). When reporting is disabled, the
/// handle writes into a throwaway container instead.
#[derive(Debug)]
pub enum JsonMetadata<'a> {
    /// Writes go to the test's accumulator.
    Live(&'a mut MetadataAccumulator),

    /// Writes go nowhere that is reported.
    Inert(MetadataAccumulator),
}

impl JsonMetadata<'_> {
    /// Returns true if writes are recorded in a report.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Sets `key` to `value` in the test's metadata.
    pub fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> &mut Self {
        self.accumulator_mut().insert(key, value);
        self
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&SerializedValue> {
        match self {
            Self::Live(accumulator) => accumulator.get(key),
            Self::Inert(accumulator) => accumulator.get(key),
        }
    }

    fn accumulator_mut(&mut self) -> &mut MetadataAccumulator {
        match self {
            Self::Live(accumulator) => accumulator,
            Self::Inert(accumulator) => accumulator,
        }
    }
}
