//! Structural validation.
//!
//! Validation is advisory: it collects every violation instead of stopping at
//! the first, and never fails. Callers log the report and carry on.

use std::fmt;

use serde_json::Value;

use crate::keys::{is_run_key, is_sequence_key};
use crate::types::ZathrasDocument;

/// Top-level sections every serialized document must have.
pub const REQUIRED_SECTIONS: [&str; 5] = [
    "metadata",
    "test",
    "system_under_test",
    "test_configuration",
    "results",
];

/// Every violation found in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Human-readable violations, in discovery order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// True when no violation was found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "valid");
        }
        write!(f, "{}", self.errors.join("; "))
    }
}

/// Check required fields and run/sequence key formats of a typed document.
pub fn validate(document: &ZathrasDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    if document.metadata.document_id.is_empty() {
        report.push("metadata.document_id is required");
    }
    if document.test.name.is_empty() {
        report.push("test.name is required");
    }
    if document.results.status.is_empty() {
        report.push("results.status is required");
    }

    for (run_key, run) in &document.results.runs {
        if !is_run_key(run_key) {
            report.push(format!("Invalid run key: {run_key}. Must match 'run_<n>'"));
        }
        for sequence_key in run.timeseries.iter().flat_map(|points| points.keys()) {
            if !is_sequence_key(sequence_key) {
                report.push(format!(
                    "Invalid sequence key in {run_key}.timeseries: {sequence_key}. Must match 'sequence_<n>'"
                ));
            }
        }
    }

    report
}

/// Check a raw JSON document against the expected shape.
///
/// Catches what the typed model cannot express, such as `runs` or
/// `timeseries` serialized as arrays by another producer.
pub fn validate_json_schema(document: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = document.as_object() else {
        report.push("Document must be a JSON object");
        return report;
    };

    for section in REQUIRED_SECTIONS {
        if !root.contains_key(section) {
            report.push(format!("Missing required section: {section}"));
        }
    }

    let Some(runs) = root.get("results").and_then(|r| r.get("runs")) else {
        return report;
    };
    let Some(runs) = runs.as_object() else {
        report.push("results.runs must be an object, not an array");
        return report;
    };

    for (run_key, run) in runs {
        if !is_run_key(run_key) {
            report.push(format!("Invalid run key: {run_key}"));
        }
        match run.get("timeseries") {
            None | Some(Value::Null) => {}
            Some(Value::Object(points)) => {
                for sequence_key in points.keys().filter(|k| !is_sequence_key(k)) {
                    report.push(format!(
                        "Invalid sequence key in {run_key}.timeseries: {sequence_key}"
                    ));
                }
            }
            Some(_) => report.push(format!(
                "{run_key}.timeseries must be an object with sequence keys"
            )),
        }
    }

    report
}
