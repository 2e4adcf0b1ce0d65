//! Small parsers for the text files Zathras leaves next to results.

use std::path::Path;

use chrono::NaiveDateTime;
use serde_json::Value;

use super::ProcessorError;
use crate::types::{FieldMap, STATUS_UNKNOWN};

/// Read a whole file, attaching the path to I/O errors.
pub fn read_file(path: &Path) -> Result<String, ProcessorError> {
    std::fs::read_to_string(path).map_err(|source| ProcessorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize a report key: `"Total time (secs)"` becomes `total_time`,
/// `"Iterations/Sec"` becomes `iterations_per_sec`.
pub fn clean_key(key: &str) -> String {
    let mut without_parens = String::with_capacity(key.len());
    let mut depth = 0usize;
    for c in key.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => without_parens.push(c),
            _ => {}
        }
    }

    let replaced = without_parens.replace('/', "_per_");
    let mut cleaned = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c.is_alphanumeric() {
            cleaned.extend(c.to_lowercase());
        } else if !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }
    cleaned.trim_matches('_').to_string()
}

/// Parse a scalar: integer if it has no dot, else float, else the trimmed string.
pub fn parse_scalar(raw: &str) -> Value {
    let raw = raw.trim();
    if !raw.contains('.') {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::from(i);
        }
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::from(raw),
    }
}

/// Parse `Key (unit) : value` lines. Lines without the separator are ignored.
pub fn parse_key_values(text: &str) -> FieldMap {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (clean_key(key), parse_scalar(value)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Map a result report to `PASS`, `FAIL`, the uppercased text, or `UNKNOWN`.
pub fn normalize_status(report: &str) -> String {
    let status = report.trim().to_uppercase();
    match status.as_str() {
        "RAN" | "PASS" | "PASSED" | "SUCCESS" => "PASS".to_string(),
        "FAIL" | "FAILED" | "ERROR" => "FAIL".to_string(),
        "" => STATUS_UNKNOWN.to_string(),
        _ => status,
    }
}

/// Extract `v1.01` from `commit: v1.01`; otherwise the trimmed text.
pub fn parse_version(text: &str) -> String {
    let text = text.trim();
    text.split_once("commit:")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or(text)
        .to_string()
}

/// The command line from a `{test}.cmd` file, skipping a shebang.
pub fn parse_command(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| !line.starts_with("#!"))
        .map(str::to_string)
}

/// Parse a timestamp from a `{test}_YYYY.MM.DD-HH.MM.SS` directory name.
///
/// Returns `None` when the name does not match or the date is invalid.
pub fn parse_test_timestamp(test_name: &str, dir_name: &str) -> Option<String> {
    let pattern = format!(
        r"^{}_(\d{{4}}\.\d{{2}}\.\d{{2}}-\d{{2}}\.\d{{2}}\.\d{{2}})",
        regex_lite::escape(test_name)
    );
    let re = regex_lite::Regex::new(&pattern).ok()?;
    let stamp = re.captures(dir_name)?.get(1)?.as_str();
    let parsed = NaiveDateTime::parse_from_str(stamp, "%Y.%m.%d-%H.%M.%S").ok()?;
    Some(parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
