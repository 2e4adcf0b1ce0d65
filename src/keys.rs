//! Canonical key naming for runs and timeseries sequences.
//!
//! Runs live under `results.runs` keyed `run_<n>`; timeseries points live
//! under `runs.<run_key>.timeseries` keyed `sequence_<n>`. Keys are objects,
//! not array positions, so the search index never sees nested arrays.

use std::fmt;

/// Prefix of every run key.
pub const RUN_KEY_PREFIX: &str = "run_";

/// Prefix of every sequence key.
pub const SEQUENCE_KEY_PREFIX: &str = "sequence_";

/// Which family of key failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// A `run_<n>` key.
    Run,
    /// A `sequence_<n>` key.
    Sequence,
}

impl KeyKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Run => RUN_KEY_PREFIX,
            Self::Sequence => SEQUENCE_KEY_PREFIX,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

/// A key did not match `run_<n>` / `sequence_<n>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} key '{key}': expected {}<non-negative integer>", .kind.prefix())]
pub struct KeyFormatError {
    /// Family of the offending key.
    pub kind: KeyKind,
    /// The key as found in the document.
    pub key: String,
}

/// Build a run key: `run_key(1) == "run_1"`.
pub fn run_key(n: u64) -> String {
    format!("{RUN_KEY_PREFIX}{n}")
}

/// Build a sequence key: `sequence_key(0) == "sequence_0"`.
pub fn sequence_key(n: u64) -> String {
    format!("{SEQUENCE_KEY_PREFIX}{n}")
}

/// Parse the integer out of a `run_<n>` key.
pub fn parse_run_key(key: &str) -> Result<u64, KeyFormatError> {
    parse_key(key, KeyKind::Run)
}

/// Parse the integer out of a `sequence_<n>` key.
pub fn parse_sequence_key(key: &str) -> Result<u64, KeyFormatError> {
    parse_key(key, KeyKind::Sequence)
}

/// Whether `key` is a well-formed run key.
pub fn is_run_key(key: &str) -> bool {
    parse_run_key(key).is_ok()
}

/// Whether `key` is a well-formed sequence key.
pub fn is_sequence_key(key: &str) -> bool {
    parse_sequence_key(key).is_ok()
}

fn parse_key(key: &str, kind: KeyKind) -> Result<u64, KeyFormatError> {
    let malformed = || KeyFormatError {
        kind,
        key: key.to_string(),
    };

    let digits = key.strip_prefix(kind.prefix()).ok_or_else(malformed)?;
    // `u64::from_str` accepts a leading '+', which no producer emits.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse().map_err(|_| malformed())
}
