//! Canonical serialization for deterministic hashing.
//!
//! This module turns any serializable value into a canonical JSON byte string
//! suitable for content hashing. Two deep-equal values always produce the same
//! bytes, whatever map type `serde_json` was compiled with.
//!
//! ## Determinism Guarantees
//!
//! - Object keys are sorted by byte order at every nesting level
//! - No insignificant whitespace (`,` and `:` separators only)
//! - Integers are written as integers; floats use the shortest representation
//!   that round-trips (`195999.8`, `10.0`), the same rule on every platform
//! - `null` members are written as-is; absent optional struct fields never
//!   reach this layer because the document types skip them when serializing
//! - Non-finite floats have no JSON form and serialize as `null`

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Error building canonical bytes.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    /// The value could not be represented as JSON.
    #[error("canonical serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(value)?;
    value_to_canonical_bytes(&value)
}

/// Canonical bytes of an already-built JSON value.
pub fn value_to_canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(512);
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// SHA-256 over the canonical bytes of a value.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Result<[u8; 32], CanonicalError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(sha256(&bytes))
}

/// SHA-256 over the canonical bytes of a value, as lowercase hex.
pub fn canonical_hash_hex<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(hex::encode(canonical_hash(value)?))
}

/// Plain SHA-256 of a byte string.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(member, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}
