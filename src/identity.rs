//! Content-derived document identity.
//!
//! The identity of a document is the SHA-256 of its summary view, with the
//! fields that change on every re-processing (timestamps) or that are derived
//! from the hash itself (`document_id`, `content_hash`) removed first.
//!
//! `document_id` embeds only a 16-hex prefix for readability. A 64-bit prefix
//! is not collision-free across millions of documents, so the full digest is
//! kept in `metadata.content_hash`; callers needing strict guarantees should
//! compare that, not the ID.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{sha256, value_to_canonical_bytes, CanonicalError};
use crate::types::{SummaryView, ZathrasDocument};

/// Hex characters of the hash embedded in a document ID.
pub const ID_PREFIX_LEN: usize = 16;

/// Metadata fields excluded from the hash input.
pub const VOLATILE_METADATA_FIELDS: [&str; 5] = [
    "processing_timestamp",
    "test_timestamp",
    "collection_timestamp",
    "document_id",
    "content_hash",
];

/// Errors deriving a document identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Canonical serialization failed.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// The document has no test name to prefix the ID with.
    #[error("cannot derive a document id: test name is empty")]
    EmptyTestName,

    /// `assign_identity` was already called on this document.
    #[error("identity already assigned to document {document_id}")]
    AlreadyAssigned {
        /// The ID the document already carries.
        document_id: String,
    },
}

/// A full SHA-256 content hash as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap a raw digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a stored hash. Only 64 lowercase hex characters are accepted.
    pub fn from_hex(s: &str) -> Option<Self> {
        let well_formed = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(s.to_string()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 16-character prefix used in document IDs.
    pub fn prefix(&self) -> &str {
        &self.0[..ID_PREFIX_LEN]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the hash input: the summary view as JSON minus volatile metadata.
pub fn content_hash_input(view: &SummaryView) -> Result<Value, CanonicalError> {
    let mut value = serde_json::to_value(view)?;
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in VOLATILE_METADATA_FIELDS {
            metadata.remove(field);
        }
    }
    Ok(value)
}

/// Compute the content hash of a document without modifying it.
pub fn calculate_content_hash(document: &ZathrasDocument) -> Result<ContentHash, IdentityError> {
    let input = content_hash_input(&document.summary())?;
    let bytes = value_to_canonical_bytes(&input)?;
    Ok(ContentHash::from_digest(sha256(&bytes)))
}

/// `{test_name}_{prefix}` or `{test_name}_{benchmark}_{prefix}`.
pub fn document_id_for(test_name: &str, benchmark: Option<&str>, hash: &ContentHash) -> String {
    match benchmark {
        Some(benchmark) => format!("{test_name}_{benchmark}_{}", hash.prefix()),
        None => format!("{test_name}_{}", hash.prefix()),
    }
}

/// Outcome of checking a stored content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashValidation {
    /// Stored hash matches the document content.
    Valid,
    /// Stored hash does not match the document content.
    Mismatch {
        /// The hash stored in the document.
        expected: String,
        /// The hash computed from the current content.
        computed: String,
    },
    /// The document carries no hash (identity never assigned).
    Missing,
}

/// Whether the stored `metadata.content_hash` matches the content.
pub fn verify_content_hash(document: &ZathrasDocument) -> Result<bool, IdentityError> {
    Ok(validate_content_hash(document)? == HashValidation::Valid)
}

/// Check the stored `metadata.content_hash` against a fresh computation.
pub fn validate_content_hash(document: &ZathrasDocument) -> Result<HashValidation, IdentityError> {
    let Some(expected) = document.metadata.content_hash.as_deref() else {
        return Ok(HashValidation::Missing);
    };

    let computed = calculate_content_hash(document)?;
    if expected == computed.as_str() {
        Ok(HashValidation::Valid)
    } else {
        Ok(HashValidation::Mismatch {
            expected: expected.to_string(),
            computed: computed.to_string(),
        })
    }
}
