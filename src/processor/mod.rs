//! Benchmark processors.
//!
//! A processor turns the files of one unpacked `results_<test>` directory
//! into the runs of a [`ZathrasDocument`](crate::types::ZathrasDocument).
//! The shared parts (metadata, provenance, system info, identity) live in
//! [`assemble`]; each benchmark only implements [`BenchmarkProcessor`].

pub mod assemble;
pub mod coremark;
pub mod extract;
pub mod parse;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::identity::IdentityError;
use crate::types::Run;

pub use assemble::{DocumentAssembler, EmptySystemInfo, Provenance, SystemInfoSource};
pub use coremark::CoreMarkProcessor;
pub use extract::{ArchiveExtractor, DirectoryExtractor, ExtractedResult, ExtractionError, FileSet};

/// Errors producing a document from benchmark results.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// No `results_<test>` directory or archive was found.
    #[error("no results for {test} in {dir}")]
    ResultNotFound {
        /// Test being processed.
        test: String,
        /// Directory searched.
        dir: PathBuf,
    },

    /// A file the processor requires is absent.
    #[error("{test}: required file {file} not found")]
    MissingFile {
        /// Test being processed.
        test: String,
        /// Expected file name.
        file: String,
    },

    /// The results carry no usable timestamps.
    #[error("{path}: {reason}")]
    MissingTimestamps {
        /// Offending file.
        path: PathBuf,
        /// What is missing.
        reason: String,
    },

    /// A file was readable but its content is unusable.
    #[error("{path}: {message}")]
    InvalidData {
        /// Offending file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The processor produced no runs.
    #[error("{test}: no runs found")]
    NoRuns {
        /// Test being processed.
        test: String,
    },

    /// Reading a file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A CSV file could not be parsed.
    #[error("invalid CSV {path}: {source}")]
    Csv {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// Locating result files failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Assigning the document identity failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Runs produced by one benchmark variant.
///
/// Most tests produce a single group; tests that run several named
/// benchmarks (e.g. one per workload) produce one group each and every
/// group becomes its own document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunGroup {
    /// Benchmark variant name, used in the document ID.
    pub benchmark: Option<String>,
    /// Runs keyed `run_<n>`.
    pub runs: BTreeMap<String, Run>,
}

/// Per-benchmark parsing of result files.
pub trait BenchmarkProcessor: Send + Sync {
    /// The Zathras test name, e.g. `coremark`.
    fn test_name(&self) -> &str;

    /// Parse the runs of a single-benchmark test.
    fn parse_runs(&self, extracted: &ExtractedResult) -> Result<BTreeMap<String, Run>, ProcessorError>;

    /// Parse runs grouped by benchmark variant.
    fn parse_groups(&self, extracted: &ExtractedResult) -> Result<Vec<RunGroup>, ProcessorError> {
        Ok(vec![RunGroup {
            benchmark: None,
            runs: self.parse_runs(extracted)?,
        }])
    }
}

/// Processors by test name.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Arc<dyn BenchmarkProcessor>>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in processor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CoreMarkProcessor::new()));
        registry
    }

    /// Add a processor, replacing any with the same test name.
    pub fn register(&mut self, processor: Arc<dyn BenchmarkProcessor>) {
        self.processors.insert(processor.test_name().to_string(), processor);
    }

    /// The processor for a test.
    pub fn get(&self, test_name: &str) -> Option<Arc<dyn BenchmarkProcessor>> {
        self.processors.get(test_name).cloned()
    }

    /// Registered test names, sorted.
    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("tests", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl BenchmarkProcessor for Fixed {
        fn test_name(&self) -> &str {
            "fixed"
        }

        fn parse_runs(&self, _: &ExtractedResult) -> Result<BTreeMap<String, Run>, ProcessorError> {
            Ok(BTreeMap::from([("run_1".to_string(), Run::new(1, "PASS"))]))
        }
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ProcessorRegistry::with_defaults();
        assert_eq!(registry.test_names().collect::<Vec<_>>(), vec!["coremark"]);
        assert!(registry.get("coremark").is_some());
        assert!(registry.get("streams").is_none());
    }

    #[test]
    fn test_register_and_default_grouping() {
        let mut registry = ProcessorRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(Fixed));
        assert_eq!(registry.len(), 1);

        let extracted = ExtractedResult {
            test_name: "fixed".into(),
            extracted_path: PathBuf::from("/tmp/results_fixed"),
            files: BTreeMap::new(),
        };
        let groups = registry.get("fixed").unwrap().parse_groups(&extracted).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].benchmark.is_none());
        assert!(groups[0].runs.contains_key("run_1"));
    }
}
