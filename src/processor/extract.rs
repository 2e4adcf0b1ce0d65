//! Locating and cataloguing benchmark result files.
//!
//! Result archives are unpacked by an external tool. [`DirectoryExtractor`]
//! works on the unpacked `results_<test>/` directory and records where the
//! files a processor needs live.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

/// Catalog key of the PASS/FAIL report.
pub const TEST_RESULTS_REPORT: &str = "test_results_report";
/// Catalog key of the `results_<test>.csv` timeseries file.
pub const RESULTS_CSV: &str = "results_csv";
/// Catalog key of the wrapper version file.
pub const VERSION: &str = "version";
/// Catalog key of the tuned profile file.
pub const TUNED_SETTING: &str = "tuned_setting";
/// Catalog key of the sorted `run*_summary` files.
pub const RUN_SUMMARIES: &str = "run_summaries";
/// Catalog key of every file under the result directory.
pub const ALL_FILES: &str = "all_files";

/// Errors locating result files.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The path does not exist.
    #[error("result archive not found: {0}")]
    NotFound(PathBuf),

    /// Compressed archives must be unpacked before processing.
    #[error("unsupported archive (unpack it first): {0}")]
    Unsupported(PathBuf),

    /// The directory name does not follow `results_<test>`.
    #[error("cannot determine test name from {0}")]
    UnknownTest(PathBuf),

    /// Walking the directory failed.
    #[error("failed to read {path}: {source}")]
    Walk {
        /// Directory being walked.
        path: PathBuf,
        /// Underlying error.
        source: walkdir::Error,
    },
}

/// One catalogued file or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSet {
    /// A single file.
    Single(PathBuf),
    /// Several files, sorted.
    Many(Vec<PathBuf>),
}

impl FileSet {
    /// The path of a single-file entry.
    pub fn single(&self) -> Option<&Path> {
        match self {
            Self::Single(path) => Some(path),
            Self::Many(_) => None,
        }
    }

    /// All paths of this entry.
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::Single(path) => std::slice::from_ref(path),
            Self::Many(paths) => paths,
        }
    }
}

/// Where a result was unpacked and which files it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedResult {
    /// Test name from `results_<test>`.
    pub test_name: String,
    /// Directory holding the result files.
    pub extracted_path: PathBuf,
    /// Catalog of known files.
    pub files: BTreeMap<String, FileSet>,
}

impl ExtractedResult {
    /// Path of a single catalogued file.
    pub fn file(&self, key: &str) -> Option<&Path> {
        self.files.get(key).and_then(FileSet::single)
    }

    /// Paths of a multi-file entry; empty when absent.
    pub fn file_list(&self, key: &str) -> &[PathBuf] {
        self.files.get(key).map(FileSet::paths).unwrap_or(&[])
    }
}

/// Turns a result archive into an [`ExtractedResult`].
pub trait ArchiveExtractor: Send + Sync {
    /// Locate and catalogue the result files behind `archive`.
    fn extract(&self, archive: &Path) -> Result<ExtractedResult, ExtractionError>;
}

/// Extractor for results that are already unpacked on disk.
///
/// Accepts `results_<test>/`, optionally containing one
/// `<test>_<YYYY.MM.DD-HH.MM.SS>/` directory with the actual files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryExtractor;

impl DirectoryExtractor {
    /// Create an extractor.
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for DirectoryExtractor {
    fn extract(&self, archive: &Path) -> Result<ExtractedResult, ExtractionError> {
        if !archive.exists() {
            return Err(ExtractionError::NotFound(archive.to_path_buf()));
        }
        if !archive.is_dir() {
            return Err(ExtractionError::Unsupported(archive.to_path_buf()));
        }

        let test_name = archive
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("results_"))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ExtractionError::UnknownTest(archive.to_path_buf()))?
            .to_string();

        let extracted_path = find_run_directory(archive, &test_name)?;
        let files = catalog_files(&extracted_path, &test_name)?;

        info!(
            test = %test_name,
            path = %extracted_path.display(),
            files = files.get(ALL_FILES).map_or(0, |f| f.paths().len()),
            "Catalogued result files"
        );

        Ok(ExtractedResult {
            test_name,
            extracted_path,
            files,
        })
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| ExtractionError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn find_run_directory(archive: &Path, test_name: &str) -> Result<PathBuf, ExtractionError> {
    let prefix = format!("{test_name}_");
    let nested = subdirectories(archive)?.into_iter().find(|dir| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&prefix))
    });
    Ok(nested.unwrap_or_else(|| archive.to_path_buf()))
}

fn catalog_files(dir: &Path, test_name: &str) -> Result<BTreeMap<String, FileSet>, ExtractionError> {
    let mut all_files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| ExtractionError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            all_files.push(entry.into_path());
        }
    }

    let named = |name: &str| {
        all_files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == name))
            .cloned()
    };

    let mut files = BTreeMap::new();
    let csv_name = format!("results_{test_name}.csv");
    for (key, name) in [
        (TEST_RESULTS_REPORT, TEST_RESULTS_REPORT),
        (RESULTS_CSV, csv_name.as_str()),
        (VERSION, VERSION),
        (TUNED_SETTING, TUNED_SETTING),
    ] {
        if let Some(path) = named(name) {
            files.insert(key.to_string(), FileSet::Single(path));
        }
    }

    let mut summaries: Vec<PathBuf> = all_files
        .iter()
        .filter(|p| p.parent() == Some(dir))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("run") && n.ends_with("_summary"))
        })
        .cloned()
        .collect();
    summaries.sort();
    debug!(count = summaries.len(), "Found run summaries");

    files.insert(RUN_SUMMARIES.to_string(), FileSet::Many(summaries));
    files.insert(ALL_FILES.to_string(), FileSet::Many(all_files));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_catalogs_nested_run_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let results = tmp.path().join("results_coremark");
        let run_dir = results.join("coremark_2025.11.06-05.09.45");
        fs::create_dir_all(&run_dir).unwrap();
        for name in ["test_results_report", "results_coremark.csv", "run2_summary", "run1_summary", "version"] {
            fs::write(run_dir.join(name), "x").unwrap();
        }

        let extracted = DirectoryExtractor::new().extract(&results).unwrap();
        assert_eq!(extracted.test_name, "coremark");
        assert_eq!(extracted.extracted_path, run_dir);
        assert_eq!(extracted.file(RESULTS_CSV), Some(run_dir.join("results_coremark.csv").as_path()));
        assert!(extracted.file(TUNED_SETTING).is_none());
        assert_eq!(
            extracted.file_list(RUN_SUMMARIES),
            &[run_dir.join("run1_summary"), run_dir.join("run2_summary")]
        );
        assert_eq!(extracted.file_list(ALL_FILES).len(), 5);
    }

    #[test]
    fn test_flat_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let results = tmp.path().join("results_fio");
        fs::create_dir_all(&results).unwrap();
        fs::write(results.join("test_results_report"), "PASS").unwrap();

        let extracted = DirectoryExtractor::new().extract(&results).unwrap();
        assert_eq!(extracted.extracted_path, results);
        assert!(extracted.file(TEST_RESULTS_REPORT).is_some());
        assert!(extracted.file_list(RUN_SUMMARIES).is_empty());
    }

    #[test]
    fn test_rejects_zip_and_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = tmp.path().join("results_coremark.zip");
        fs::write(&zip, b"PK").unwrap();

        let extractor = DirectoryExtractor::new();
        assert!(matches!(extractor.extract(&zip), Err(ExtractionError::Unsupported(_))));
        assert!(matches!(
            extractor.extract(&tmp.path().join("results_missing")),
            Err(ExtractionError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_test_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("output");
        fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            DirectoryExtractor::new().extract(&dir),
            Err(ExtractionError::UnknownTest(_))
        ));
    }
}
