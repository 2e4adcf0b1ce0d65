//! Shared document assembly.
//!
//! [`DocumentAssembler`] builds everything that is common to all
//! benchmarks (metadata, provenance, test info, system info, test
//! configuration, status, runtime info) and delegates run parsing to a
//! [`BenchmarkProcessor`]. Each resulting document gets its content-derived
//! identity exactly once before it is returned.

use std::path::{Component, Path};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::extract::{ArchiveExtractor, DirectoryExtractor, ExtractedResult, TEST_RESULTS_REPORT};
use super::parse::{normalize_status, parse_command, parse_test_timestamp, read_file};
use super::{BenchmarkProcessor, ProcessorError};
use crate::types::{
    ConfigurationInfo, FieldMap, HardwareInfo, Metadata, OperatingSystemInfo, Results, RuntimeInfo,
    SystemUnderTest, TestConfiguration, TestInfo, ZathrasDocument, STATUS_UNKNOWN,
};

/// Version reported when `test_info` does not name one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// User Zathras runs benchmarks as.
pub const DEFAULT_USER: &str = "root";

/// Supplies hardware, OS and configuration facts for a result directory.
pub trait SystemInfoSource: Send + Sync {
    /// Describe the system that produced `result_dir`.
    fn system_under_test(&self, result_dir: &Path) -> SystemUnderTest;
}

/// System info source that reports empty sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySystemInfo;

impl SystemInfoSource for EmptySystemInfo {
    fn system_under_test(&self, _result_dir: &Path) -> SystemUnderTest {
        SystemUnderTest {
            hardware: Some(HardwareInfo::default()),
            operating_system: Some(OperatingSystemInfo::default()),
            configuration: Some(ConfigurationInfo::default()),
        }
    }
}

/// Where a result came from, parsed from
/// `.../<scenario>/<os_vendor>/<cloud_provider>/<instance>_<iteration>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// OS vendor directory.
    pub os_vendor: Option<String>,
    /// Cloud provider directory.
    pub cloud_provider: Option<String>,
    /// Instance directory without the iteration suffix.
    pub instance_type: Option<String>,
    /// Trailing `_<n>` of the instance directory.
    pub iteration: Option<u32>,
    /// Scenario directory.
    pub scenario_name: Option<String>,
}

impl Provenance {
    /// Parse provenance from a result directory path.
    ///
    /// Paths with fewer than three components carry no provenance.
    pub fn from_path(path: &Path) -> Self {
        let parts: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();

        let [.., os_vendor, cloud_provider, instance] = parts.as_slice() else {
            debug!(path = %path.display(), "Directory structure too short for provenance");
            return Self::default();
        };

        let (instance_type, iteration) = match instance.rsplit_once('_') {
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                (head.to_string(), tail.parse().ok())
            }
            _ => (instance.to_string(), None),
        };

        Self {
            os_vendor: Some(os_vendor.to_string()),
            cloud_provider: Some(cloud_provider.to_string()),
            instance_type: Some(instance_type),
            iteration,
            scenario_name: (parts.len() >= 4).then(|| parts[parts.len() - 4].to_string()),
        }
    }

    /// Copy these fields into document metadata.
    pub fn apply(&self, metadata: &mut Metadata) {
        metadata.os_vendor = self.os_vendor.clone();
        metadata.cloud_provider = self.cloud_provider.clone();
        metadata.instance_type = self.instance_type.clone();
        metadata.iteration = self.iteration;
        metadata.scenario_name = self.scenario_name.clone();
    }
}

/// Builds identified documents from benchmark result directories.
pub struct DocumentAssembler {
    extractor: Box<dyn ArchiveExtractor>,
    system_info: Box<dyn SystemInfoSource>,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    /// Assembler over unpacked directories with empty system info.
    pub fn new() -> Self {
        Self {
            extractor: Box::new(DirectoryExtractor::new()),
            system_info: Box::new(EmptySystemInfo),
        }
    }

    /// Use a different archive extractor.
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Use a different system info source.
    pub fn with_system_info(mut self, source: impl SystemInfoSource + 'static) -> Self {
        self.system_info = Box::new(source);
        self
    }

    /// Locate `results_<test>` under `result_dir`, extract it and assemble documents.
    pub fn process(
        &self,
        processor: &dyn BenchmarkProcessor,
        result_dir: &Path,
    ) -> Result<Vec<ZathrasDocument>, ProcessorError> {
        let test = processor.test_name();
        info!(test, dir = %result_dir.display(), "Processing results");

        let unpacked = result_dir.join(format!("results_{test}"));
        let zipped = result_dir.join(format!("results_{test}.zip"));
        let archive = if unpacked.exists() {
            unpacked
        } else if zipped.exists() {
            zipped
        } else {
            return Err(ProcessorError::ResultNotFound {
                test: test.to_string(),
                dir: result_dir.to_path_buf(),
            });
        };

        let extracted = self.extractor.extract(&archive)?;
        self.assemble(processor, result_dir, &extracted)
    }

    /// Assemble one document per run group of an already extracted result.
    pub fn assemble(
        &self,
        processor: &dyn BenchmarkProcessor,
        result_dir: &Path,
        extracted: &ExtractedResult,
    ) -> Result<Vec<ZathrasDocument>, ProcessorError> {
        let test = processor.test_name();
        let groups = processor.parse_groups(extracted)?;
        if groups.iter().all(|group| group.runs.is_empty()) {
            return Err(ProcessorError::NoRuns { test: test.to_string() });
        }

        let metadata = build_metadata(test, result_dir, extracted);
        let test_info = build_test_info(test, result_dir);
        let system_under_test = self.system_info.system_under_test(result_dir);
        let test_configuration = build_test_configuration(result_dir);
        let runtime_info = build_runtime_info(test, result_dir)?;
        let status = match extracted.file(TEST_RESULTS_REPORT) {
            Some(path) => normalize_status(&read_file(path)?),
            None => STATUS_UNKNOWN.to_string(),
        };

        let mut documents = Vec::with_capacity(groups.len());
        for group in groups.into_iter().filter(|group| !group.runs.is_empty()) {
            let mut document = ZathrasDocument::new(
                metadata.clone(),
                test_info.clone(),
                system_under_test.clone(),
                test_configuration.clone(),
                Results::new(status.clone()).with_runs(group.runs),
            )
            .with_runtime_info(runtime_info.clone());

            document.assign_identity(group.benchmark.as_deref())?;

            let report = document.validate();
            if !report.is_valid() {
                warn!(document_id = %document.document_id(), errors = %report, "Document validation errors");
            }
            documents.push(document);
        }

        info!(test, documents = documents.len(), "Processed results");
        Ok(documents)
    }
}

fn build_metadata(test: &str, result_dir: &Path, extracted: &ExtractedResult) -> Metadata {
    let mut metadata = Metadata::new(test);
    Provenance::from_path(result_dir).apply(&mut metadata);
    if let Some(ts) = find_test_timestamp(test, &extracted.extracted_path) {
        metadata = metadata.with_test_timestamp(ts);
    }
    metadata
}

/// The run timestamp from the extracted directory name or one of its subdirectories.
fn find_test_timestamp(test: &str, extracted_path: &Path) -> Option<String> {
    let own_name = extracted_path.file_name().and_then(|n| n.to_str());
    if let Some(ts) = own_name.and_then(|name| parse_test_timestamp(test, name)) {
        return Some(ts);
    }

    let mut names: Vec<String> = std::fs::read_dir(extracted_path)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names.iter().find_map(|name| parse_test_timestamp(test, name))
}

fn build_test_info(test: &str, result_dir: &Path) -> TestInfo {
    let version = read_test_info_version(test, &result_dir.join("test_info"))
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
    let mut info = TestInfo::new(test, version.clone());
    info.wrapper_version = Some(version);
    info
}

fn read_test_info_version(test: &str, path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let parsed: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to parse test_info");
            return None;
        }
    };

    parsed
        .as_object()?
        .values()
        .find(|entry| entry.get("test_name").and_then(Value::as_str) == Some(test))
        .and_then(|entry| entry.get("repo_file").and_then(Value::as_str))
        .map(|repo_file| repo_file.replace(".tar.gz", ""))
        .filter(|version| !version.is_empty())
}

fn build_test_configuration(result_dir: &Path) -> TestConfiguration {
    let path = result_dir.join("ansible_vars.yml");
    let Ok(text) = std::fs::read_to_string(&path) else {
        debug!(path = %path.display(), "ansible_vars.yml not found");
        return TestConfiguration::default();
    };

    let vars: Value = match serde_yaml::from_str(&text) {
        Ok(vars) => vars,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to parse ansible_vars.yml");
            return TestConfiguration::default();
        }
    };

    let Some(config_info) = vars.get("config_info").and_then(Value::as_object) else {
        return TestConfiguration::default();
    };

    let parameters: FieldMap = config_info
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    TestConfiguration {
        iterations_requested: config_info
            .get("test_iterations")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        parameters: Some(parameters),
        ..TestConfiguration::default()
    }
}

fn build_runtime_info(test: &str, result_dir: &Path) -> Result<RuntimeInfo, ProcessorError> {
    let cmd_file = result_dir.join(format!("{test}.cmd"));
    let command = if cmd_file.exists() {
        parse_command(&read_file(&cmd_file)?)
    } else {
        None
    };

    Ok(RuntimeInfo {
        command,
        user: Some(DEFAULT_USER.to_string()),
        ..RuntimeInfo::default()
    })
}
