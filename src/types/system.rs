//! System Under Test description.
//!
//! Every section is optional and every absent field is left out of the JSON,
//! so an empty `SystemUnderTest` serializes as `{}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FieldMap;

/// CPU hardware information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// CPU vendor string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// CPU model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// e.g. `x86_64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Physical cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    /// Hardware threads per core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_per_core: Option<u32>,
    /// Populated sockets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sockets: Option<u32>,
    /// NUMA node count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa_nodes: Option<u32>,
    /// Nominal frequency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<f64>,
    /// L1 data cache size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_l1d: Option<String>,
    /// L1 instruction cache size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_l1i: Option<String>,
    /// L2 cache size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_l2: Option<String>,
    /// L3 cache size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_l3: Option<String>,
    /// Feature flags as an object (`{"avx2": true}`) rather than a list.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
}

/// Memory hardware information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Installed memory in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_gb: Option<u64>,
    /// `MemTotal` in KiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_kb: Option<u64>,
    /// `MemAvailable` in KiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_kb: Option<u64>,
    /// DIMM speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mhz: Option<u64>,
    /// DIMM type, serialized as `type`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
}

/// Hardware section. NUMA nodes, storage devices and network interfaces are
/// keyed objects (`node_0`, `device_0`, `interface_0`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    /// Processor details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuInfo>,
    /// Memory details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    /// Per-node details keyed `node_<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<FieldMap>,
    /// Block devices keyed `device_<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<FieldMap>,
    /// Interfaces keyed `interface_<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<FieldMap>,
}

/// Operating system information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystemInfo {
    /// Distribution name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    /// Distribution version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Running kernel release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    /// Host name of the SUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// System tuning and kernel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationInfo {
    /// Active tuned profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuned_profile: Option<String>,
    /// SELinux mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selinux_status: Option<String>,
    /// THP setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_hugepages: Option<String>,
    /// Captured sysctl values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysctl_parameters: Option<BTreeMap<String, String>>,
    /// Kernel command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_parameters: Option<String>,
}

/// Complete System Under Test metadata, copied by value into every
/// timeseries document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemUnderTest {
    /// Hardware section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareInfo>,
    /// Operating system section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<OperatingSystemInfo>,
    /// System configuration section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ConfigurationInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sut_serializes_as_empty_object() {
        let sut = SystemUnderTest::default();
        assert_eq!(serde_json::to_string(&sut).unwrap(), "{}");
    }

    #[test]
    fn test_memory_type_renamed() {
        let mem = MemoryInfo {
            memory_type: Some("DDR5".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&mem).unwrap(), r#"{"type":"DDR5"}"#);
    }

    #[test]
    fn test_cpu_flags_are_object() {
        let mut cpu = CpuInfo::default();
        cpu.flags.insert("avx2".to_string(), true);
        let value = serde_json::to_value(&cpu).unwrap();
        assert_eq!(value["flags"]["avx2"], serde_json::Value::Bool(true));
    }
}
