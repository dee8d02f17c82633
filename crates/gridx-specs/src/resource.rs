//! Resource requests attached to roles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default vCPUs for [`crate::resource`] when none is given.
pub const DEFAULT_CPU: u32 = 2;
/// Default GPUs for [`crate::resource`] when none is given.
pub const DEFAULT_GPU: u32 = 0;
/// Default memory (MB) for [`crate::resource`] when none is given.
pub const DEFAULT_MEM_MB: u64 = 1024;

/// One GiB expressed in MB.
pub const GIB: u64 = 1024;

/// The per-replica resource request of a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub cpu: u32,
    pub gpu: u32,
    pub mem_mb: u64,
    /// Backend-interpreted tags, e.g. an instance type selector.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, String>,
}

/// Sentinel for "resource not specified".
///
/// This is not a request for zero resources. A role that still carries it at
/// submission time is rejected before any backend call.
pub const NULL_RESOURCE: Resource = Resource {
    cpu: u32::MAX,
    gpu: u32::MAX,
    mem_mb: u64::MAX,
    capabilities: BTreeMap::new(),
};

impl Resource {
    pub fn new(cpu: u32, gpu: u32, mem_mb: u64) -> Self {
        Self {
            cpu,
            gpu,
            mem_mb,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capability(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.capabilities.insert(key.into(), value.into());
        self
    }

    /// Whether the numeric request is the [`NULL_RESOURCE`] sentinel.
    /// Capabilities are ignored.
    pub fn is_null(&self) -> bool {
        self.cpu == NULL_RESOURCE.cpu
            && self.gpu == NULL_RESOURCE.gpu
            && self.mem_mb == NULL_RESOURCE.mem_mb
    }
}

impl Default for Resource {
    fn default() -> Self {
        NULL_RESOURCE
    }
}
