//! Named resource registry.
//!
//! Roles usually ask for a resource shape by name (`aws_p3.2xlarge`) rather
//! than spelling out cpu/gpu/memory. The table behind those names is built
//! from a fixed set of built-in shapes, overlaid by whatever an explicitly
//! registered [`NamedResourceProvider`] contributes:
//!
//! ```text
//! built-in shapes  ──►  provider factories (override on collision)  ──►  "NULL" (always the sentinel)
//! ```
//!
//! The process-wide table is built at most once. Call
//! [`init_named_resources`] at startup to include a provider; the first
//! lookup without one freezes the table with built-ins only.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::error::{SpecError, SpecResult};
use crate::resource::{DEFAULT_CPU, DEFAULT_GPU, DEFAULT_MEM_MB, GIB, NULL_RESOURCE, Resource};

/// Name that always resolves to [`NULL_RESOURCE`].
pub const NULL_RESOURCE_NAME: &str = "NULL";

/// Capability key carrying the instance type a shape was modeled after.
pub const INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";

/// Produces a resource shape on demand.
pub type ResourceFactory = Arc<dyn Fn() -> Resource + Send + Sync>;

/// Source of externally registered named resources.
pub trait NamedResourceProvider: Send + Sync {
    /// Return every named resource this provider contributes.
    fn load_named_resource_factories(&self) -> HashMap<String, ResourceFactory>;
}

/// Provider that contributes nothing; the table is built-ins only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNamedResources;

impl NamedResourceProvider for NoNamedResources {
    fn load_named_resource_factories(&self) -> HashMap<String, ResourceFactory> {
        HashMap::new()
    }
}

fn aws(cpu: u32, gpu: u32, mem_gib: u64, itype: &str) -> Resource {
    Resource::new(cpu, gpu, mem_gib * GIB).with_capability(INSTANCE_TYPE, itype)
}

fn builtin_shapes() -> Vec<(&'static str, Resource)> {
    vec![
        ("aws_t3.medium", aws(2, 0, 4, "t3.medium")),
        ("aws_m5.2xlarge", aws(8, 0, 32, "m5.2xlarge")),
        ("aws_g4dn.xlarge", aws(4, 1, 16, "g4dn.xlarge")),
        ("aws_g4dn.12xlarge", aws(48, 4, 192, "g4dn.12xlarge")),
        ("aws_g5.xlarge", aws(4, 1, 16, "g5.xlarge")),
        ("aws_p3.2xlarge", aws(8, 1, 61, "p3.2xlarge")),
        ("aws_p3.8xlarge", aws(32, 4, 244, "p3.8xlarge")),
        ("aws_p3.16xlarge", aws(64, 8, 488, "p3.16xlarge")),
        ("aws_p3dn.24xlarge", aws(96, 8, 768, "p3dn.24xlarge")),
    ]
}

/// A materialized name → resource table.
#[derive(Debug, Clone)]
pub struct NamedResources {
    table: BTreeMap<String, Resource>,
}

impl NamedResources {
    /// Built-in shapes plus the `NULL` entry.
    pub fn builtin() -> Self {
        Self::with_provider(&NoNamedResources)
    }

    /// Built-in shapes overlaid by `provider`, plus the `NULL` entry.
    pub fn with_provider(provider: &dyn NamedResourceProvider) -> Self {
        let mut table: BTreeMap<String, Resource> = builtin_shapes()
            .into_iter()
            .map(|(name, res)| (name.to_string(), res))
            .collect();

        for (name, factory) in provider.load_named_resource_factories() {
            if name == NULL_RESOURCE_NAME {
                warn!("ignoring provider attempt to redefine the NULL resource");
                continue;
            }
            if table.contains_key(&name) {
                debug!(%name, "named resource overridden by provider");
            }
            table.insert(name, factory());
        }

        table.insert(NULL_RESOURCE_NAME.to_string(), NULL_RESOURCE);
        Self { table }
    }

    /// Look up a shape by name.
    pub fn get(&self, name: &str) -> SpecResult<Resource> {
        self.table
            .get(name)
            .cloned()
            .ok_or_else(|| SpecError::UnknownResource(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Build a resource from either a registered name or raw fields.
    ///
    /// A non-empty `name` wins: the raw fields are ignored and the name must
    /// be registered. Otherwise unspecified fields take the defaults
    /// (cpu=2, gpu=0, mem=1024 MB).
    pub fn resource(
        &self,
        cpu: Option<u32>,
        gpu: Option<u32>,
        mem_mb: Option<u64>,
        name: Option<&str>,
    ) -> SpecResult<Resource> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self.get(name),
            None => Ok(Resource::new(
                cpu.unwrap_or(DEFAULT_CPU),
                gpu.unwrap_or(DEFAULT_GPU),
                mem_mb.unwrap_or(DEFAULT_MEM_MB),
            )),
        }
    }
}

static NAMED_RESOURCES: OnceLock<NamedResources> = OnceLock::new();

/// Build the process-wide table with `provider` overlaid on the built-ins.
///
/// Returns `false` if the table was already built, in which case `provider`
/// is not consulted.
pub fn init_named_resources(provider: &dyn NamedResourceProvider) -> bool {
    let mut initialized = false;
    NAMED_RESOURCES.get_or_init(|| {
        initialized = true;
        NamedResources::with_provider(provider)
    });
    if !initialized {
        warn!("named resources already initialized, provider ignored");
    }
    initialized
}

/// The process-wide table, built with built-ins only on first access if
/// [`init_named_resources`] was never called.
pub fn named_resources() -> &'static NamedResources {
    NAMED_RESOURCES.get_or_init(NamedResources::builtin)
}

/// Look up a shape in the process-wide table.
pub fn get_named_resource(name: &str) -> SpecResult<Resource> {
    named_resources().get(name)
}

/// [`NamedResources::resource`] against the process-wide table.
pub fn resource(
    cpu: Option<u32>,
    gpu: Option<u32>,
    mem_mb: Option<u64>,
    name: Option<&str>,
) -> SpecResult<Resource> {
    named_resources().resource(cpu, gpu, mem_mb, name)
}
