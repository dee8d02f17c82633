//! gridx-specs: the backend-agnostic description of a distributed app.
//!
//! Everything a caller needs to describe a job and everything a scheduler
//! backend needs to accept one:
//!
//! - **`app`** / **`role`**: application and role definitions
//! - **`resource`** / **`named_resources`**: resource requests and the named shape registry
//! - **`runopts`**: typed backend options and their validator
//! - **`handle`**: `<backend>://<session>/<app_id>` encoding
//! - **`types`**: status snapshots reported by backends
//! - **`macros`** / **`mounts`**: per-replica substitution and mount specs
//! - **`config`**: `.gridxconfig` defaults per backend

pub mod app;
pub mod config;
pub mod error;
pub mod handle;
pub mod macros;
pub mod mounts;
pub mod named_resources;
pub mod resource;
pub mod role;
pub mod runopts;
pub mod types;

pub use app::AppDef;
pub use config::GridxConfig;
pub use error::{ConfigError, ConfigViolation, SpecError, SpecResult};
pub use handle::{AppHandle, make_app_handle, parse_app_handle};
pub use mounts::{Mount, parse_mounts};
pub use named_resources::{
    NamedResourceProvider, NamedResources, ResourceFactory, get_named_resource,
    init_named_resources, named_resources, resource,
};
pub use resource::{NULL_RESOURCE, Resource};
pub use role::{RetryPolicy, Role, RolePreProc};
pub use runopts::{CfgMap, CfgVal, OptType, RunConfig, RunOpt, RunOpts};
pub use types::*;
