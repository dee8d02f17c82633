//! Roles: homogeneous groups of replicas within an application.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mounts::Mount;
use crate::resource::{NULL_RESOURCE, Resource};
use crate::runopts::RunConfig;

/// How a backend restarts failed replicas.
///
/// The number of attempts comes from [`Role::max_retries`]; zero means no
/// retries regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryPolicy {
    /// Restart only the failed replica.
    Replica,
    /// Restart every replica of the application.
    #[default]
    Application,
}

type PreProcFn = dyn Fn(&mut Role, &RunConfig) -> anyhow::Result<()> + Send + Sync;

/// Hook run once per role during submission, after config validation and
/// before the dry-run request is built. It may rewrite the role in place.
#[derive(Clone)]
pub struct RolePreProc(Arc<PreProcFn>);

impl RolePreProc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Role, &RunConfig) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, role: &mut Role, cfg: &RunConfig) -> anyhow::Result<()> {
        (self.0)(role, cfg)
    }
}

impl fmt::Debug for RolePreProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RolePreProc(..)")
    }
}

/// One role of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub image: String,
    pub entrypoint: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_replicas")]
    pub num_replicas: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub resource: Resource,
    #[serde(default)]
    pub port_map: BTreeMap<String, u16>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    #[serde(skip)]
    pub pre_proc: Option<RolePreProc>,
}

fn default_replicas() -> u32 {
    1
}

impl Role {
    /// A single-replica role with no resource assigned yet.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            entrypoint: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            num_replicas: 1,
            max_retries: 0,
            retry_policy: RetryPolicy::default(),
            resource: NULL_RESOURCE,
            port_map: BTreeMap::new(),
            mounts: Vec::new(),
            pre_proc: None,
        }
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = entrypoint.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_replicas(mut self, num_replicas: u32) -> Self {
        self.num_replicas = num_replicas;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, policy: RetryPolicy) -> Self {
        self.max_retries = max_retries;
        self.retry_policy = policy;
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.port_map.insert(name.into(), port);
        self
    }

    pub fn with_mounts(mut self, mounts: Vec<Mount>) -> Self {
        self.mounts = mounts;
        self
    }

    pub fn with_pre_proc<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Role, &RunConfig) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_proc = Some(RolePreProc::new(f));
        self
    }

    /// Run the pre-processing hook, if any.
    pub fn run_pre_proc(&mut self, cfg: &RunConfig) -> anyhow::Result<()> {
        match self.pre_proc.clone() {
            Some(hook) => hook.call(self, cfg),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_role_has_null_resource_and_one_replica() {
        let role = Role::new("trainer", "pytorch:latest");
        assert!(role.resource.is_null());
        assert_eq!(role.num_replicas, 1);
        assert_eq!(role.retry_policy, RetryPolicy::Application);
    }

    #[test]
    fn pre_proc_may_mutate_role() {
        let mut role = Role::new("trainer", "img").with_pre_proc(|role, _cfg| {
            role.env.insert("INJECTED".into(), "1".into());
            Ok(())
        });
        role.run_pre_proc(&RunConfig::default()).unwrap();
        assert_eq!(role.env["INJECTED"], "1");
    }

    #[test]
    fn role_without_pre_proc_is_noop() {
        let mut role = Role::new("trainer", "img");
        role.run_pre_proc(&RunConfig::default()).unwrap();
        assert!(role.env.is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let role: Role = serde_json::from_str(
            r#"{"name": "r", "image": "img", "entrypoint": "main.py"}"#,
        )
        .unwrap();
        assert_eq!(role.num_replicas, 1);
        assert!(role.resource.is_null());
        assert!(role.pre_proc.is_none());
    }
}
