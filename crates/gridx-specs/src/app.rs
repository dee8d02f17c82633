//! Application definitions.

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};
use crate::role::Role;

/// A distributed application: a name and an ordered list of roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDef {
    pub name: String,
    pub roles: Vec<Role>,
}

impl AppDef {
    pub fn new(name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            name: name.into(),
            roles,
        }
    }

    /// Check the structural invariants every backend relies on.
    pub fn validate(&self) -> SpecResult<()> {
        if self.name.trim().is_empty() {
            return Err(SpecError::InvalidApp("app name is empty".to_string()));
        }
        if self.roles.is_empty() {
            return Err(SpecError::InvalidApp(format!(
                "app `{}` has no roles",
                self.name
            )));
        }
        for role in &self.roles {
            if role.name.is_empty() {
                return Err(SpecError::InvalidApp(format!(
                    "app `{}` has a role without a name",
                    self.name
                )));
            }
            if role.num_replicas == 0 {
                return Err(SpecError::InvalidApp(format!(
                    "role `{}` must have at least one replica",
                    role.name
                )));
            }
        }
        Ok(())
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Total replicas across every role.
    pub fn total_replicas(&self) -> u32 {
        self.roles.iter().map(|r| r.num_replicas).sum()
    }
}
