//! Per-replica macro substitution in role args and env.
//!
//! Backends expand these when materializing one replica of a role:
//!
//! - `${img_root}`: root directory of the image on the host
//! - `${app_id}`: the id the backend assigns to the application
//! - `${replica_id}`: index of the replica within its role
//! - `${rank0_env}`: name of the env var holding the rank-0 host address

use crate::role::Role;

pub const IMG_ROOT: &str = "${img_root}";
pub const APP_ID: &str = "${app_id}";
pub const REPLICA_ID: &str = "${replica_id}";
pub const RANK0_ENV: &str = "${rank0_env}";

/// Values substituted for the macros of one replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values {
    pub img_root: String,
    pub app_id: String,
    pub replica_id: String,
    pub rank0_env: String,
}

impl Values {
    /// Expand every macro in `s`.
    pub fn substitute(&self, s: &str) -> String {
        s.replace(IMG_ROOT, &self.img_root)
            .replace(APP_ID, &self.app_id)
            .replace(REPLICA_ID, &self.replica_id)
            .replace(RANK0_ENV, &self.rank0_env)
    }

    /// A copy of `role` with macros expanded in its args and env values.
    pub fn apply(&self, role: &Role) -> Role {
        let mut out = role.clone();
        out.args = role.args.iter().map(|a| self.substitute(a)).collect();
        for value in out.env.values_mut() {
            *value = self.substitute(value);
        }
        out
    }
}
