//! Mount specifications and their `key=value` string form.
//!
//! ```text
//! type=bind,src=/host/path,dst=/container/path[,readonly]
//! type=volume,src=<volume id>,dst=/container/path[,readonly]
//! type=device,src=/dev/infiniband/uverbs0[,dst=/dev/...][,perm=rwm]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};

/// A filesystem or device mount requested by a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mount {
    /// Host directory bind-mounted into the container.
    Bind {
        src_path: String,
        dst_path: String,
        read_only: bool,
    },
    /// Backend-managed volume (e.g. a network filesystem id).
    Volume {
        src: String,
        dst_path: String,
        read_only: bool,
    },
    /// Host device exposed to the container.
    Device {
        src_path: String,
        dst_path: String,
        permissions: String,
    },
}

const DEFAULT_DEVICE_PERMS: &str = "rwm";

/// Parse mount specs in their `key=value` string form.
pub fn parse_mounts<S: AsRef<str>>(specs: &[S]) -> SpecResult<Vec<Mount>> {
    specs.iter().map(|s| parse_mount(s.as_ref())).collect()
}

fn parse_mount(spec: &str) -> SpecResult<Mount> {
    let invalid = |reason: String| SpecError::InvalidMount {
        mount: spec.to_string(),
        reason,
    };

    let mut kind = None;
    let mut src = None;
    let mut dst = None;
    let mut perm = None;
    let mut read_only = false;

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('=') {
            Some(("type", v)) => kind = Some(v),
            Some(("src" | "source", v)) => src = Some(v),
            Some(("dst" | "destination" | "target", v)) => dst = Some(v),
            Some(("perm" | "permissions", v)) => perm = Some(v),
            Some(("readonly", v)) => read_only = v == "true" || v == "1",
            None if part == "readonly" => read_only = true,
            _ => return Err(invalid(format!("unknown option `{part}`"))),
        }
    }

    let src = src
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing src".to_string()))?;

    match kind {
        Some("bind") => Ok(Mount::Bind {
            src_path: src.to_string(),
            dst_path: dst.ok_or_else(|| invalid("missing dst".to_string()))?.to_string(),
            read_only,
        }),
        Some("volume") => Ok(Mount::Volume {
            src: src.to_string(),
            dst_path: dst.ok_or_else(|| invalid("missing dst".to_string()))?.to_string(),
            read_only,
        }),
        Some("device") => {
            let permissions = perm.unwrap_or(DEFAULT_DEVICE_PERMS);
            if let Some(bad) = permissions.chars().find(|c| !"rwm".contains(*c)) {
                return Err(invalid(format!("invalid device permission `{bad}`")));
            }
            Ok(Mount::Device {
                src_path: src.to_string(),
                dst_path: dst.unwrap_or(src).to_string(),
                permissions: permissions.to_string(),
            })
        }
        Some(other) => Err(invalid(format!("unknown mount type `{other}`"))),
        None => Err(invalid("missing type".to_string())),
    }
}
