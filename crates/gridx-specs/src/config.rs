//! `.gridxconfig` parser.
//!
//! Holds per-backend run option defaults, one TOML table per backend:
//!
//! ```toml
//! [aws_batch]
//! queue = "training"
//! image_repo = "123456789.dkr.ecr.us-west-2.amazonaws.com/trainer"
//!
//! [local]
//! log_dir = "/tmp/gridx"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::runopts::{CfgMap, CfgVal, RunOpts};

/// File name looked up by [`GridxConfig::from_dir`].
pub const CONFIG_FILE: &str = ".gridxconfig";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridxConfig {
    #[serde(flatten)]
    pub schedulers: BTreeMap<String, toml::Table>,
}

impl GridxConfig {
    pub fn from_file(path: &Path) -> SpecResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SpecError::ConfigFile(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Load `<dir>/.gridxconfig` if it exists.
    pub fn from_dir(dir: &Path) -> SpecResult<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading gridx config");
        Self::from_file(&path).map(Some)
    }

    pub fn from_toml_str(content: &str) -> SpecResult<Self> {
        toml::from_str(content).map_err(|e| SpecError::ConfigFile(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SpecResult<String> {
        toml::to_string_pretty(self).map_err(|e| SpecError::ConfigFile(e.to_string()))
    }

    /// The raw config for `backend`, typed according to `opts`.
    ///
    /// String values for options declared with another type are parsed the
    /// same way command-line values are. Type errors are left for
    /// [`RunOpts::resolve`] to report.
    pub fn cfg_for(&self, backend: &str, opts: &RunOpts) -> SpecResult<CfgMap> {
        let mut cfg = CfgMap::new();
        let Some(table) = self.schedulers.get(backend) else {
            return Ok(cfg);
        };
        for (key, value) in table {
            let val = match (value, opts.get(key)) {
                (toml::Value::String(raw), Some(opt)) => opt.opt_type.parse(key, raw)?,
                _ => toml_to_cfg(key, value)?,
            };
            cfg.insert(key.clone(), val);
        }
        Ok(cfg)
    }

    /// Fill `cfg` with this file's values for `backend` without overriding
    /// anything already set.
    pub fn apply(&self, backend: &str, opts: &RunOpts, cfg: &mut CfgMap) -> SpecResult<()> {
        for (key, val) in self.cfg_for(backend, opts)? {
            cfg.entry(key).or_insert(val);
        }
        Ok(())
    }
}

fn toml_to_cfg(key: &str, value: &toml::Value) -> SpecResult<CfgVal> {
    let unsupported = |reason: &str| SpecError::InvalidConfigValue {
        option: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    match value {
        toml::Value::String(s) => Ok(CfgVal::Str(s.clone())),
        toml::Value::Integer(i) => Ok(CfgVal::Int(*i)),
        toml::Value::Float(f) => Ok(CfgVal::Float(*f)),
        toml::Value::Boolean(b) => Ok(CfgVal::Bool(*b)),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| unsupported("lists may only contain strings"))
            })
            .collect::<SpecResult<Vec<_>>>()
            .map(CfgVal::List),
        _ => Err(unsupported("unsupported value type")),
    }
}
