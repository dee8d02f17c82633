//! Typed run options declared by a scheduler backend.
//!
//! A backend publishes its accepted configuration as a [`RunOpts`] schema.
//! Callers hand in a loose [`CfgMap`]; [`RunOpts::resolve`] checks it against
//! the schema and produces a [`RunConfig`], the only form of configuration a
//! backend ever sees.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigViolation, SpecError, SpecResult};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CfgVal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl CfgVal {
    /// The type this value carries.
    pub fn opt_type(&self) -> OptType {
        match self {
            CfgVal::Bool(_) => OptType::Bool,
            CfgVal::Int(_) => OptType::Int,
            CfgVal::Float(_) => OptType::Float,
            CfgVal::Str(_) => OptType::Str,
            CfgVal::List(_) => OptType::List,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CfgVal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CfgVal::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CfgVal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CfgVal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            CfgVal::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for CfgVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgVal::Bool(b) => write!(f, "{b}"),
            CfgVal::Int(i) => write!(f, "{i}"),
            CfgVal::Float(x) => write!(f, "{x}"),
            CfgVal::Str(s) => f.write_str(s),
            CfgVal::List(l) => f.write_str(&l.join(";")),
        }
    }
}

impl From<&str> for CfgVal {
    fn from(s: &str) -> Self {
        CfgVal::Str(s.to_string())
    }
}

impl From<String> for CfgVal {
    fn from(s: String) -> Self {
        CfgVal::Str(s)
    }
}

impl From<i64> for CfgVal {
    fn from(i: i64) -> Self {
        CfgVal::Int(i)
    }
}

impl From<f64> for CfgVal {
    fn from(x: f64) -> Self {
        CfgVal::Float(x)
    }
}

impl From<bool> for CfgVal {
    fn from(b: bool) -> Self {
        CfgVal::Bool(b)
    }
}

impl From<Vec<String>> for CfgVal {
    fn from(l: Vec<String>) -> Self {
        CfgVal::List(l)
    }
}

/// Declared type of a run option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptType {
    Str,
    Int,
    Float,
    Bool,
    List,
}

impl OptType {
    pub fn name(&self) -> &'static str {
        match self {
            OptType::Str => "str",
            OptType::Int => "int",
            OptType::Float => "float",
            OptType::Bool => "bool",
            OptType::List => "list[str]",
        }
    }

    /// Parse a raw string (as found on a command line) into a value of this type.
    pub fn parse(&self, option: &str, raw: &str) -> SpecResult<CfgVal> {
        let invalid = |reason: &str| SpecError::InvalidConfigValue {
            option: option.to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        match self {
            OptType::Str => Ok(CfgVal::Str(raw.to_string())),
            OptType::Int => raw
                .trim()
                .parse()
                .map(CfgVal::Int)
                .map_err(|_| invalid("expected an integer")),
            OptType::Float => raw
                .trim()
                .parse()
                .map(CfgVal::Float)
                .map_err(|_| invalid("expected a float")),
            OptType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(CfgVal::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(CfgVal::Bool(false)),
                _ => Err(invalid("expected a boolean")),
            },
            OptType::List => Ok(CfgVal::List(
                raw.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for OptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loose, unvalidated configuration as supplied by a caller.
pub type CfgMap = BTreeMap<String, CfgVal>;

/// Declaration of one run option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOpt {
    pub opt_type: OptType,
    pub required: bool,
    pub default: Option<CfgVal>,
    pub help: String,
}

/// The option schema of one scheduler backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOpts {
    opts: BTreeMap<String, RunOpt>,
}

impl RunOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an option. Registering an existing name replaces it.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        opt_type: OptType,
        required: bool,
        default: Option<CfgVal>,
        help: impl Into<String>,
    ) -> &mut Self {
        self.opts.insert(
            name.into(),
            RunOpt {
                opt_type,
                required,
                default,
                help: help.into(),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&RunOpt> {
        self.opts.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RunOpt)> {
        self.opts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.opts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }

    /// Validate `cfg` against this schema and fill in defaults.
    ///
    /// Every violation is collected before failing. Keys that the schema does
    /// not declare are carried through untouched.
    pub fn resolve(&self, cfg: &CfgMap) -> Result<RunConfig, ConfigError> {
        let mut resolved = cfg.clone();
        let mut violations = Vec::new();

        for (name, opt) in &self.opts {
            let mismatch = |val: &CfgVal| {
                let actual = val.opt_type();
                (actual != opt.opt_type).then(|| ConfigViolation::TypeMismatch {
                    option: name.clone(),
                    expected: opt.opt_type.name(),
                    actual: actual.name(),
                })
            };
            match cfg.get(name) {
                Some(val) => violations.extend(mismatch(val)),
                None => match &opt.default {
                    // Defaults must have the declared type too.
                    Some(default) => match mismatch(default) {
                        Some(violation) => violations.push(violation),
                        None => {
                            resolved.insert(name.clone(), default.clone());
                        }
                    },
                    None if opt.required => violations.push(ConfigViolation::Missing {
                        option: name.clone(),
                        help: opt.help.clone(),
                    }),
                    None => {}
                },
            }
        }

        if violations.is_empty() {
            Ok(RunConfig { values: resolved })
        } else {
            Err(ConfigError { violations })
        }
    }

    /// Parse `k1=v1,k2=v2` into a config map, converting each value to the
    /// declared type of its option. List values are `;`-separated.
    ///
    /// Keys the schema does not declare are kept as strings.
    pub fn cfg_from_str(&self, s: &str) -> SpecResult<CfgMap> {
        let mut cfg = CfgMap::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| SpecError::InvalidConfigValue {
                    option: pair.to_string(),
                    value: String::new(),
                    reason: "expected key=value".to_string(),
                })?;
            let key = key.trim();
            let val = match self.opts.get(key) {
                Some(opt) => opt.opt_type.parse(key, raw)?,
                None => CfgVal::Str(raw.to_string()),
            };
            cfg.insert(key.to_string(), val);
        }
        Ok(cfg)
    }
}

impl fmt::Display for RunOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, opt) in &self.opts {
            let req = if opt.required { "required" } else { "optional" };
            write!(f, "    {name} ({}, {req})", opt.opt_type)?;
            if let Some(default) = &opt.default {
                write!(f, " [default: {default}]")?;
            }
            writeln!(f)?;
            if !opt.help.is_empty() {
                writeln!(f, "        {}", opt.help)?;
            }
        }
        Ok(())
    }
}

/// Configuration that passed [`RunOpts::resolve`].
///
/// Every required option is present and every declared option has its
/// declared type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunConfig {
    values: CfgMap,
}

impl RunConfig {
    pub fn get(&self, name: &str) -> Option<&CfgVal> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CfgVal::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(CfgVal::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(CfgVal::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(CfgVal::as_bool)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(CfgVal::as_list)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CfgVal)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
