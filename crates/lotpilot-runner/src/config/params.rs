//! `${name}` placeholders in task files.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Values supplied on the command line with `-P key=value`.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `key=value` pairs. The value may itself contain `=`.
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(params.set(key.trim(), value)),
            _ => Err(Error::Config(format!(
                "invalid param '{}', expected key=value",
                arg
            ))),
        })
    }
}

/// A declared parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// Value a placeholder expands to. `None` leaves the placeholder untouched.
fn lookup(name: &str, params: &Params, defs: &HashMap<String, ParamDef>) -> Result<Option<String>> {
    if let Some(v) = params.get(name) {
        return Ok(Some(v.to_string()));
    }
    match defs.get(name) {
        Some(ParamDef {
            default: Some(d), ..
        }) => Ok(Some(d.clone())),
        Some(def) if def.required => Err(Error::Config(format!(
            "missing required parameter: {}",
            name
        ))),
        Some(_) => Ok(Some(String::new())),
        None => Ok(None),
    }
}

/// Expand every `${name}` in `template`. Expanded text is not rescanned.
pub fn substitute(
    template: &str,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = rest[open + 2..close].trim();
        match lookup(name, params, defs)? {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Expand placeholders in every string scalar of a YAML document.
pub fn substitute_value(
    value: &mut serde_yaml::Value,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => *s = substitute(s, params, defs)?,
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, params, defs)?;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq {
                substitute_value(v, params, defs)?;
            }
        }
        _ => {}
    }
    Ok(())
}
