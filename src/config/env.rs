//! Environment variable resolution.
//!
//! # Responsibilities
//! - Snapshot the process environment once at startup
//! - Resolve named variables with required/default/optional semantics
//! - Convert resolved strings into typed values
//!
//! # Design Decisions
//! - Resolution is a pure function of an [`Environment`] snapshot
//! - Errors are returned, never raised; the caller decides what is fatal

use std::collections::HashMap;
use std::str::FromStr;

use crate::config::ConfigError;

/// An immutable snapshot of environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Look up a variable, treating empty values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Declaration of a single configuration variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvVar {
    pub name: &'static str,
    pub default_value: &'static str,
    pub required: bool,
}

impl EnvVar {
    /// A required variable that falls back to `default_value` when unset.
    pub const fn with_default(name: &'static str, default_value: &'static str) -> Self {
        Self { name, default_value, required: true }
    }

    /// A required variable with no fallback.
    pub const fn required(name: &'static str) -> Self {
        Self { name, default_value: "", required: true }
    }

    /// A variable that resolves to the empty string when unset.
    pub const fn optional(name: &'static str) -> Self {
        Self { name, default_value: "", required: false }
    }

    /// Resolve the raw string value.
    pub fn resolve(&self, env: &Environment) -> Result<String, ConfigError> {
        if let Some(value) = env.get(self.name) {
            return Ok(value.to_string());
        }
        if self.default_value.is_empty() && self.required {
            return Err(ConfigError::MissingRequired { name: self.name });
        }
        Ok(self.default_value.to_string())
    }

    /// Resolve as a base-10 signed 64-bit integer.
    pub fn resolve_i64(&self, env: &Environment) -> Result<i64, ConfigError> {
        self.resolve_parsed(env)
    }

    /// Resolve as a boolean; only the literals `true` and `false` are accepted.
    pub fn resolve_bool(&self, env: &Environment) -> Result<bool, ConfigError> {
        let value = self.resolve(env)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name: self.name,
                value,
                reason: "expected `true` or `false`".to_string(),
            }),
        }
    }

    /// Resolve and parse with the target type's [`FromStr`] impl.
    pub fn resolve_parsed<T>(&self, env: &Environment) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.resolve(env)?;
        value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            name: self.name,
            reason: e.to_string(),
            value,
        })
    }
}
