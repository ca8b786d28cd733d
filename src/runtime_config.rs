//! # Runtime Configuration Module
//!
//! Explicit configuration for the dispatch core. A [`RuntimeConfig`] is built
//! once by the composition root and threaded through the registry and
//! dispatcher builders; nothing in the core reads process-wide switches on
//! its own.
//!
//! ## Sources
//!
//! - [`RuntimeConfig::default()`] - the production path
//! - [`RuntimeConfig::from_env()`] - environment overrides
//! - [`RuntimeConfig::from_yaml_str()`] / [`RuntimeConfig::from_yaml_file()`]
//!
//! ## Environment Variables
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `SWITCHYARD_STACK_SIZE` | coroutine stack size for background tasks, decimal or `0x` hex | `0x4000` |
//! | `SWITCHYARD_DUPLICATE_POLICY` | `replace` or `reject` for duplicate registrations | `replace` |
//! | `SWITCHYARD_VALIDATE_RESPONSES` | validate handler output against `response_schema` (log only) | `false` |
//!
//! ## YAML
//!
//! ```yaml
//! stack_size: 0x8000
//! duplicate_policy: reject
//! validate_responses: true
//! ```

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use tracing::warn;

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// What to do when a route `(method, path)` or a service name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Last registration wins; the replacement is logged at `warn`.
    #[default]
    Replace,
    /// Duplicate registration is a configuration error.
    Reject,
}

impl DuplicatePolicy {
    /// Parse a policy name case-insensitively; `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Some(DuplicatePolicy::Replace),
            "reject" | "error" => Some(DuplicatePolicy::Reject),
            _ => None,
        }
    }
}

/// Runtime configuration for the dispatch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stack size for coroutines spawned by the background executor
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub stack_size: usize,
    pub duplicate_policy: DuplicatePolicy,
    /// Validate handler responses against the route's response schema.
    /// Mismatches are logged, never returned to the caller.
    pub validate_responses: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            duplicate_policy: DuplicatePolicy::Replace,
            validate_responses: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        RuntimeConfig {
            stack_size: env::var("SWITCHYARD_STACK_SIZE")
                .ok()
                .and_then(|v| parse_stack_size(&v))
                .unwrap_or(defaults.stack_size),
            duplicate_policy: env::var("SWITCHYARD_DUPLICATE_POLICY")
                .ok()
                .and_then(|v| {
                    let parsed = DuplicatePolicy::parse(&v);
                    if parsed.is_none() {
                        warn!(
                            value = %v,
                            fallback = ?defaults.duplicate_policy,
                            "Unknown SWITCHYARD_DUPLICATE_POLICY, using default"
                        );
                    }
                    parsed
                })
                .unwrap_or(defaults.duplicate_policy),
            validate_responses: env::var("SWITCHYARD_VALIDATE_RESPONSES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.validate_responses),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid runtime configuration")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn with_validate_responses(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }
}

fn parse_stack_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

fn deserialize_stack_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => parse_stack_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_size_accepts_hex_and_decimal() {
        assert_eq!(parse_stack_size("0x8000"), Some(0x8000));
        assert_eq!(parse_stack_size("32768"), Some(32768));
        assert_eq!(parse_stack_size("lots"), None);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let cfg = RuntimeConfig::from_yaml_str(
            "stack_size: \"0x8000\"\nduplicate_policy: reject\n",
        )
        .unwrap();
        assert_eq!(cfg.stack_size, 0x8000);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Reject);
        assert!(!cfg.validate_responses);
    }
}
