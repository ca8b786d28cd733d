use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

static METHOD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("rpc method name regex should be valid"));

/// RPC metadata attached to a route (method name, schemas, tags).
///
/// Instances are immutable once built: the `with_*` methods consume and
/// return `self`. [`to_map`](Self::to_map) and [`from_map`](Self::from_map)
/// round-trip every field, tag order included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMethodInfo {
    method_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    params_schema: Option<Value>,
    #[serde(default)]
    result_schema: Option<Value>,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    tags: Vec<String>,
}

impl RpcMethodInfo {
    /// Fails with `invalid_argument` unless `method_name` is non-empty and
    /// made of word characters, dots and underscores.
    pub fn new(method_name: impl Into<String>) -> Result<Self, DispatchError> {
        let method_name = method_name.into();
        validate_method_name(&method_name)?;
        Ok(Self {
            method_name,
            description: None,
            params_schema: None,
            result_schema: None,
            deprecated: false,
            tags: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_params_schema(mut self, schema: Value) -> Self {
        self.params_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_result_schema(mut self, schema: Value) -> Self {
        self.result_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn params_schema(&self) -> Option<&Value> {
        self.params_schema.as_ref()
    }

    #[must_use]
    pub fn result_schema(&self) -> Option<&Value> {
        self.result_schema.as_ref()
    }

    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Map form with `methodName`, `description`, `paramsSchema`,
    /// `resultSchema`, `deprecated` and `tags` keys.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, DispatchError> {
        let info: RpcMethodInfo = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| DispatchError::invalid_argument(format!("invalid RPC method info: {e}")))?;
        validate_method_name(&info.method_name)?;
        Ok(info)
    }
}

fn validate_method_name(name: &str) -> Result<(), DispatchError> {
    if name.is_empty() {
        return Err(DispatchError::invalid_argument(
            "RPC method name must not be empty",
        ));
    }
    if !METHOD_NAME.is_match(name) {
        return Err(DispatchError::invalid_argument(format!(
            "RPC method name \"{name}\" may only contain word characters, dots and underscores"
        )));
    }
    Ok(())
}
