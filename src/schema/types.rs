use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

use super::infer::normalize_header_name;

/// Where a request value is extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParameterSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterSource::Path => "path",
            ParameterSource::Query => "query",
            ParameterSource::Header => "header",
            ParameterSource::Cookie => "cookie",
            ParameterSource::Body => "body",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Some(ParameterSource::Path),
            "query" => Some(ParameterSource::Query),
            "header" => Some(ParameterSource::Header),
            "cookie" => Some(ParameterSource::Cookie),
            "body" => Some(ParameterSource::Body),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generator of default values; invoked on every access, never cached.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// One entry of a route's declarative parameter-source table.
///
/// An entry carries at most one of a static default and a default factory.
/// Asking for both is rejected by the builder, so a bad table fails at
/// registration time rather than on the first request.
///
/// ```
/// use serde_json::json;
/// use switchyard::schema::ParamSpec;
///
/// let page = ParamSpec::query("page")
///     .with_type("integer")
///     .with_default(json!(1))
///     .unwrap();
/// assert_eq!(page.get_default(), Some(json!(1)));
/// assert!(page.with_default_factory(|| json!(2)).is_err());
/// ```
#[derive(Clone)]
pub struct ParamSpec {
    name: String,
    source: ParameterSource,
    schema_type: Option<String>,
    default: Option<Value>,
    default_factory: Option<DefaultFactory>,
    validation: Option<Value>,
    alias: Option<String>,
    convert_underscores: bool,
}

impl ParamSpec {
    pub fn new(source: ParameterSource, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            schema_type: None,
            default: None,
            default_factory: None,
            validation: None,
            alias: None,
            convert_underscores: true,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Path, name)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Query, name)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Header, name)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Cookie, name)
    }

    /// Body input; `schema` becomes the route's inferred request schema.
    pub fn body(name: impl Into<String>, schema: Value) -> Self {
        Self::new(ParameterSource::Body, name).with_validation(schema)
    }

    #[must_use]
    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.schema_type = Some(ty.into());
        self
    }

    /// JSON-Schema fragment merged into the inferred property schema
    #[must_use]
    pub fn with_validation(mut self, fragment: Value) -> Self {
        self.validation = Some(fragment);
        self
    }

    /// Wire name for header parameters (e.g. `X-Api-Key` for `api_key`)
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_underscore_conversion(mut self, enabled: bool) -> Self {
        self.convert_underscores = enabled;
        self
    }

    pub fn with_default(mut self, value: Value) -> Result<Self, DispatchError> {
        if self.default_factory.is_some() {
            return Err(self.conflicting_defaults());
        }
        self.default = Some(value);
        Ok(self)
    }

    pub fn with_default_factory<F>(mut self, factory: F) -> Result<Self, DispatchError>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        if self.default.is_some() {
            return Err(self.conflicting_defaults());
        }
        self.default_factory = Some(Arc::new(factory));
        Ok(self)
    }

    fn conflicting_defaults(&self) -> DispatchError {
        DispatchError::invalid_argument(format!(
            "parameter \"{}\" cannot declare both a default and a default factory",
            self.name
        ))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> ParameterSource {
        self.source
    }

    #[must_use]
    pub fn schema_type(&self) -> Option<&str> {
        self.schema_type.as_deref()
    }

    #[must_use]
    pub fn validation(&self) -> Option<&Value> {
        self.validation.as_ref()
    }

    /// Static default, if one was declared (the factory is not consulted)
    #[must_use]
    pub fn static_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.default_factory.is_some()
    }

    /// The default value; a factory is invoked fresh on every call.
    #[must_use]
    pub fn get_default(&self) -> Option<Value> {
        match (&self.default, &self.default_factory) {
            (Some(v), _) => Some(v.clone()),
            (None, Some(factory)) => Some(factory()),
            (None, None) => None,
        }
    }

    /// Property key in the parameter schema.
    ///
    /// Header keys are lower-cased and hyphenated (`X_Custom` -> `x-custom`).
    #[must_use]
    pub fn key(&self) -> String {
        match self.source {
            ParameterSource::Header => normalize_header_name(
                self.alias.as_deref().unwrap_or(&self.name),
                self.convert_underscores,
            ),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("schema_type", &self.schema_type)
            .field("default", &self.default)
            .field("has_default_factory", &self.default_factory.is_some())
            .field("alias", &self.alias)
            .finish()
    }
}
