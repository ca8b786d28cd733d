//! Parameter schema inference from a declarative parameter table.

use serde_json::{json, Map, Value};

use super::types::{ParamSpec, ParameterSource};

/// One `/`-separated piece of a route path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    /// Matched verbatim, colons and braces included (`items:batch`, `{name}.json`)
    Literal(&'a str),
    /// `{id}`, `{id:int}`, `{rest:path}` or `:id`
    Param {
        name: &'a str,
        converter: Option<&'a str>,
    },
}

impl<'a> PathSegment<'a> {
    /// Classify a single segment. Only a segment that is entirely `{...}`
    /// or that starts with `:` is a placeholder.
    #[must_use]
    pub fn parse(segment: &'a str) -> Self {
        if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
            let inner = &segment[1..segment.len() - 1];
            return match inner.split_once(':') {
                Some((name, conv)) => PathSegment::Param {
                    name,
                    converter: Some(conv),
                },
                None => PathSegment::Param {
                    name: inner,
                    converter: None,
                },
            };
        }
        match segment.strip_prefix(':').filter(|n| !n.is_empty()) {
            Some(name) => PathSegment::Param {
                name,
                converter: None,
            },
            None => PathSegment::Literal(segment),
        }
    }

    #[must_use]
    pub fn param_name(&self) -> Option<&'a str> {
        match self {
            PathSegment::Param { name, .. } => Some(*name),
            PathSegment::Literal(_) => None,
        }
    }
}

/// Split a path template into classified segments, skipping empty ones.
pub fn path_segments(path: &str) -> impl Iterator<Item = PathSegment<'_>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(PathSegment::parse)
}

/// Lower-case a header name, optionally turning `_` into `-`.
#[must_use]
pub fn normalize_header_name(name: &str, convert_underscores: bool) -> String {
    let name = if convert_underscores {
        name.replace('_', "-")
    } else {
        name.to_string()
    };
    name.to_ascii_lowercase()
}

/// Placeholder names in a path template, in order of first appearance.
///
/// Uses the same segment rules as route matching, so a literal segment such
/// as `items:batch` contributes nothing.
#[must_use]
pub fn path_param_names(path: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in path_segments(path).filter_map(|seg| seg.param_name()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn property_schema(spec: &ParamSpec) -> Value {
    let mut prop = match spec.validation() {
        Some(Value::Object(fragment)) => fragment.clone(),
        _ => Map::new(),
    };
    let ty = spec
        .schema_type()
        .map(str::to_string)
        .or_else(|| prop.get("type").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "string".to_string());
    prop.insert("type".to_string(), Value::String(ty));
    prop.insert(
        "source".to_string(),
        Value::String(spec.source().as_str().to_string()),
    );
    if let Some(default) = spec.static_default() {
        prop.insert("default".to_string(), default.clone());
    }
    Value::Object(prop)
}

/// Derive the composite object schema for a route's non-body inputs.
///
/// Every declared input maps to `{source, type, ...}`; inputs without a
/// default are required, and path inputs are required unconditionally.
/// Placeholders in `path` that the table does not declare are added as
/// required string path parameters. Returns `None` when there is nothing
/// to describe.
#[must_use]
pub fn infer_parameter_schema(path: &str, params: &[ParamSpec]) -> Option<Value> {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for spec in params
        .iter()
        .filter(|p| p.source() != ParameterSource::Body)
    {
        let key = spec.key();
        let is_required = spec.source() == ParameterSource::Path || !spec.has_default();
        properties.insert(key.clone(), property_schema(spec));
        if is_required && !required.contains(&key) {
            required.push(key);
        }
    }

    for name in path_param_names(path) {
        if !properties.contains_key(&name) {
            properties.insert(name.clone(), json!({ "type": "string", "source": "path" }));
            required.push(name);
        }
    }

    if properties.is_empty() {
        return None;
    }

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    Some(schema)
}

/// Request body schema declared through a body-sourced [`ParamSpec`].
#[must_use]
pub fn infer_request_schema(params: &[ParamSpec]) -> Option<Value> {
    params
        .iter()
        .find(|p| p.source() == ParameterSource::Body)
        .and_then(|p| p.validation().cloned())
}

/// Merge an inferred parameter schema with an explicit one; explicit wins.
///
/// Properties are merged key by key with the explicit entry replacing the
/// inferred one. Any other top-level key (`required` included) is taken from
/// the explicit schema when it has one.
#[must_use]
pub fn merge_parameter_schema(inferred: Option<Value>, explicit: Option<Value>) -> Option<Value> {
    match (inferred, explicit) {
        (None, explicit) => explicit,
        (inferred, None) => inferred,
        (Some(Value::Object(mut merged)), Some(Value::Object(explicit))) => {
            for (key, value) in explicit {
                if key == "properties" {
                    if let (Some(Value::Object(props)), Value::Object(explicit_props)) =
                        (merged.get_mut("properties"), &value)
                    {
                        for (name, prop) in explicit_props {
                            props.insert(name.clone(), prop.clone());
                        }
                        continue;
                    }
                }
                merged.insert(key, value);
            }
            Some(Value::Object(merged))
        }
        (_, explicit) => explicit,
    }
}
