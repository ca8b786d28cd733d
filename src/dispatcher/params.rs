//! Parameter extraction, coercion and validation for a matched route.

use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::router::RouteDescriptor;
use crate::schema::{ParamSpec, ParameterSource};
use crate::validator::{ValidationIssue, ValidationOutcome, Validator};

use super::core::DispatchRequest;

/// Convert a raw string input to the JSON type its schema declares.
///
/// Values that do not parse stay strings so the validator reports the type
/// mismatch against the declared schema.
#[must_use]
pub fn coerce_param_value(raw: &str, schema: Option<&Value>) -> Value {
    fn convert_primitive(val: &str, schema: Option<&Value>) -> Value {
        match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
            Some("integer") => val
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("number") => val
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("boolean") => val
                .parse::<bool>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            _ => Value::String(val.to_string()),
        }
    }

    match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
        Some("array") => {
            let items = schema.and_then(|s| s.get("items"));
            Value::Array(
                raw.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|p| convert_primitive(p.trim(), items))
                    .collect(),
            )
        }
        Some("object") => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => convert_primitive(raw, schema),
    }
}

fn raw_input<'a>(req: &'a DispatchRequest, source: ParameterSource, key: &str) -> Option<&'a str> {
    match source {
        ParameterSource::Path => req.get_path_param(key),
        ParameterSource::Query => req.get_query_param(key),
        ParameterSource::Header => req.get_header(key),
        ParameterSource::Cookie => req.get_cookie(key),
        ParameterSource::Body => None,
    }
}

/// The property schema without the routing-only `source` annotation
fn value_schema(prop: &Value) -> Value {
    match prop {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("source");
            Value::Object(map)
        }
        other => other.clone(),
    }
}

fn spec_for<'a>(route: &'a RouteDescriptor, key: &str) -> Option<&'a ParamSpec> {
    route.params.iter().find(|p| p.key() == key)
}

/// Extract every declared input of `route` from `req`.
///
/// Missing inputs fall back to their declared default (a default factory
/// runs on each call); missing required inputs are reported without
/// consulting the validator. All issues are collected before failing.
pub(crate) fn extract_params(
    req: &DispatchRequest,
    route: &RouteDescriptor,
    validator: &dyn Validator,
) -> Result<Map<String, Value>, DispatchError> {
    let mut params = Map::new();
    let mut issues: Vec<ValidationIssue> = Vec::new();

    if let Some(schema) = &route.parameter_schema {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let empty = Map::new();
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        for (key, prop) in properties {
            let source = prop
                .get("source")
                .and_then(Value::as_str)
                .and_then(ParameterSource::parse)
                .unwrap_or(ParameterSource::Query);

            let value = match raw_input(req, source, key) {
                Some(raw) => Some(coerce_param_value(raw, Some(prop))),
                None => spec_for(route, key)
                    .and_then(ParamSpec::get_default)
                    .or_else(|| prop.get("default").cloned()),
            };

            let Some(value) = value else {
                if required.contains(&key.as_str()) {
                    issues.push(
                        ValidationIssue::new(key.as_str(), format!("missing required {source} parameter"))
                            .with_source(source.as_str()),
                    );
                }
                continue;
            };

            if let ValidationOutcome::Invalid(found) = validator.validate(&value, &value_schema(prop)) {
                issues.extend(found.into_iter().map(|i| ValidationIssue {
                    field: key.clone(),
                    source: Some(source.as_str().to_string()),
                    message: i.message,
                }));
                continue;
            }
            params.insert(key.clone(), value);
        }
    }

    if let Some(schema) = &route.request_schema {
        let body = req.body.clone().unwrap_or(Value::Null);
        match validator.validate(&body, schema) {
            ValidationOutcome::Valid => {
                let name = route
                    .params
                    .iter()
                    .find(|p| p.source() == ParameterSource::Body)
                    .map_or("body", ParamSpec::name);
                params.insert(name.to_string(), body);
            }
            ValidationOutcome::Invalid(found) => {
                issues.extend(found.into_iter().map(|i| ValidationIssue {
                    field: "body".to_string(),
                    source: Some("body".to_string()),
                    message: i.message,
                }));
            }
        }
    }

    if issues.is_empty() {
        Ok(params)
    } else {
        Err(DispatchError::Validation { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_declared_types() {
        assert_eq!(coerce_param_value("42", Some(&json!({"type": "integer"}))), json!(42));
        assert_eq!(coerce_param_value("1.5", Some(&json!({"type": "number"}))), json!(1.5));
        assert_eq!(coerce_param_value("true", Some(&json!({"type": "boolean"}))), json!(true));
        assert_eq!(
            coerce_param_value("1,2", Some(&json!({"type": "array", "items": {"type": "integer"}}))),
            json!([1, 2])
        );
        assert_eq!(coerce_param_value("abc", Some(&json!({"type": "integer"}))), json!("abc"));
        assert_eq!(coerce_param_value("abc", None), json!("abc"));
    }
}
