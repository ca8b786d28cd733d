//! # Validator Module
//!
//! Schema validation is an external collaborator of the dispatch core. The
//! core only defines the contract: a [`Validator`] takes `(value, schema)` and
//! returns a [`ValidationOutcome`], either `Valid` or a list of field-level
//! [`ValidationIssue`]s. A failed outcome becomes a `validation_failed`
//! envelope whose `details.errors` lists the issues.
//!
//! [`JsonSchemaValidator`] is the default implementation, backed by the
//! `jsonschema` crate. Compiled schemas are cached keyed by their canonical
//! JSON text so each distinct schema is compiled once.
//!
//! ## Cache behaviour
//!
//! - Cache hit: read lock + HashMap lookup
//! - Cache miss: compile outside the lock, then write lock with a
//!   double-check in case another thread compiled the same schema first

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Offending field (`body` for request-body failures)
    pub field: String,
    /// Parameter source (`path`, `query`, `header`, `cookie`, `body`)
    pub source: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            field: field.into(),
            source: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "field": self.field,
            "source": self.source,
            "message": self.message,
        })
    }
}

/// Result of validating one value against one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<ValidationIssue>),
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        match self {
            ValidationOutcome::Valid => Vec::new(),
            ValidationOutcome::Invalid(issues) => issues,
        }
    }
}

/// Validation seam consumed by the dispatcher.
///
/// Issues returned here carry `field = ""`; the caller fills in the field and
/// source it was validating.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value, schema: &Value) -> ValidationOutcome;
}

/// Default [`Validator`] backed by the `jsonschema` crate.
#[derive(Default)]
pub struct JsonSchemaValidator {
    cache: RwLock<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl JsonSchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled schemas held in the cache
    #[must_use]
    pub fn cached_schemas(&self) -> usize {
        self.cache.read().len()
    }

    fn compiled(&self, schema: &Value) -> Result<Arc<jsonschema::Validator>, String> {
        let key = schema.to_string();

        if let Some(validator) = self.cache.read().get(&key) {
            return Ok(Arc::clone(validator));
        }

        let compiled = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
        let compiled = Arc::new(compiled);

        let mut cache = self.cache.write();
        if let Some(existing) = cache.get(&key) {
            debug!("Schema validator compiled by another thread");
            return Ok(Arc::clone(existing));
        }
        cache.insert(key, Arc::clone(&compiled));
        debug!(cache_size = cache.len(), "Schema validator compiled and cached");
        Ok(compiled)
    }
}

impl Validator for JsonSchemaValidator {
    fn validate(&self, value: &Value, schema: &Value) -> ValidationOutcome {
        let compiled = match self.compiled(schema) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Schema failed to compile");
                return ValidationOutcome::Invalid(vec![ValidationIssue::new(
                    "",
                    format!("invalid schema: {e}"),
                )]);
            }
        };

        let issues: Vec<ValidationIssue> = compiled
            .iter_errors(value)
            .map(|e| ValidationIssue::new("", e.to_string()))
            .collect();

        if issues.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(issues)
        }
    }
}
