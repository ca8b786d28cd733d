use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;

use super::container::{downcast, DependencyValue};

/// Per-request snapshot of resolved dependencies.
///
/// There is no fallback at this layer: asking for a name that was not
/// resolved for the request is an error.
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    values: HashMap<String, DependencyValue>,
}

impl ResolvedDependencies {
    #[must_use]
    pub fn new(values: HashMap<String, DependencyValue>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<DependencyValue, DispatchError> {
        self.values
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| DispatchError::NotResolved {
                name: name.to_string(),
            })
    }

    pub fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DispatchError> {
        downcast(name, self.get(name)?)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ResolvedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDependencies")
            .field("names", &self.names())
            .finish()
    }
}
