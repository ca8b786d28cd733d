use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::DispatchError;

use super::resolved::ResolvedDependencies;

/// A resolved dependency value shared between requests.
pub type DependencyValue = Arc<dyn Any + Send + Sync>;

/// Factory invoked with its dependencies resolved in declared order.
pub type FactoryFn =
    Arc<dyn Fn(&[DependencyValue]) -> anyhow::Result<DependencyValue> + Send + Sync>;

/// Downcast a dependency value, reporting the name on mismatch.
pub fn downcast<T: Any + Send + Sync>(
    name: &str,
    value: DependencyValue,
) -> Result<Arc<T>, DispatchError> {
    value
        .downcast::<T>()
        .map_err(|_| DispatchError::DependencyTypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Lazily produced dependency.
#[derive(Clone)]
pub struct FactoryDescriptor {
    factory: FactoryFn,
    depends_on: Vec<String>,
    singleton: bool,
}

impl FactoryDescriptor {
    pub fn new<I, S, F, T>(depends_on: I, singleton: bool, factory: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[DependencyValue]) -> anyhow::Result<T> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Self {
            factory: Arc::new(move |args| {
                factory(args).map(|v| Arc::new(v) as DependencyValue)
            }),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            singleton,
        }
    }

    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }
}

/// Either a ready value or a factory producing one.
#[derive(Clone)]
pub enum DependencyDescriptor {
    Value(DependencyValue),
    Factory(FactoryDescriptor),
}

struct Entry {
    descriptor: DependencyDescriptor,
    /// Singleton slot; written once, read lock-free afterwards
    cache: OnceCell<DependencyValue>,
}

impl Entry {
    fn new(descriptor: DependencyDescriptor) -> Self {
        Self {
            descriptor,
            cache: OnceCell::new(),
        }
    }
}

/// Named registry of dependency values and factories.
///
/// Built once at configuration time and shared read-only across requests.
/// Singleton factories are resolved at most once for the lifetime of the
/// container, even when several requests race on the first resolution; only
/// the per-entry cache slot is synchronized.
pub struct DependencyContainer {
    entries: HashMap<String, Entry>,
}

impl DependencyContainer {
    #[must_use]
    pub fn builder() -> DependencyBuilder {
        DependencyBuilder::default()
    }

    /// Merge static values and factory descriptors into one container.
    ///
    /// Factories are applied after values, so a name present in both maps
    /// resolves through its factory.
    #[must_use]
    pub fn new(
        values: HashMap<String, DependencyValue>,
        factories: HashMap<String, FactoryDescriptor>,
    ) -> Self {
        let mut entries: HashMap<String, Entry> = values
            .into_iter()
            .map(|(name, v)| (name, Entry::new(DependencyDescriptor::Value(v))))
            .collect();
        for (name, factory) in factories {
            if entries.contains_key(&name) {
                warn!(dependency = %name, "Factory overrides static dependency value");
            }
            entries.insert(name, Entry::new(DependencyDescriptor::Factory(factory)));
        }
        Self { entries }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `name`, running factories (and their dependencies) as needed.
    pub fn get(&self, name: &str) -> Result<DependencyValue, DispatchError> {
        let mut stack = Vec::new();
        self.resolve(name, &mut stack)
    }

    pub fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DispatchError> {
        downcast(name, self.get(name)?)
    }

    /// Resolve every name into a per-request snapshot.
    pub fn resolve_all<I, S>(&self, names: I) -> Result<ResolvedDependencies, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let value = self.get(name)?;
            resolved.insert(name.to_string(), value);
        }
        Ok(ResolvedDependencies::new(resolved))
    }

    fn resolve(&self, name: &str, stack: &mut Vec<String>) -> Result<DependencyValue, DispatchError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownDependency {
                name: name.to_string(),
            })?;

        let factory = match &entry.descriptor {
            DependencyDescriptor::Value(v) => return Ok(Arc::clone(v)),
            DependencyDescriptor::Factory(f) => f,
        };

        if stack.iter().any(|n| n == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(DispatchError::CyclicDependency { path });
        }

        if factory.singleton {
            if let Some(cached) = entry.cache.get() {
                return Ok(Arc::clone(cached));
            }
        }

        stack.push(name.to_string());
        let result = if factory.singleton {
            entry
                .cache
                .get_or_try_init(|| self.invoke(name, factory, stack))
                .map(Arc::clone)
        } else {
            self.invoke(name, factory, stack)
        };
        stack.pop();
        result
    }

    fn invoke(
        &self,
        name: &str,
        factory: &FactoryDescriptor,
        stack: &mut Vec<String>,
    ) -> Result<DependencyValue, DispatchError> {
        let args = factory
            .depends_on
            .iter()
            .map(|dep| self.resolve(dep, stack))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            dependency = %name,
            args = args.len(),
            singleton = factory.singleton,
            "Invoking dependency factory"
        );

        (factory.factory)(&args).map_err(|e| DispatchError::DependencyFailed {
            name: name.to_string(),
            message: format!("{e:#}"),
        })
    }
}

impl Default for DependencyContainer {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("names", &self.names())
            .finish()
    }
}

/// Accumulates values and factories; `build()` freezes them into a container.
///
/// Registering a name twice keeps the last registration.
#[derive(Default)]
pub struct DependencyBuilder {
    entries: HashMap<String, DependencyDescriptor>,
}

impl DependencyBuilder {
    pub fn provide_value<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> &mut Self {
        self.insert(name.into(), DependencyDescriptor::Value(Arc::new(value)));
        self
    }

    /// Register a factory; `depends_on` names are resolved first and passed
    /// to `factory` in the same order.
    pub fn provide_factory<I, S, F, T>(
        &mut self,
        name: impl Into<String>,
        depends_on: I,
        singleton: bool,
        factory: F,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[DependencyValue]) -> anyhow::Result<T> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        let descriptor = FactoryDescriptor::new(depends_on, singleton, factory);
        self.insert(name.into(), DependencyDescriptor::Factory(descriptor));
        self
    }

    pub fn provide(&mut self, name: impl Into<String>, descriptor: DependencyDescriptor) -> &mut Self {
        self.insert(name.into(), descriptor);
        self
    }

    fn insert(&mut self, name: String, descriptor: DependencyDescriptor) {
        if self.entries.insert(name.clone(), descriptor).is_some() {
            warn!(dependency = %name, "Replaced existing dependency registration");
        }
    }

    #[must_use]
    pub fn build(&mut self) -> DependencyContainer {
        let entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(name, d)| (name, Entry::new(d)))
            .collect();
        DependencyContainer { entries }
    }
}
