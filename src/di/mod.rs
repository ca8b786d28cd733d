//! # Dependency Injection Module
//!
//! A named registry of values and factories that the dispatcher uses to build
//! a per-request [`ResolvedDependencies`] bag for each handler.
//!
//! ## Resolution rules
//!
//! - a static value is returned as-is
//! - a factory first resolves its `depends_on` names (recursively, in
//!   declared order) and is then invoked with those values
//! - a singleton factory's result is cached for the container's lifetime;
//!   a non-singleton factory runs on every resolution
//! - revisiting a name that is already being resolved fails with
//!   `cyclic_dependency`; unknown names fail with `unknown_dependency`
//!
//! ## Usage
//!
//! ```
//! use switchyard::di::DependencyContainer;
//!
//! let container = DependencyContainer::builder()
//!     .provide_value("db_url", "postgres://localhost".to_string())
//!     .provide_factory("pool", ["db_url"], true, |args| {
//!         let url = args[0].downcast_ref::<String>().cloned().unwrap_or_default();
//!         Ok(format!("pool({url})"))
//!     })
//!     .build();
//!
//! let pool = container.get_typed::<String>("pool").unwrap();
//! assert_eq!(pool.as_str(), "pool(postgres://localhost)");
//! ```

mod container;
mod resolved;

pub use container::{
    downcast, DependencyBuilder, DependencyContainer, DependencyDescriptor, DependencyValue,
    FactoryDescriptor, FactoryFn,
};
pub use resolved::ResolvedDependencies;
