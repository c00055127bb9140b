//! In-process service container
//!
//! Services are registered under keys together with the keys they depend on and are
//! resolved on demand, wired with their dependencies.
//!
//! ```rust
//! # use wrapp_container::{AddOptions, Container};
//! let container = Container::new();
//! container
//!     .add_transient("multiplier", |_| Ok(2), ())?
//!     .add_transient("multiplied", |args| Ok(2 * *args.get::<i32>(0)?), ["multiplier"])?;
//! assert_eq!(*container.get::<i32>("multiplied")?, 4);
//!
//! // Transients re-read the current factories on every call
//! container.add_transient("multiplier", |_| Ok(5), AddOptions::new().replace(true))?;
//! assert_eq!(*container.get::<i32>("multiplied")?, 10);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! - Containers can be forked, a fork reads everything its parent provides and may shadow it
//! - Namespaces expose the keys of another container as `"<namespace>.<key>"`
//! - Middlewares wrap every resolution
//! - Containers using [Invocation::Deferred] await deferred dependencies before calling factories

mod container;
mod dependency_graph;
mod errors;
mod events;
mod factories;
mod namespace;
mod options;
mod resolver;
mod types;
pub mod utils;

pub use container::Container;
pub use dependency_graph::{ServiceNode, ServicesGraph};
pub use errors::{
    CircularDependencyError, InjectError, RegisterError, RequireError, UnsupportedEventError,
};
pub use events::{Event, EventKind, Listener};
pub use factories::{
    AfterResolving, Args, BeforeReplaced, BeforeResolving, Callable, Dependency, FactoryKind,
    FactoryRecord, Function, Producer, ResolveFn,
};
pub use namespace::{LinkDirection, NamespaceLink};
pub use options::{
    AddOptions, ContainerOptions, FlattenOptions, ForkOptions, GetOptions, IntersectionResolver,
    Invocation, KeyIntersection, ResetOptions,
};
pub use resolver::{
    deferred::{defer, settle, Deferred},
    Middleware, Resolution,
};
pub use types::{DynError, Injectable, Instance, Key, Symbol, TypeInfo};
