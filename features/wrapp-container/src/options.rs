use std::sync::Arc;

use crate::{
    container::Container,
    errors::RegisterError,
    factories::{AfterResolving, BeforeReplaced, BeforeResolving, Dependency, FactoryRecord},
    types::{Instance, Key},
};

/// How a container invokes its factories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Invocation {
    /// Call factories with the dependency values as they are
    #[default]
    Immediate,
    /// Await every deferred dependency first, the product becomes a `Deferred`
    Deferred,
}

#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
    pub invocation: Invocation,
}

impl ContainerOptions {
    pub fn deferred() -> Self {
        ContainerOptions {
            invocation: Invocation::Deferred,
        }
    }
}

/// Options for registering a factory
///
/// A plain list of dependencies converts into options, so both of these work:
/// ```rust
/// # use wrapp_container::{AddOptions, Container};
/// let container = Container::new();
/// container.add_transient("two", |_| Ok(2), ()).unwrap();
/// container.add_transient("four", |args| Ok(*args.get::<i32>(0)? * 2), ["two"]).unwrap();
/// container
///     .add_transient(
///         "four",
///         |args| Ok(*args.get::<i32>(0)? + 2),
///         AddOptions::new().dependencies(["two"]).replace(true),
///     )
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct AddOptions {
    pub replace: bool,
    pub dependencies: Vec<Dependency>,
    pub before_resolving: Option<BeforeResolving>,
    pub after_resolving: Option<AfterResolving>,
    pub before_replaced: Option<BeforeReplaced>,
}

impl AddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn dependencies<D: Into<Dependency>>(
        mut self,
        dependencies: impl IntoIterator<Item = D>,
    ) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependency(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn before_resolving(
        mut self,
        hook: impl Fn(&Container, &Key) + Send + Sync + 'static,
    ) -> Self {
        self.before_resolving = Some(Arc::new(hook));
        self
    }

    pub fn after_resolving(
        mut self,
        hook: impl Fn(&Container, &Key, &Instance) + Send + Sync + 'static,
    ) -> Self {
        self.after_resolving = Some(Arc::new(hook));
        self
    }

    pub fn before_replaced(
        mut self,
        hook: impl Fn(&Container, &Key, &FactoryRecord) -> Result<(), RegisterError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.before_replaced = Some(Arc::new(hook));
        self
    }

    /// Moves dependencies and hooks onto the record, returns the replace flag
    pub(crate) fn apply(self, mut record: FactoryRecord) -> (FactoryRecord, bool) {
        record.dependencies = self.dependencies.into();
        record.before_resolving = self.before_resolving;
        record.after_resolving = self.after_resolving;
        record.before_replaced = self.before_replaced;
        (record, self.replace)
    }
}

impl From<()> for AddOptions {
    fn from(_: ()) -> Self {
        AddOptions::default()
    }
}
impl From<Vec<Dependency>> for AddOptions {
    fn from(dependencies: Vec<Dependency>) -> Self {
        AddOptions::new().dependencies(dependencies)
    }
}
impl<D: Into<Dependency>, const N: usize> From<[D; N]> for AddOptions {
    fn from(dependencies: [D; N]) -> Self {
        AddOptions::new().dependencies(dependencies)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Return `None` instead of failing on unknown keys
    pub allow_unresolved: bool,
}

impl GetOptions {
    pub fn optional() -> Self {
        GetOptions {
            allow_unresolved: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForkOptions {
    /// Start the child without the parent's middlewares
    pub skip_middlewares: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResetOptions {
    pub reset_parent: bool,
    /// Only drop these cached instances, `None` drops all of them
    pub keys: Option<Vec<Key>>,
}

impl ResetOptions {
    pub fn keys<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        ResetOptions {
            reset_parent: false,
            keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_parent(mut self) -> Self {
        self.reset_parent = true;
        self
    }
}

/// Produces the record to keep when flattening finds a key twice
///
/// Receives the key, the ancestor's record and the more specific record.
pub type IntersectionResolver = Arc<
    dyn Fn(&Key, &FactoryRecord, &FactoryRecord) -> Result<FactoryRecord, RegisterError>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub enum KeyIntersection {
    /// Keep the record of the most specific container
    #[default]
    PreferMostSpecific,
    /// Fail with `RegisterError::KeyIntersection`
    Fail,
    Resolve(IntersectionResolver),
}

impl KeyIntersection {
    pub fn resolve(
        resolver: impl Fn(&Key, &FactoryRecord, &FactoryRecord) -> Result<FactoryRecord, RegisterError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        KeyIntersection::Resolve(Arc::new(resolver))
    }
}

#[derive(Clone, Default)]
pub struct FlattenOptions {
    /// Flatten into a new parentless container instead of this one
    pub fork: bool,
    pub on_key_intersection: KeyIntersection,
}
