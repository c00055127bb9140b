use std::{fmt, sync::Arc};

use crate::{
    container::Container,
    errors::{InjectError, RegisterError, RequireError},
    namespace::NamespaceLink,
    types::{Injectable, Instance, Key, Symbol},
};

/// Type erased factory, receives the resolved dependencies in declaration order
pub type Callable = Arc<dyn Fn(&Args) -> Result<Instance, InjectError> + Send + Sync>;

/// Zero argument dependency, called directly instead of resolving a key
pub type ResolveFn = Arc<dyn Fn() -> Result<Option<Instance>, RequireError> + Send + Sync>;

pub type BeforeResolving = Arc<dyn Fn(&Container, &Key) + Send + Sync>;
pub type AfterResolving = Arc<dyn Fn(&Container, &Key, &Instance) + Send + Sync>;
/// Receives the record which is about to replace the current one
pub type BeforeReplaced =
    Arc<dyn Fn(&Container, &Key, &FactoryRecord) -> Result<(), RegisterError> + Send + Sync>;

/// Wraps a typed factory closure into a [Callable]
pub(crate) fn callable<T, F>(factory: F) -> Callable
where
    T: Injectable,
    F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
{
    Arc::new(move |args: &Args| factory(args).map(Instance::new))
}

/// Caching behaviour of a factory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryKind {
    Singleton,
    Transient,
    Instance,
    Alias,
    NamespacePassThrough,
}

impl FactoryKind {
    pub fn name(&self) -> &'static str {
        match self {
            FactoryKind::Singleton => "singleton",
            FactoryKind::Transient => "transient",
            FactoryKind::Instance => "instance",
            FactoryKind::Alias => "alias",
            FactoryKind::NamespacePassThrough => "namespace-pass-through",
        }
    }
}

impl fmt::Display for FactoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a record runs to produce its value
#[derive(Clone)]
pub enum Producer {
    /// Invoke a callable with the resolved dependencies
    Call(Callable),
    /// Hand out a fixed value
    Value(Instance),
    /// Re-resolve another key of the resolving container
    Alias(Key),
    /// Forward to another container
    PassThrough(NamespaceLink),
}

/// A single dependency of a factory
#[derive(Clone)]
pub enum Dependency {
    /// Resolved through `get`, missing keys fail the resolution
    Key(Key),
    /// Resolved through `get`, missing keys inject nothing
    Optional(Key),
    /// Called directly, bypassing the registry
    Resolver(ResolveFn),
    /// Injects nothing without looking anything up
    Skip,
    /// Resolved on the spot without being registered
    Inline(Arc<FactoryRecord>),
}

impl Dependency {
    pub fn optional(key: impl Into<Key>) -> Self {
        Dependency::Optional(key.into())
    }

    pub fn resolver(
        resolve: impl Fn() -> Result<Option<Instance>, RequireError> + Send + Sync + 'static,
    ) -> Self {
        Dependency::Resolver(Arc::new(resolve))
    }

    pub fn inline(record: FactoryRecord) -> Self {
        Dependency::Inline(Arc::new(record))
    }

    /// The key this dependency looks up, if any
    pub fn key(&self) -> Option<&Key> {
        match self {
            Dependency::Key(key) | Dependency::Optional(key) => Some(key),
            _ => None,
        }
    }
}

macro_rules! dependency_from_key {
    ($($key:ty),*) => {
        $(
            impl From<$key> for Dependency {
                fn from(key: $key) -> Self {
                    Dependency::Key(key.into())
                }
            }
        )*
    };
}
dependency_from_key!(Key, &Key, &str, String, i32, i64, Symbol);

impl From<FactoryRecord> for Dependency {
    fn from(record: FactoryRecord) -> Self {
        Dependency::inline(record)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Key(key) => write!(f, "{key:?}"),
            Dependency::Optional(key) => write!(f, "{key:?}?"),
            Dependency::Resolver(_) => f.write_str("<resolver>"),
            Dependency::Skip => f.write_str("<skip>"),
            Dependency::Inline(record) => write!(f, "<inline {}>", record.kind),
        }
    }
}

/// Everything a container knows about a registered key
#[derive(Clone)]
pub struct FactoryRecord {
    pub kind: FactoryKind,
    pub producer: Producer,
    /// Fixed for the lifetime of the record
    pub dependencies: Arc<[Dependency]>,
    pub before_resolving: Option<BeforeResolving>,
    pub after_resolving: Option<AfterResolving>,
    pub before_replaced: Option<BeforeReplaced>,
}

impl FactoryRecord {
    pub fn new(kind: FactoryKind, producer: Producer) -> Self {
        FactoryRecord {
            kind,
            producer,
            dependencies: Arc::from(Vec::new()),
            before_resolving: None,
            after_resolving: None,
            before_replaced: None,
        }
    }

    pub fn singleton<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
    {
        Self::new(FactoryKind::Singleton, Producer::Call(callable(factory)))
    }

    pub fn transient<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
    {
        Self::new(FactoryKind::Transient, Producer::Call(callable(factory)))
    }

    pub fn instance<T: Injectable>(value: T) -> Self {
        Self::new(FactoryKind::Instance, Producer::Value(Instance::new(value)))
    }

    pub fn alias(target: impl Into<Key>) -> Self {
        Self::new(FactoryKind::Alias, Producer::Alias(target.into()))
    }

    pub(crate) fn pass_through(link: NamespaceLink) -> Self {
        Self::new(FactoryKind::NamespacePassThrough, Producer::PassThrough(link))
    }

    pub fn with_dependencies<D: Into<Dependency>>(
        mut self,
        dependencies: impl IntoIterator<Item = D>,
    ) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Singletons and instances keep their first produced value
    pub fn is_cacheable(&self) -> bool {
        matches!(self.kind, FactoryKind::Singleton | FactoryKind::Instance)
    }

    pub fn link(&self) -> Option<&NamespaceLink> {
        match &self.producer {
            Producer::PassThrough(link) => Some(link),
            _ => None,
        }
    }

    /// Checks the producer fits the kind
    pub(crate) fn validate(&self, key: &Key) -> Result<(), RegisterError> {
        let invalid = |reason| {
            Err(RegisterError::InvalidFactory {
                key: key.clone(),
                reason,
            })
        };

        match (&self.kind, &self.producer) {
            (FactoryKind::Singleton | FactoryKind::Transient, Producer::Call(_)) => Ok(()),
            (FactoryKind::Singleton | FactoryKind::Transient, _) => {
                invalid("singleton and transient records need a callable")
            }
            (FactoryKind::Instance, Producer::Value(_))
            | (FactoryKind::Alias, Producer::Alias(_))
            | (FactoryKind::NamespacePassThrough, Producer::PassThrough(_)) => {
                match self.dependencies.is_empty() {
                    true => Ok(()),
                    false => invalid("instances, aliases and pass-throughs take no dependencies"),
                }
            }
            _ => invalid("producer does not match the factory kind"),
        }
    }
}

impl fmt::Debug for FactoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FactoryRecord");
        debug.field("kind", &self.kind);
        match &self.producer {
            Producer::Alias(target) => debug.field("alias", target),
            Producer::PassThrough(link) => debug.field("link", link),
            _ => debug.field("dependencies", &self.dependencies),
        };
        debug.finish()
    }
}

/// Resolved dependency values handed to a factory
#[derive(Clone, Default, Debug)]
pub struct Args {
    values: Vec<Option<Instance>>,
}

impl Args {
    pub fn new(values: Vec<Option<Instance>>) -> Self {
        Args { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value at `index`, `None` for skipped or unresolved dependencies
    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Typed value at `index`, failing if nothing was injected there
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, InjectError> {
        self.optional::<T>(index)?
            .ok_or(InjectError::MissingArgument(index))
    }

    /// Typed value at `index`, `None` if nothing was injected there
    pub fn optional<T: Injectable>(&self, index: usize) -> Result<Option<Arc<T>>, InjectError> {
        self.instance(index)
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .map_err(|actual_type| RequireError::DowncastFailed {
                        required_type: std::any::type_name::<T>(),
                        actual_type,
                    })
            })
            .transpose()
            .map_err(InjectError::from)
    }

    pub fn into_values(self) -> Vec<Option<Instance>> {
        self.values
    }
}

impl From<Vec<Instance>> for Args {
    fn from(values: Vec<Instance>) -> Self {
        Args::new(values.into_iter().map(Some).collect())
    }
}

/// A value which can be invoked with `Container::call`
#[derive(Clone)]
pub struct Function(Callable);

impl Function {
    pub fn new<T, F>(function: F) -> Self
    where
        T: Injectable,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
    {
        Function(callable(function))
    }

    pub fn invoke(&self, args: &Args) -> Result<Instance, InjectError> {
        (self.0)(args)
    }
}
