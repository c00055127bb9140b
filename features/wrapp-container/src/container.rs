use std::{
    any::type_name,
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{
    dependency_graph,
    errors::{InjectError, RegisterError, RequireError, UnsupportedEventError},
    events::{Event, EventKind, Listener, Listeners},
    factories::{Args, Dependency, FactoryKind, FactoryRecord, Function, Producer},
    namespace::{self, Adoption},
    options::{
        AddOptions, ContainerOptions, FlattenOptions, ForkOptions, GetOptions, Invocation,
        KeyIntersection, ResetOptions,
    },
    resolver::{
        compose,
        deferred::{self, Deferred},
        Middleware, Pipeline, Resolution,
    },
    types::{Injectable, Instance, Key},
};

static NEXT_CONTAINER_ID: AtomicUsize = AtomicUsize::new(1);

/// Registry of factories, resolving keys into instances
///
/// `Container` is a handle, clones share the same registry and cache.
/// A container only ever reads from its parent, registrations never travel upwards.
#[derive(Clone)]
pub struct Container(pub(crate) Arc<ContainerInner>);

pub(crate) struct ContainerInner {
    id: usize,
    parent: Option<Container>,
    options: ContainerOptions,
    state: Mutex<ContainerState>,
}

/// Never locked while user code runs
struct ContainerState {
    factories: IndexMap<Key, Arc<FactoryRecord>>,
    singletons: HashMap<Key, Instance>,
    middlewares: Vec<Middleware>,
    pipeline: Pipeline,
    listeners: Listeners,
    adopters: Vec<Adoption>,
}

/// Whether replacing a pass-through re-points the other side of its namespace link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bridge {
    Follow,
    Skip,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.lock();
        let mut map = f.debug_struct("Container");
        map.field("id", &self.0.id);
        for (key, record) in &state.factories {
            let val = if state.singletons.contains_key(key) {
                "cached"
            } else {
                record.kind.name()
            };
            map.field(&key.to_string(), &val);
        }
        map.finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self::create(None, options, Vec::new())
    }

    fn create(
        parent: Option<Container>,
        options: ContainerOptions,
        middlewares: Vec<Middleware>,
    ) -> Self {
        let state = ContainerState {
            factories: IndexMap::new(),
            singletons: HashMap::new(),
            pipeline: compose(&middlewares),
            middlewares,
            listeners: Listeners::default(),
            adopters: Vec::new(),
        };

        Container(Arc::new(ContainerInner {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            parent,
            options,
            state: Mutex::new(state),
        }))
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn parent(&self) -> Option<&Container> {
        self.0.parent.as_ref()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.0.options
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// This container followed by all of its ancestors
    pub fn ancestry(&self) -> Vec<Container> {
        let mut ancestry = vec![self.clone()];
        let mut current = self.parent();
        while let Some(container) = current {
            ancestry.push(container.clone());
            current = container.parent();
        }
        ancestry
    }

    /// Own keys in registration order
    pub fn keys(&self) -> Vec<Key> {
        self.0.state.lock().factories.keys().cloned().collect()
    }

    pub(crate) fn own_factories(&self) -> IndexMap<Key, Arc<FactoryRecord>> {
        self.0.state.lock().factories.clone()
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.has_with(&key.into(), true)
    }

    pub fn has_with(&self, key: &Key, ask_parent: bool) -> bool {
        if self.has_own(key) {
            return true;
        }

        match (ask_parent, self.parent()) {
            (true, Some(parent)) => parent.has_with(key, true),
            _ => false,
        }
    }

    pub fn has_own(&self, key: &Key) -> bool {
        let state = self.0.state.lock();
        state.factories.contains_key(key) || state.singletons.contains_key(key)
    }

    /// The record resolving `key`, looked up through the ancestry
    pub fn factory(&self, key: &Key) -> Option<Arc<FactoryRecord>> {
        let own = self.own_factory(key);
        match (own, self.parent()) {
            (Some(record), _) => Some(record),
            (None, Some(parent)) => parent.factory(key),
            (None, None) => None,
        }
    }

    fn own_factory(&self, key: &Key) -> Option<Arc<FactoryRecord>> {
        self.0.state.lock().factories.get(key).cloned()
    }

    /// Registers a raw factory record
    pub fn add_factory(
        &self,
        key: impl Into<Key>,
        record: FactoryRecord,
        replace: bool,
    ) -> Result<&Self, RegisterError> {
        self.register(key.into(), record, replace, Bridge::Follow)
    }

    /// Registers a factory whose first value is cached until the next reset
    pub fn add_singleton<T, F>(
        &self,
        key: impl Into<Key>,
        factory: F,
        options: impl Into<AddOptions>,
    ) -> Result<&Self, RegisterError>
    where
        T: Injectable,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
    {
        let (record, replace) = options.into().apply(FactoryRecord::singleton(factory));
        self.add_factory(key, record, replace)
    }

    /// Registers a factory which runs on every resolution
    pub fn add_transient<T, F>(
        &self,
        key: impl Into<Key>,
        factory: F,
        options: impl Into<AddOptions>,
    ) -> Result<&Self, RegisterError>
    where
        T: Injectable,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
    {
        let (record, replace) = options.into().apply(FactoryRecord::transient(factory));
        self.add_factory(key, record, replace)
    }

    pub fn add_instance<T: Injectable>(
        &self,
        key: impl Into<Key>,
        value: T,
    ) -> Result<&Self, RegisterError> {
        self.add_instance_with(key, value, ())
    }

    pub fn add_instance_with<T: Injectable>(
        &self,
        key: impl Into<Key>,
        value: T,
        options: impl Into<AddOptions>,
    ) -> Result<&Self, RegisterError> {
        let (record, replace) = options.into().apply(FactoryRecord::instance(value));
        self.add_factory(key, record, replace)
    }

    /// Registers `key` as another name for `target`, re-resolved on every access
    pub fn add_alias(
        &self,
        key: impl Into<Key>,
        target: impl Into<Key>,
    ) -> Result<&Self, RegisterError> {
        self.add_factory(key, FactoryRecord::alias(target), false)
    }

    pub(crate) fn register(
        &self,
        key: Key,
        record: FactoryRecord,
        replace: bool,
        bridge: Bridge,
    ) -> Result<&Self, RegisterError> {
        if key.as_str() == Some("") {
            return Err(RegisterError::InvalidKey(key));
        }
        record.validate(&key)?;

        let previous = self.own_factory(&key);
        if previous.is_some() && !replace {
            return Err(RegisterError::DuplicateKey(key));
        }

        let record = match &previous {
            Some(previous) => self.wrap_previous(&key, record, previous),
            None => record,
        };
        dependency_graph::check_registration(self, &key, &record, replace)?;

        if let Some(previous) = &previous {
            if let Some(before_replaced) = &previous.before_replaced {
                before_replaced(self, &key, &record)?;
            }

            // The other side of a namespace link has to accept before anything is committed here
            if let (Some(link), Bridge::Follow) = (previous.link(), bridge) {
                namespace::bridge_replacement(self, &key, link)?;
            }

            self.emit(Event::Replace {
                key: key.clone(),
                container: self.clone(),
                replaced: previous.clone(),
            });
        }

        let record = Arc::new(record);
        let cached = {
            let mut state = self.0.state.lock();
            let cached = state.singletons.remove(&key);
            if let Producer::Value(value) = &record.producer {
                state.singletons.insert(key.clone(), value.clone());
            }
            state.factories.insert(key.clone(), record.clone());
            cached
        };
        tracing::debug!(
            "Registered {} '{}' in container {}{}",
            record.kind,
            key,
            self.id(),
            if previous.is_some() { " (replaced)" } else { "" }
        );

        self.emit(Event::Add {
            key: key.clone(),
            replace,
            container: self.clone(),
        });
        if let Err(error) = self.notify_adopters(&key) {
            self.restore(&key, previous, cached);
            return Err(error);
        }

        Ok(self)
    }

    /// Puts back the record and cached value `key` had before a failed registration
    fn restore(&self, key: &Key, previous: Option<Arc<FactoryRecord>>, cached: Option<Instance>) {
        tracing::debug!("Restoring '{}' in container {}", key, self.id());
        let mut state = self.0.state.lock();
        match previous {
            Some(previous) => {
                state.factories.insert(key.clone(), previous);
            }
            None => {
                state.factories.shift_remove(key);
            }
        }
        match cached {
            Some(cached) => {
                state.singletons.insert(key.clone(), cached);
            }
            None => {
                state.singletons.remove(key);
            }
        }
    }

    /// Points dependencies on `key` itself at the record being replaced
    fn wrap_previous(
        &self,
        key: &Key,
        mut record: FactoryRecord,
        previous: &Arc<FactoryRecord>,
    ) -> FactoryRecord {
        if !record
            .dependencies
            .iter()
            .any(|dependency| dependency.key() == Some(key))
        {
            return record;
        }

        let detached = self.detach(key, previous);
        record.dependencies = record
            .dependencies
            .iter()
            .map(|dependency| match dependency.key() {
                Some(dependency_key) if dependency_key == key => detached.clone(),
                _ => dependency.clone(),
            })
            .collect();
        record
    }

    /// Dependency producing what `previous` produces, independent of the registry
    ///
    /// Pass-throughs are followed to the record they forward to, since the other side of
    /// the link may be re-pointed at the replacement.
    fn detach(&self, key: &Key, previous: &Arc<FactoryRecord>) -> Dependency {
        let mut owner = self.clone();
        let mut owner_key = key.clone();
        let mut record = previous.clone();
        let mut visited = HashSet::new();

        while let Some(link) = record.link().cloned() {
            if !visited.insert((link.target.id(), link.target_key.clone())) {
                break;
            }
            let Some(linked) = link.target.factory(&link.target_key) else {
                break;
            };
            owner = link.target;
            owner_key = link.target_key;
            record = linked;
        }

        if owner.ptr_eq(self) {
            return Dependency::Inline(record);
        }
        Dependency::resolver(move || owner.invoke(Some(&owner_key), &record).map(Some))
    }

    /// Resolves `key`, failing if no container in the chain knows it
    pub fn get<T: Injectable>(&self, key: impl Into<Key>) -> Result<Arc<T>, RequireError> {
        let instance = self.get_instance(key)?;
        downcast(&instance)
    }

    /// Resolves `key`, `None` if no container in the chain knows it
    pub fn try_get<T: Injectable>(
        &self,
        key: impl Into<Key>,
    ) -> Result<Option<Arc<T>>, RequireError> {
        self.get_with(key, GetOptions::optional())?
            .map(|instance| downcast(&instance))
            .transpose()
    }

    pub fn get_instance(&self, key: impl Into<Key>) -> Result<Instance, RequireError> {
        let key = key.into();
        self.get_with(&key, GetOptions::default())?
            .ok_or(RequireError::ServiceNotFound(key))
    }

    /// Resolves `key` and waits for it, if it is [Deferred]
    pub async fn get_deferred<T: Injectable>(
        &self,
        key: impl Into<Key>,
    ) -> Result<Arc<T>, RequireError> {
        let instance = self.get_instance(key)?;
        match instance.downcast::<Deferred>() {
            Ok(deferred) => deferred.value::<T>().await,
            Err(_) => downcast(&instance),
        }
    }

    /// Runs the middleware pipeline for `key`
    pub fn get_with(&self, key: impl Into<Key>, options: GetOptions) -> Resolution {
        let key = key.into();
        let pipeline = self.0.state.lock().pipeline.clone();

        match pipeline(self, &key)? {
            Some(value) => {
                self.emit(Event::Get {
                    key,
                    value: value.clone(),
                    container: self.clone(),
                });
                Ok(Some(value))
            }
            None if options.allow_unresolved => {
                tracing::trace!("'{}' is unresolved in container {}", key, self.id());
                Ok(None)
            }
            None => Err(RequireError::ServiceNotFound(key)),
        }
    }

    /// Cache, own factory, then parent
    pub(crate) fn resolve(&self, key: &Key) -> Resolution {
        let (cached, record) = {
            let state = self.0.state.lock();
            (
                state.singletons.get(key).cloned(),
                state.factories.get(key).cloned(),
            )
        };

        if let Some(cached) = cached {
            tracing::trace!("Cache hit for '{}' in container {}", key, self.id());
            return Ok(Some(cached));
        }
        if let Some(record) = record {
            return self.produce(key, &record).map(Some);
        }

        match self.parent() {
            Some(parent) => {
                tracing::trace!("Asking parent {} for '{}'", parent.id(), key);
                parent.get_with(key, GetOptions::optional())
            }
            None => Ok(None),
        }
    }

    fn produce(&self, key: &Key, record: &FactoryRecord) -> Result<Instance, RequireError> {
        if let Some(before_resolving) = &record.before_resolving {
            before_resolving(self, key);
        }

        tracing::trace!("Producing '{}' in container {}", key, self.id());
        let value = self.invoke(Some(key), record)?;

        if let Some(after_resolving) = &record.after_resolving {
            after_resolving(self, key, &value);
        }
        if record.is_cacheable() {
            self.0
                .state
                .lock()
                .singletons
                .insert(key.clone(), value.clone());
        }
        if record.kind != FactoryKind::Instance {
            self.emit(Event::Produce {
                key: key.clone(),
                value: value.clone(),
                container: self.clone(),
            });
        }

        Ok(value)
    }

    /// Runs the producer of `record` without touching cache or hooks
    pub(crate) fn invoke(
        &self,
        key: Option<&Key>,
        record: &FactoryRecord,
    ) -> Result<Instance, RequireError> {
        match &record.producer {
            Producer::Value(value) => Ok(value.clone()),
            Producer::Alias(target) => self.get_instance(target),
            Producer::PassThrough(link) => link.target.get_instance(&link.target_key),
            Producer::Call(callable) => {
                let args = self.collect_args(key, &record.dependencies)?;
                match self.0.options.invocation {
                    Invocation::Immediate => callable(&args)
                        .map_err(|error| RequireError::call_failed(key, error)),
                    Invocation::Deferred => Ok(Instance::new(deferred::invoke(
                        key.cloned(),
                        callable.clone(),
                        args,
                    ))),
                }
            }
        }
    }

    fn collect_args(
        &self,
        key: Option<&Key>,
        dependencies: &[Dependency],
    ) -> Result<Args, RequireError> {
        dependencies
            .iter()
            .map(|dependency| self.resolve_dependency(key, dependency))
            .collect::<Result<Vec<_>, _>>()
            .map(Args::new)
    }

    fn resolve_dependency(&self, key: Option<&Key>, dependency: &Dependency) -> Resolution {
        match dependency {
            Dependency::Key(dependency) => self.get_with(dependency, GetOptions::default()),
            Dependency::Optional(dependency) => self.get_with(dependency, GetOptions::optional()),
            Dependency::Resolver(resolve) => resolve(),
            Dependency::Skip => Ok(None),
            Dependency::Inline(record) => self.invoke(key, record).map(Some),
        }
    }

    /// Wraps every following resolution of this container
    ///
    /// The middleware added last runs first.
    pub fn use_middleware(
        &self,
        middleware: impl Fn(&Container, &Key, &dyn Fn(&Key) -> Resolution) -> Resolution
            + Send
            + Sync
            + 'static,
    ) -> &Self {
        let mut state = self.0.state.lock();
        state.middlewares.push(Arc::new(middleware));
        let pipeline = compose(&state.middlewares);
        state.pipeline = pipeline;
        self
    }

    /// Child container reading from this one, starting with a copy of its middlewares
    pub fn fork(&self) -> Container {
        self.fork_with(ForkOptions::default())
    }

    pub fn fork_with(&self, options: ForkOptions) -> Container {
        let middlewares = match options.skip_middlewares {
            true => Vec::new(),
            false => self.0.state.lock().middlewares.clone(),
        };

        let child = Self::create(Some(self.clone()), self.0.options.clone(), middlewares);
        tracing::debug!("Forked container {} from {}", child.id(), self.id());
        child
    }

    /// Drops cached instances, factories are kept
    pub fn reset(&self, options: ResetOptions) -> &Self {
        {
            let mut state = self.0.state.lock();
            match &options.keys {
                Some(keys) => {
                    for key in keys {
                        state.singletons.remove(key);
                    }
                }
                None => state.singletons.clear(),
            }
        }
        tracing::debug!("Reset container {} ({:?})", self.id(), options.keys);

        if options.reset_parent {
            if let Some(parent) = self.parent() {
                parent.reset(options.clone());
            }
        }

        self.emit(Event::Reset {
            reset_parent: options.reset_parent,
            keys: options.keys,
            container: self.clone(),
        });
        self
    }

    /// Copies the records of all ancestors into a single container
    ///
    /// Cached instances are not copied, fixed values are cached again.
    pub fn flatten(&self, options: FlattenOptions) -> Result<Container, RegisterError> {
        let mut merged: IndexMap<Key, Arc<FactoryRecord>> = IndexMap::new();

        for container in self.ancestry() {
            for (key, record) in container.own_factories() {
                let specific = merged.get(&key).cloned();
                let Some(specific) = specific else {
                    merged.insert(key, record);
                    continue;
                };

                match &options.on_key_intersection {
                    KeyIntersection::PreferMostSpecific => {}
                    KeyIntersection::Fail => return Err(RegisterError::KeyIntersection(key)),
                    KeyIntersection::Resolve(resolve) => {
                        let resolved = resolve(&key, &*record, &*specific)?;
                        resolved.validate(&key)?;
                        merged.insert(key, Arc::new(resolved));
                    }
                }
            }
        }

        dependency_graph::check_flattened(&merged)?;

        let target = match options.fork {
            true => {
                let middlewares = self.0.state.lock().middlewares.clone();
                Self::create(None, self.0.options.clone(), middlewares)
            }
            false => self.clone(),
        };

        {
            let mut state = target.0.state.lock();
            for (key, record) in merged {
                let unchanged = state
                    .factories
                    .get(&key)
                    .is_some_and(|own| Arc::ptr_eq(own, &record));
                if unchanged {
                    continue;
                }

                state.singletons.remove(&key);
                if let Producer::Value(value) = &record.producer {
                    state.singletons.insert(key.clone(), value.clone());
                }
                state.factories.insert(key, record);
            }
        }
        tracing::debug!("Flattened container {} into {}", self.id(), target.id());

        Ok(target)
    }

    /// Resolves `dependencies` and calls `callable` with them, without registering anything
    pub fn injecute<T, F, D>(
        &self,
        callable: F,
        dependencies: impl IntoIterator<Item = D>,
    ) -> Result<T, RequireError>
    where
        F: FnOnce(&Args) -> Result<T, InjectError>,
        D: Into<Dependency>,
    {
        let dependencies: Vec<Dependency> = dependencies.into_iter().map(Into::into).collect();
        let args = self.collect_args(None, &dependencies)?;
        callable(&args).map_err(|error| RequireError::call_failed(None, error))
    }

    /// `callable` bound to this container, dependencies are resolved on every call
    pub fn bind<T, F, D>(
        &self,
        dependencies: impl IntoIterator<Item = D>,
        callable: F,
    ) -> impl Fn() -> Result<T, RequireError> + Send + Sync + 'static
    where
        T: 'static,
        F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
        D: Into<Dependency>,
    {
        bound(
            self.clone(),
            dependencies.into_iter().map(Into::into).collect(),
            callable,
        )
    }

    /// Invokes the [Function] registered under `key`
    pub fn call(&self, key: impl Into<Key>, args: Args) -> Result<Instance, RequireError> {
        let key = key.into();
        let function = self
            .get_instance(&key)?
            .downcast::<Function>()
            .map_err(|_| RequireError::NotCallable(key))?;

        function
            .invoke(&args)
            .map_err(|error| RequireError::call_failed(None, error))
    }

    /// Overrides the cached value of `key` until the next reset, factories stay untouched
    pub fn set_cache_instance<T: Injectable>(&self, key: impl Into<Key>, value: T) -> &Self {
        let key = key.into();
        tracing::debug!("Overriding cached '{}' in container {}", key, self.id());
        self.0
            .state
            .lock()
            .singletons
            .insert(key, Instance::new(value));
        self
    }

    /// Applies a group of registrations
    pub fn extend<R>(&self, extension: impl FnOnce(&Self) -> R) -> R {
        extension(self)
    }

    /// Dependency reading `key` from this container, wherever it is used
    pub fn resolver(&self, key: impl Into<Key>) -> Dependency {
        let container = self.clone();
        let key = key.into();
        Dependency::resolver(move || container.get_with(&key, GetOptions::default()))
    }

    /// Adds a listener by event name
    pub fn add_event_listener(
        &self,
        event: &str,
        listener: &Listener,
    ) -> Result<&Self, UnsupportedEventError> {
        let kind = event.parse::<EventKind>()?;
        self.0.state.lock().listeners.add(kind, listener.clone());
        Ok(self)
    }

    pub fn remove_event_listener(
        &self,
        event: &str,
        listener: &Listener,
    ) -> Result<&Self, UnsupportedEventError> {
        let kind = event.parse::<EventKind>()?;
        self.0.state.lock().listeners.remove(kind, listener);
        Ok(self)
    }

    /// Adds `handler` for `kind`, the returned listener removes it again
    pub fn on(&self, kind: EventKind, handler: impl Fn(&Event) + Send + Sync + 'static) -> Listener {
        let listener = Listener::new(handler);
        self.0.state.lock().listeners.add(kind, listener.clone());
        listener
    }

    pub fn off(&self, kind: EventKind, listener: &Listener) -> &Self {
        self.0.state.lock().listeners.remove(kind, listener);
        self
    }

    pub(crate) fn emit(&self, event: Event) {
        let listeners = self.0.state.lock().listeners.snapshot(event.kind());
        if listeners.is_empty() {
            return;
        }

        tracing::trace!(
            "Dispatching {} to {} listeners of container {}",
            event.kind().name(),
            listeners.len(),
            self.id()
        );
        for listener in listeners {
            listener.notify(&event);
        }
    }

    pub(crate) fn adopt(&self, adoption: Adoption) {
        self.0.state.lock().adopters.push(adoption);
    }

    fn notify_adopters(&self, key: &Key) -> Result<(), RegisterError> {
        let adopters = self.0.state.lock().adopters.clone();
        for adoption in adopters {
            adoption.link(key)?;
        }
        Ok(())
    }
}

fn bound<T, F>(
    container: Container,
    dependencies: Vec<Dependency>,
    callable: F,
) -> impl Fn() -> Result<T, RequireError> + Send + Sync + 'static
where
    T: 'static,
    F: Fn(&Args) -> Result<T, InjectError> + Send + Sync + 'static,
{
    move || container.injecute(&callable, dependencies.iter().cloned())
}

fn downcast<T: Injectable>(instance: &Instance) -> Result<Arc<T>, RequireError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| RequireError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}
