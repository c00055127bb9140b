//! Notifications emitted by a container while it is used.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use crate::{
    container::Container,
    errors::UnsupportedEventError,
    factories::FactoryRecord,
    types::{Instance, Key},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Replace,
    Reset,
    Get,
    Produce,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Add,
        EventKind::Replace,
        EventKind::Reset,
        EventKind::Get,
        EventKind::Produce,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Replace => "replace",
            EventKind::Reset => "reset",
            EventKind::Get => "get",
            EventKind::Produce => "produce",
        }
    }
}

impl FromStr for EventKind {
    type Err = UnsupportedEventError;

    fn from_str(event: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == event)
            .ok_or_else(|| UnsupportedEventError {
                event: event.to_string(),
                supported: EventKind::ALL.iter().map(EventKind::name).collect(),
            })
    }
}

/// Container events
#[derive(Clone)]
pub enum Event {
    /// A factory or instance was registered
    Add {
        key: Key,
        /// The registration was made with `replace` set, whether or not the key existed
        replace: bool,
        container: Container,
    },
    /// An own entry is about to be replaced
    Replace {
        key: Key,
        container: Container,
        /// The record being replaced
        replaced: Arc<FactoryRecord>,
    },
    /// Cached instances were dropped
    Reset {
        reset_parent: bool,
        /// `None` if the whole cache was dropped
        keys: Option<Vec<Key>>,
        container: Container,
    },
    /// A `get` call resolved a value
    Get {
        key: Key,
        value: Instance,
        container: Container,
    },
    /// A factory produced a new value
    Produce {
        key: Key,
        value: Instance,
        container: Container,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Add { .. } => EventKind::Add,
            Event::Replace { .. } => EventKind::Replace,
            Event::Reset { .. } => EventKind::Reset,
            Event::Get { .. } => EventKind::Get,
            Event::Produce { .. } => EventKind::Produce,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Event::Add { key, .. }
            | Event::Replace { key, .. }
            | Event::Get { key, .. }
            | Event::Produce { key, .. } => Some(key),
            Event::Reset { .. } => None,
        }
    }

    pub fn container(&self) -> &Container {
        match self {
            Event::Add { container, .. }
            | Event::Replace { container, .. }
            | Event::Reset { container, .. }
            | Event::Get { container, .. }
            | Event::Produce { container, .. } => container,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.kind().name());
        if let Some(key) = self.key() {
            debug.field("key", key);
        }
        debug.field("container", &self.container().id()).finish()
    }
}

/// Handle to an event handler
///
/// Handlers are compared by identity, adding the same listener twice keeps one entry.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&Event) + Send + Sync>);

impl Listener {
    pub fn new(handler: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        Listener(Arc::new(handler))
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub(crate) fn notify(&self, event: &Event) {
        (self.0)(event)
    }
}

/// Listeners of one container, per event kind
#[derive(Default)]
pub(crate) struct Listeners {
    by_kind: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    pub fn add(&mut self, kind: EventKind, listener: Listener) {
        let listeners = self.by_kind.entry(kind).or_default();
        if !listeners.iter().any(|existing| existing.ptr_eq(&listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove(&mut self, kind: EventKind, listener: &Listener) {
        if let Some(listeners) = self.by_kind.get_mut(&kind) {
            listeners.retain(|existing| !existing.ptr_eq(listener));
        }
    }

    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }
}
