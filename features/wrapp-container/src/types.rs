use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// All errors raised by user code must be shareable
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Containers are shared handles, so anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Type erased value produced by a factory
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn is<T: Injectable>(&self) -> bool {
        self.instance.is::<T>()
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// True if both handles point at the same produced value
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.instance), Arc::as_ptr(&other.instance))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Opaque key which is only equal to its own clones
///
/// Two symbols created with the same description are different keys.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Symbol {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Symbol {}
impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Name of a registered service
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Arc<str>),
    Num(i64),
    Symbol(Symbol),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(name) => Some(name),
            _ => None,
        }
    }

    /// The `"<namespace>.<key>"` alias of this key, symbols can't be prefixed
    pub fn prefixed(&self, namespace: &str) -> Option<Key> {
        match self {
            Key::Str(name) => Some(Key::from(format!("{namespace}.{name}"))),
            Key::Num(number) => Some(Key::from(format!("{namespace}.{number}"))),
            Key::Symbol(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(name) => f.write_str(name),
            Key::Num(number) => write!(f, "{number}"),
            Key::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(name) => write!(f, "{name:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Str(name.into())
    }
}
impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Str(name.into())
    }
}
impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Key::Str(name)
    }
}
impl From<i64> for Key {
    fn from(number: i64) -> Self {
        Key::Num(number)
    }
}
impl From<i32> for Key {
    fn from(number: i32) -> Self {
        Key::Num(number.into())
    }
}
impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}
impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}
