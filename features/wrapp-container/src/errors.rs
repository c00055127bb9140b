use std::sync::Arc;

use thiserror::Error;

use crate::types::{DynError, Key};

/// Errors while registering factories, instances or namespaces
#[derive(Error, Debug)]
pub enum RegisterError {
    /// Keys must not be the empty string
    #[error("'{0}' is not allowed as key for a service")]
    InvalidKey(Key),
    /// The factory record is not usable for its kind
    #[error("Factory for '{key}' is invalid: {reason}")]
    InvalidFactory { key: Key, reason: &'static str },
    /// The key is already registered in this container
    #[error("Factory or instance with key '{0}' already registered")]
    DuplicateKey(Key),
    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),
    /// A namespace was added under a key which is already used
    #[error("Namespace key '{0}' is already in use")]
    NamespaceInUse(Key),
    /// The namespace extension returned the container it was added to
    #[error("Namespace '{0}' must not be the container it is added to")]
    NamespaceIsParent(Key),
    /// Flattening found the same key in more than one container of the chain
    #[error("Key '{0}' is registered by more than one container in the chain")]
    KeyIntersection(Key),
    /// A registration step had to resolve a service and failed
    #[error(transparent)]
    Require(#[from] RequireError),
}

/// A dependency cycle found while registering
///
/// The chain starts at the first key of the walk and ends with the key which closes the cycle.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Circular dependency detected {}.", describe_chain(.chain))]
pub struct CircularDependencyError {
    pub chain: Vec<Key>,
}

fn describe_chain(chain: &[Key]) -> String {
    chain
        .iter()
        .enumerate()
        .map(|(index, key)| match index + 1 == chain.len() {
            true => format!("*{key}*"),
            false => key.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors when trying to get a service
#[derive(Error, Debug, Clone)]
pub enum RequireError {
    /// No container in the chain knows the key
    #[error("No service registered for '{0}' key")]
    ServiceNotFound(Key),
    /// `call` was used on a value which is not a function
    #[error("Service '{0}' is not callable")]
    NotCallable(Key),
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A factory returned an error
    #[error("Factory for '{key}' failed - error: {error}")]
    FactoryFailed { key: Key, error: Arc<InjectError> },
    /// An ad-hoc invocation returned an error
    #[error("Invocation failed - error: {error}")]
    InvocationFailed { error: Arc<InjectError> },
}

impl RequireError {
    /// Error for a failed call, attributed to `key` if a registered factory failed
    pub(crate) fn call_failed(key: Option<&Key>, error: InjectError) -> Self {
        let error = Arc::new(error);
        match key {
            Some(key) => RequireError::FactoryFailed {
                key: key.clone(),
                error,
            },
            None => RequireError::InvocationFailed { error },
        }
    }
}

/// Errors returned by factories
#[derive(Error, Debug)]
pub enum InjectError {
    /// A dependency could not be provided
    #[error(transparent)]
    Require(#[from] RequireError),
    /// Nothing was injected at the given argument position
    #[error("No value injected for argument {0}")]
    MissingArgument(usize),
    /// Generic error raised by the factory itself
    #[error("Error during injection: {0}")]
    Other(DynError),
}

impl InjectError {
    pub fn other(error: impl Into<DynError>) -> Self {
        Self::Other(error.into())
    }
}

/// An event name no container emits
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Event \"{event}\" not supported. {} allowed", quoted(.supported))]
pub struct UnsupportedEventError {
    pub event: String,
    pub supported: Vec<&'static str>,
}

fn quoted(names: &[&'static str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
