//! Helpers built only on the public container operations

use crate::{container::Container, errors::RequireError, types::Key};

/// Resolves `keys` up front, creating singletons before the first request
///
/// Useful to check services are configured correctly right at startup.
pub fn preload<K: Into<Key>>(
    container: &Container,
    keys: impl IntoIterator<Item = K>,
) -> Result<(), RequireError> {
    for key in keys {
        container.get_instance(key)?;
    }
    Ok(())
}

/// Resolves every own key of `container`
pub fn preload_all(container: &Container) -> Result<(), RequireError> {
    preload(container, container.keys())
}

/// Resolves the own keys matching `predicate`
/// ```rust
/// # use wrapp_container::{utils::preload_matching, Container};
/// let container = Container::new();
/// container.add_instance("Feature.Domain.repository", 1_u8).unwrap();
///
/// preload_matching(&container, |key| {
///     key.as_str().is_some_and(|key| key.starts_with("Feature.Domain."))
/// })
/// .unwrap();
/// ```
pub fn preload_matching(
    container: &Container,
    predicate: impl Fn(&Key) -> bool,
) -> Result<(), RequireError> {
    preload(
        container,
        container.keys().into_iter().filter(|key| predicate(key)),
    )
}
