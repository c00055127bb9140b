//! Namespaces expose the keys of a child container in its parent as `"<namespace>.<key>"`.
//!
//! Every exposed key is a pass-through record holding a [NamespaceLink]. The link is also
//! what keeps both sides in sync: when either side replaces a linked key, the other side
//! is re-pointed at the new record, so both addressing paths resolve the latest registration.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    container::{Bridge, Container, ContainerInner},
    errors::RegisterError,
    factories::FactoryRecord,
    types::Key,
};

/// Which way a pass-through record forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// Registered in the parent, forwards `"ns.k"` to `k` of the namespace container
    IntoNamespace,
    /// Registered in the namespace container, forwards `k` to `"ns.k"` of the parent
    IntoParent,
}

/// Target of a pass-through record
#[derive(Clone)]
pub struct NamespaceLink {
    pub target: Container,
    pub target_key: Key,
    pub direction: LinkDirection,
}

impl fmt::Debug for NamespaceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceLink")
            .field("target", &self.target.id())
            .field("target_key", &self.target_key)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Registered on every container of an adopted namespace chain
///
/// Keys added there later get linked into the parent as well.
#[derive(Clone)]
pub(crate) struct Adoption {
    pub parent: Weak<ContainerInner>,
    pub namespace: Arc<str>,
    /// The container `"ns.k"` forwards to
    pub target: Weak<ContainerInner>,
}

impl Adoption {
    /// Links `key` into the parent, if both containers are still alive
    pub fn link(&self, key: &Key) -> Result<(), RegisterError> {
        let (Some(parent), Some(target)) = (self.parent.upgrade(), self.target.upgrade()) else {
            return Ok(());
        };
        link_namespaced(
            &Container(parent),
            &self.namespace,
            &Container(target),
            key,
        )
    }
}

impl Container {
    /// Adopts a child container under `name`
    ///
    /// `extension` receives a fresh fork of this container and returns the namespace
    /// container. It is registered as an instance under `name` and each of its own keys,
    /// and those of its ancestors up to this container, become available as `"name.key"`.
    ///
    /// A namespace forked from this container keeps it as parent while this container
    /// keeps the namespace as instance, so neither is ever freed. Avoid adopting
    /// namespaces into short lived forks.
    ///
    /// ```rust
    /// # use wrapp_container::Container;
    /// let container = Container::new();
    /// container
    ///     .namespace("NS", |ns| {
    ///         ns.add_instance("k", 1_u32)?;
    ///         Ok(ns)
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(*container.get::<u32>("NS.k").unwrap(), 1);
    /// ```
    pub fn namespace(
        &self,
        name: &str,
        extension: impl FnOnce(Container) -> Result<Container, RegisterError>,
    ) -> Result<&Self, RegisterError> {
        let key = Key::from(name);
        if self.has_own(&key) {
            return Err(RegisterError::NamespaceInUse(key));
        }

        let namespace = extension(self.fork())?;
        if namespace.ptr_eq(self) {
            return Err(RegisterError::NamespaceIsParent(key));
        }

        self.add_instance(key, namespace.clone())?;

        let name: Arc<str> = name.into();
        for container in namespace.ancestry() {
            if container.ptr_eq(self) {
                break;
            }

            for own_key in container.keys() {
                link_namespaced(self, &name, &namespace, &own_key)?;
            }
            container.adopt(Adoption {
                parent: Arc::downgrade(&self.0),
                namespace: name.clone(),
                target: Arc::downgrade(&namespace.0),
            });
        }

        tracing::debug!("Adopted container {} as namespace '{}'", namespace.id(), name);
        Ok(self)
    }
}

/// Registers `"namespace.key"` in `parent`, forwarding to `key` of `target`
fn link_namespaced(
    parent: &Container,
    namespace: &str,
    target: &Container,
    key: &Key,
) -> Result<(), RegisterError> {
    let Some(prefixed) = key.prefixed(namespace) else {
        return Ok(());
    };
    if parent.has_own(&prefixed) {
        return Ok(());
    }

    let link = NamespaceLink {
        target: target.clone(),
        target_key: key.clone(),
        direction: LinkDirection::IntoNamespace,
    };
    parent.register(
        prefixed,
        FactoryRecord::pass_through(link),
        false,
        Bridge::Skip,
    )?;
    Ok(())
}

/// Re-points the other side of `link` before `container` commits a replacement of `key`
pub(crate) fn bridge_replacement(
    container: &Container,
    key: &Key,
    link: &NamespaceLink,
) -> Result<(), RegisterError> {
    let reverse = NamespaceLink {
        target: container.clone(),
        target_key: key.clone(),
        direction: match link.direction {
            LinkDirection::IntoNamespace => LinkDirection::IntoParent,
            LinkDirection::IntoParent => LinkDirection::IntoNamespace,
        },
    };

    tracing::debug!(
        "Bridging replacement of '{}' in container {} to '{}' in container {}",
        key,
        container.id(),
        link.target_key,
        link.target.id()
    );
    link.target.register(
        link.target_key.clone(),
        FactoryRecord::pass_through(reverse),
        true,
        Bridge::Skip,
    )?;
    Ok(())
}
