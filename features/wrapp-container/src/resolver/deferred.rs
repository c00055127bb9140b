use std::{
    any::type_name,
    fmt::Debug,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{
    future::{self, BoxFuture, Shared},
    FutureExt,
};
use pin_project_lite::pin_project;

use crate::{
    errors::{InjectError, RequireError},
    factories::{Args, Callable},
    types::{Injectable, Instance, Key},
};

pin_project! {
    /// Value which is still being computed
    ///
    /// Produced by factories of a container using `Invocation::Deferred` and by factories
    /// wrapped with [defer]. Clones share the same computation, so a cached singleton
    /// only ever runs it once.
    #[derive(Clone)]
    pub struct Deferred {
        #[pin]
        inner: Shared<BoxFuture<'static, Result<Instance, RequireError>>>,
    }
}

impl Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.peek() {
            Some(result) => f.debug_tuple("Deferred").field(result).finish(),
            None => f.debug_tuple("Deferred").field(&"<pending>").finish(),
        }
    }
}

impl Deferred {
    pub fn new(
        computation: impl Future<Output = Result<Instance, RequireError>> + Send + 'static,
    ) -> Self {
        Deferred {
            inner: computation.boxed().shared(),
        }
    }

    pub fn ready(result: Result<Instance, RequireError>) -> Self {
        Self::new(future::ready(result))
    }

    /// The result, if the computation already completed
    pub fn peek(&self) -> Option<&Result<Instance, RequireError>> {
        self.inner.peek()
    }

    /// Waits for the computation and downcasts its value
    pub async fn value<T: Injectable>(&self) -> Result<Arc<T>, RequireError> {
        let instance = self.clone().await?;
        instance
            .downcast::<T>()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }
}

impl Future for Deferred {
    type Output = Result<Instance, RequireError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}

/// Awaits `instance` if it holds a [Deferred], otherwise returns it as is
pub async fn settle(instance: Option<Instance>) -> Result<Option<Instance>, RequireError> {
    match instance {
        Some(instance) => match instance.downcast::<Deferred>() {
            Ok(deferred) => (*deferred).clone().await.map(Some),
            Err(_) => Ok(Some(instance)),
        },
        None => Ok(None),
    }
}

/// Awaits every deferred argument at once
pub(crate) async fn settle_args(args: Args) -> Result<Args, RequireError> {
    future::try_join_all(args.into_values().into_iter().map(settle))
        .await
        .map(Args::new)
}

/// Runs `callable` once all of `args` are available
///
/// A callable which itself returns a [Deferred] is flattened into the result.
pub(crate) fn invoke(key: Option<Key>, callable: Callable, args: Args) -> Deferred {
    Deferred::new(async move {
        let args = settle_args(args).await?;
        let produced =
            callable(&args).map_err(|error| RequireError::call_failed(key.as_ref(), error))?;

        match produced.downcast::<Deferred>() {
            Ok(deferred) => (*deferred).clone().await,
            Err(_) => Ok(produced),
        }
    })
}

/// Turns an async factory into one producing a [Deferred]
///
/// The dependencies are awaited before `factory` runs, so it always receives settled values.
/// ```rust
/// # use wrapp_container::{defer, Container};
/// let container = Container::new();
/// container
///     .add_singleton("answer", defer(|_| async { Ok(42_u32) }), ())
///     .unwrap();
///
/// let answer = futures::executor::block_on(container.get_deferred::<u32>("answer")).unwrap();
/// assert_eq!(*answer, 42);
/// ```
pub fn defer<T, F, Fut>(
    factory: F,
) -> impl Fn(&Args) -> Result<Deferred, InjectError> + Send + Sync + 'static
where
    T: Injectable,
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, InjectError>> + Send + 'static,
{
    let factory = Arc::new(factory);
    move |args: &Args| {
        let factory = factory.clone();
        let args = args.clone();
        Ok(Deferred::new(async move {
            let args = settle_args(args).await?;
            factory(args)
                .await
                .map(Instance::new)
                .map_err(|error| RequireError::call_failed(None, error))
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::factories::callable;

    #[test]
    fn awaits_deferred_arguments() {
        let args = Args::new(vec![
            Some(Instance::new(Deferred::ready(Ok(Instance::new(2_i32))))),
            Some(Instance::new(3_i32)),
            None,
        ]);
        let sum = callable(|args: &Args| {
            assert!(args.instance(2).is_none());
            Ok(*args.get::<i32>(0)? + *args.get::<i32>(1)?)
        });

        let deferred = invoke(Some("sum".into()), sum, args);
        assert_eq!(*block_on(deferred.value::<i32>()).unwrap(), 5);
    }

    #[test]
    fn failing_argument_fails_the_invocation() {
        let args = Args::new(vec![Some(Instance::new(Deferred::ready(Err(
            RequireError::ServiceNotFound("missing".into()),
        ))))]);
        let never = callable(|_: &Args| -> Result<i32, InjectError> { unreachable!() });

        let result = block_on(invoke(None, never, args));
        assert!(matches!(result, Err(RequireError::ServiceNotFound(_))));
    }

    #[test]
    fn clones_share_one_computation() {
        let deferred = Deferred::new(async { Ok(Instance::new(String::from("once"))) });
        let clone = deferred.clone();

        let first = block_on(deferred).unwrap();
        assert!(clone.peek().is_some());
        assert!(first.ptr_eq(&block_on(clone).unwrap()));
    }
}
