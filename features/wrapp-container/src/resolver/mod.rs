//! Resolution pipeline
//!
//! Every `get` runs through the middlewares of the container before it reaches
//! the base resolution (cache, own factory, parent).

use std::sync::Arc;

use crate::{container::Container, errors::RequireError, types::Instance, types::Key};

pub mod deferred;

/// Outcome of a single resolution, `None` if no container in the chain knows the key
pub type Resolution = Result<Option<Instance>, RequireError>;

/// Interceptor around resolution
///
/// Receives the resolving container, the requested key and the next step of the pipeline.
/// A middleware may call `next` with any key, any number of times, or not at all.
pub type Middleware =
    Arc<dyn Fn(&Container, &Key, &dyn Fn(&Key) -> Resolution) -> Resolution + Send + Sync>;

/// Middlewares composed into one function
pub(crate) type Pipeline = Arc<dyn Fn(&Container, &Key) -> Resolution + Send + Sync>;

/// Wraps the base resolution with `middlewares`, the last one ends up outermost
pub(crate) fn compose(middlewares: &[Middleware]) -> Pipeline {
    let base: Pipeline = Arc::new(|container: &Container, key: &Key| container.resolve(key));

    middlewares.iter().fold(base, |inner, middleware| {
        let middleware = middleware.clone();
        let pipeline: Pipeline = Arc::new(move |container: &Container, key: &Key| {
            let next = |key: &Key| inner(container, key);
            middleware(container, key, &next)
        });
        pipeline
    })
}
