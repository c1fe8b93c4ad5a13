//! Instrumentable operations and the layer trait that wraps them.

use crate::backend::BackendHandle;
use crate::error::Result;
use crate::value::{CallArgs, CallOutput};
use std::fmt;
use std::sync::Arc;

/// Signature shared by every operation and every layer around it.
///
/// The handle plays the role of the receiver; `A` is the argument tuple.
pub type OperationBody<A, R> = dyn Fn(&BackendHandle, &A) -> Result<R> + Send + Sync;

/// A named storage operation.
///
/// The identity namespaces the operation's counter and history lists. Layers
/// keep the identity of the operation they wrap.
pub struct Operation<A, R> {
    identity: Arc<str>,
    body: Arc<OperationBody<A, R>>,
}

impl<A, R> Operation<A, R> {
    pub fn new<F>(identity: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&BackendHandle, &A) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            identity: identity.into(),
            body: Arc::new(body),
        }
    }

    /// Stable name of the operation, e.g. `Cache.store`.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Run the operation (and every layer around it) against `backend`.
    pub fn invoke(&self, backend: &BackendHandle, args: &A) -> Result<R> {
        (self.body)(backend, args)
    }

    /// Associate the operation with the backend of a specific instance.
    pub fn bind<'a>(&'a self, backend: &'a BackendHandle) -> BoundOperation<'a, A, R> {
        BoundOperation {
            operation: self,
            backend,
        }
    }

    /// Wrap the operation in `layer`. Later calls wrap outermost.
    pub fn layer<L: Layer>(self, layer: &L) -> Self
    where
        A: CallArgs + 'static,
        R: CallOutput + 'static,
    {
        layer.wrap(self)
    }
}

impl<A, R> Clone for Operation<A, R> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            body: Arc::clone(&self.body),
        }
    }
}

impl<A, R> fmt::Debug for Operation<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// An operation tied to the backend of the instance that owns it.
pub struct BoundOperation<'a, A, R> {
    operation: &'a Operation<A, R>,
    backend: &'a BackendHandle,
}

impl<'a, A, R> BoundOperation<'a, A, R> {
    pub fn call(&self, args: &A) -> Result<R> {
        self.operation.invoke(self.backend, args)
    }

    pub fn operation(&self) -> &'a Operation<A, R> {
        self.operation
    }

    pub fn backend(&self) -> &'a BackendHandle {
        self.backend
    }
}

/// A decorator over operations sharing the common call signature.
pub trait Layer {
    /// Return a new operation with the same identity that runs `op`
    /// inside this layer's hooks.
    fn wrap<A, R>(&self, op: Operation<A, R>) -> Operation<A, R>
    where
        A: CallArgs + 'static,
        R: CallOutput + 'static;
}
