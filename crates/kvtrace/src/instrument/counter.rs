//! Call counting layer.

use super::operation::{Layer, Operation};
use crate::value::{CallArgs, CallOutput};
use tracing::{trace, warn};

/// Increments the backend counter named by the operation identity before
/// every call.
///
/// Counting is best-effort: a detached handle skips it, and a failed
/// increment is logged and dropped. The wrapped operation always runs and
/// its result is returned untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallCounter;

impl Layer for CallCounter {
    fn wrap<A, R>(&self, op: Operation<A, R>) -> Operation<A, R>
    where
        A: CallArgs + 'static,
        R: CallOutput + 'static,
    {
        let identity = op.identity().to_string();
        Operation::new(identity.clone(), move |backend, args| {
            if backend.is_connected() {
                if let Err(e) = backend.backend().increment(&identity) {
                    warn!("Failed to count call to {}: {}", identity, e);
                }
            } else {
                trace!("Call counter skipped for {}: backend detached", identity);
            }
            op.invoke(backend, args)
        })
    }
}
