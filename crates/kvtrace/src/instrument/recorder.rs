//! Call history layer.

use super::operation::{Layer, Operation};
use crate::config::KeyspaceConfig;
use crate::value::{CallArgs, CallOutput};
use tracing::{trace, warn};

/// Appends the rendered argument tuple to `<identity>:inputs` before each
/// call, and the result to `<identity>:outputs` once the call succeeds.
///
/// A failed call leaves its input without a matching output, so a history
/// with one more input than outputs marks an interrupted call. Like
/// [`super::CallCounter`], bookkeeping is skipped on detached handles and
/// its failures never reach the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallRecorder;

impl Layer for CallRecorder {
    fn wrap<A, R>(&self, op: Operation<A, R>) -> Operation<A, R>
    where
        A: CallArgs + 'static,
        R: CallOutput + 'static,
    {
        let identity = op.identity().to_string();
        let inputs_key = KeyspaceConfig::inputs_key(&identity);
        let outputs_key = KeyspaceConfig::outputs_key(&identity);

        Operation::new(identity, move |backend, args: &A| {
            let live = backend.is_connected();

            if live {
                let rendered = args.render_args();
                if let Err(e) = backend.backend().append(&inputs_key, rendered.as_bytes()) {
                    warn!("Failed to record input for {}: {}", op.identity(), e);
                }
            } else {
                trace!("Call recorder skipped for {}: backend detached", op.identity());
            }

            let output = op.invoke(backend, args)?;

            if live {
                if let Err(e) = backend.backend().append(&outputs_key, &output.to_record()) {
                    warn!("Failed to record output for {}: {}", op.identity(), e);
                }
            }

            Ok(output)
        })
    }
}
