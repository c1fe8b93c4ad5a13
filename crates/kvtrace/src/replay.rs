//! Replay of recorded call history.
//!
//! Reconstructs an instrumented operation's call count and input/output
//! pairs from backend state and prints them:
//!
//! ```text
//! Cache.store was called 3 times:
//! Cache.store(*('Hello',)) -> 5c6f4a9e-...
//! Cache.store(*(98,)) -> 0b1d2c3e-...
//! Cache.store(*(b'bytes',)) -> 9f8e7d6c-...
//! ```

use crate::backend::{BackendHandle, KvBackend};
use crate::config::KeyspaceConfig;
use crate::error::Result;
use crate::instrument::{BoundOperation, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tracing::{trace, warn};

/// Something replay can resolve to an operation identity and, when bound
/// to an instance, that instance's backend.
pub trait Replayable {
    fn operation_identity(&self) -> &str;

    /// Backend of the owning instance; `None` for unbound operations.
    fn bound_backend(&self) -> Option<&BackendHandle>;
}

impl<A, R> Replayable for Operation<A, R> {
    fn operation_identity(&self) -> &str {
        self.identity()
    }

    fn bound_backend(&self) -> Option<&BackendHandle> {
        None
    }
}

impl<A, R> Replayable for BoundOperation<'_, A, R> {
    fn operation_identity(&self) -> &str {
        self.operation().identity()
    }

    fn bound_backend(&self) -> Option<&BackendHandle> {
        Some(self.backend())
    }
}

/// Recorded history of one operation, oldest call first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHistory {
    pub operation: String,
    pub call_count: i64,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl CallHistory {
    /// Read counter and history lists for `operation` from `backend`.
    ///
    /// An absent counter reads as zero.
    pub fn load(backend: &dyn KvBackend, operation: &str) -> Result<Self> {
        let call_count = if backend.exists(operation)? {
            backend.get_counter(operation)?.unwrap_or(0)
        } else {
            0
        };

        let read_list = |key: String| -> Result<Vec<String>> {
            Ok(backend
                .get_range(&key, 0, -1)?
                .into_iter()
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                .collect())
        };

        Ok(Self {
            operation: operation.to_string(),
            call_count,
            inputs: read_list(KeyspaceConfig::inputs_key(operation))?,
            outputs: read_list(KeyspaceConfig::outputs_key(operation))?,
        })
    }

    /// Input/output pairs by position. Unmatched trailing entries are left
    /// out.
    pub fn calls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .zip(self.outputs.iter())
            .map(|(input, output)| (input.as_str(), output.as_str()))
    }

    /// Inputs recorded without a matching output (calls that failed after
    /// their input was recorded).
    pub fn unmatched_inputs(&self) -> usize {
        self.inputs.len().saturating_sub(self.outputs.len())
    }

    /// Whether counter and both lists agree.
    pub fn is_consistent(&self) -> bool {
        self.inputs.len() == self.outputs.len() && self.call_count == self.inputs.len() as i64
    }
}

impl fmt::Display for CallHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.operation, self.call_count)?;
        for (input, output) in self.calls() {
            writeln!(f, "{}(*{}) -> {}", self.operation, input, output)?;
        }
        Ok(())
    }
}

/// Print the call history of `operation` to stdout.
///
/// Prints nothing when there is no operation, when it is not bound to an
/// instance, or when that instance's backend is detached. Backend failures
/// are logged rather than returned.
pub fn replay<R: Replayable + ?Sized>(operation: Option<&R>) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = replay_to(operation, &mut out) {
        warn!("Replay failed: {}", e);
    }
}

/// Write the call history of `operation` to `out`.
///
/// Same no-op rules as [`replay`]; backend and write failures are returned.
pub fn replay_to<R, W>(operation: Option<&R>, out: &mut W) -> Result<()>
where
    R: Replayable + ?Sized,
    W: Write,
{
    let Some(operation) = operation else {
        trace!("Replay skipped: no operation");
        return Ok(());
    };
    let Some(backend) = operation.bound_backend() else {
        trace!(
            "Replay skipped for {}: not bound to an instance",
            operation.operation_identity()
        );
        return Ok(());
    };
    if !backend.is_connected() {
        trace!(
            "Replay skipped for {}: backend detached",
            operation.operation_identity()
        );
        return Ok(());
    }

    let history = CallHistory::load(backend.backend(), operation.operation_identity())?;
    if history.unmatched_inputs() > 0 {
        trace!(
            "{} has {} input(s) without output",
            history.operation,
            history.unmatched_inputs()
        );
    }

    write!(out, "{}", history)?;
    out.flush()?;
    Ok(())
}
