//! Instrumentation layers over storage operations.
//!
//! Layers compose explicitly. The cache builds its store as
//! `raw.layer(&CallCounter).layer(&CallRecorder)`, so one call runs:
//! input recorded → count incremented → raw operation → output recorded.

mod counter;
mod operation;
mod recorder;

pub use counter::CallCounter;
pub use operation::{BoundOperation, Layer, Operation, OperationBody};
pub use recorder::CallRecorder;
