#![forbid(unsafe_code)]
//! dagc-exec: reference interpreter for compiled units and fused vertices.
//!
//! - `interpreter`: evaluates unit bodies, binds user methods on load.
//! - `instance`: units with their construction parameters.
//! - `aggregate`: mapper/combiner/copier driving for aggregate operations.
//! - `fused`: whole vertices, instantiated slot by slot.
//! - `runtime`: the loaded-unit cache and the error type.
//!
//! Records flow push-style: a unit hands each emitted record to the sink
//! bound to that output, which may itself be the next unit.

pub mod aggregate;
pub mod fused;
pub mod instance;
pub mod interpreter;
pub mod metrics;
pub mod runtime;
pub mod sink;

pub use aggregate::AggregateDriver;
pub use fused::{FusedInstance, VertexInput, VertexIo};
pub use instance::{Binding, RuntimeContext, UnitInput, UnitInstance};
pub use interpreter::{Interpreter, LoadedUnit};
pub use runtime::{ExecError, Runtime};
pub use sink::{Collector, Fanout, RecordSink};
