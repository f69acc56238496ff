#![forbid(unsafe_code)]
//! dagc-fusion: flatten the operators of one vertex into one operation.
//!
//! Responsibilities:
//! - Compile every member of a vertex through the shared session.
//! - Turn unit construction parameters into wiring elements (operators,
//!   outputs, side-tables, context, literals, empty tables, fan-outs).
//! - Order the elements dependencies first and number their slots.
//! - Describe the vertex boundary with input/output/table adapters.
//!
//! **No execution here.** `dagc-exec` instantiates fused operations.

pub mod element;
pub mod fuse;
pub mod order;
pub mod parallel;
pub mod verify;
pub mod vertex;

pub use element::{DependencyElement, Element};
pub use fuse::fuse;
pub use parallel::compile_vertices;
pub use vertex::{
    FusedOperation, InputAdapter, OutputAdapter, OutputBinding, SlotInit, TableAdapter,
    TableBinding, VertexSpec,
};
