#![forbid(unsafe_code)]
//! dagc-codegen: per-kind generators, the structural cache, and the unit IR.
//!
//! Design intent:
//! - Generation is pure and synchronous; the only shared state is the
//!   session's `UnitCache`.
//! - Every generator validates its operator, keys it structurally, and emits
//!   IR only on a cache miss. Operator-specific wiring lives in the
//!   `NodeInfo` dependencies, never in the shared unit.
//! - Lowering the IR is a backend's job (`UnitBackend`); `ListingBackend`
//!   prints it, `dagc-exec` interprets it.

pub mod backend;
pub mod cache;
pub mod context;
pub mod generator;
pub mod ir;
pub mod key;
pub mod node;
pub mod registry;
pub mod session;
pub mod unit;

pub use backend::{ListingBackend, UnitBackend};
pub use cache::{CacheStats, UnitCache};
pub use context::CodegenContext;
pub use generator::master_join::JoinStrategy;
pub use generator::OperatorGenerator;
pub use key::{CacheKey, KeyElement};
pub use node::{AggregateUnits, Dependency, NodeInfo};
pub use registry::GeneratorRegistry;
pub use session::{CompileSession, GraphUnits};
pub use unit::{CompiledUnit, Parameter, UnitRole};
