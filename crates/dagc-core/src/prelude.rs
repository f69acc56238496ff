//! Convenient re-exports for downstream crates.

pub use crate::config::CompilerConfig;
pub use crate::dag::{
    attr, Attributes, CoreKind, Direction, Grouping, InputPort, InputUnit, Operator,
    OperatorKind, OutputPort, PortDirection, PortRef, UserKind,
};
pub use crate::error::{Diagnostics, Error, Result};
pub use crate::graph::{Connection, OperatorGraph};
pub use crate::hash::Hash256;
pub use crate::id::{ElementId, OperatorId, SlotId, UnitId};
pub use crate::logic::{
    GroupInput, Invocation, LogicRegistry, LogicResolver, MethodRef, MethodShape,
    ParameterShape, ReturnShape, UserMethod,
};
pub use crate::manifest::{CompileManifest, ManifestId, UnitEntry};
pub use crate::schema::{
    Aggregation, DataModel, DataType, FoldingDecl, JoinTerm, ModelReflector, ModelRegistry,
    Property, PropertyPair,
};
pub use crate::table::DataTable;
pub use crate::types::{Record, Value};
