//! Runtime: load compiled units once and wire them into live instances.
//!
//! - `Runtime::load` lowers a unit through the interpreter, cached by unit id.
//! - `instantiate_unit` / `instantiate_aggregate` build single nodes.
//! - `instantiate` builds a whole fused vertex, slot by slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use dagc_codegen::{CompiledUnit, NodeInfo, UnitBackend};
use dagc_core::id::UnitId;
use dagc_core::logic::LogicResolver;
use dagc_fusion::FusedOperation;

use crate::aggregate::AggregateDriver;
use crate::fused::{FusedInstance, VertexIo};
use crate::instance::{Binding, UnitInstance};
use crate::interpreter::{Interpreter, LoadedUnit};
use crate::metrics::emit_span;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("compile: {0}")]
    Compile(#[from] dagc_core::error::Error),
    #[error("method {method}: {message}")]
    Method { method: String, message: String },
    #[error("binding: {0}")]
    Binding(String),
    #[error("invalid execution state: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Owns the interpreter and the loaded units.
pub struct Runtime {
    interpreter: Interpreter,
    loaded: Mutex<HashMap<UnitId, Arc<LoadedUnit>>>,
}

impl Runtime {
    pub fn new(logic: Arc<dyn LogicResolver>) -> Self {
        Self {
            interpreter: Interpreter::new(logic),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Bind a unit's methods; each unit id is loaded once.
    pub fn load(&self, unit: &CompiledUnit) -> Result<Arc<LoadedUnit>> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| ExecError::Invalid("loaded-unit table poisoned".into()))?;
        if let Some(l) = loaded.get(&unit.id) {
            return Ok(Arc::clone(l));
        }
        let l = self.interpreter.lower(unit)?;
        tracing::debug!(unit = %unit.name, methods = unit.methods.len(), "loaded unit");
        loaded.insert(unit.id, Arc::clone(&l));
        Ok(l)
    }

    /// Number of distinct units loaded so far.
    pub fn loaded(&self) -> usize {
        self.loaded.lock().map(|l| l.len()).unwrap_or_default()
    }

    pub fn instantiate_unit(&self, unit: &CompiledUnit, bindings: Vec<Binding>) -> Result<UnitInstance> {
        UnitInstance::new(self.load(unit)?, bindings)
    }

    /// `bindings` are for the operation unit; companions take none.
    pub fn instantiate_aggregate(&self, node: &NodeInfo, bindings: Vec<Binding>) -> Result<AggregateDriver> {
        let units = node.aggregate.as_ref().ok_or_else(|| {
            ExecError::Invalid(format!("{} is not an aggregate operation", node.unit.name))
        })?;
        let mapper = units
            .mapper
            .as_ref()
            .map(|m| self.instantiate_unit(m, vec![]))
            .transpose()?;
        Ok(AggregateDriver::new(
            mapper,
            self.instantiate_unit(&units.combiner, vec![])?,
            self.instantiate_unit(&units.copier, vec![])?,
            self.instantiate_unit(&node.unit, bindings)?,
        ))
    }

    pub fn instantiate(&self, op: &FusedOperation, io: VertexIo) -> Result<FusedInstance> {
        let instance = FusedInstance::build(self, op, io)?;
        emit_span(
            "vertex_instantiated",
            &[
                ("vertex", op.name.clone()),
                ("slots", op.slots.len().to_string()),
                ("units", self.loaded().to_string()),
            ],
        );
        Ok(instance)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("loaded", &self.loaded()).finish()
    }
}
