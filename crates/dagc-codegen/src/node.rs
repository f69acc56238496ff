//! What a generator hands back for one operator: the unit plus the runtime
//! dependencies its construction parameters need.

use std::sync::Arc;

use serde::Serialize;

use dagc_core::dag::Operator;
use dagc_core::error::{Error, Result};
use dagc_core::id::OperatorId;
use dagc_core::types::Value;

use crate::unit::{CompiledUnit, Parameter};

/// One construction parameter, as a request to whoever wires the unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Dependency {
    /// Whatever consumes output port `output`.
    Successor { output: usize },
    /// The side-table feeding input port `input`.
    Table { input: usize },
    Context,
    Literal(Value),
}

/// Mapper/combiner/copier of an aggregate operation.
#[derive(Debug, Clone)]
pub struct AggregateUnits {
    pub mapper: Option<Arc<CompiledUnit>>,
    pub combiner: Arc<CompiledUnit>,
    pub copier: Arc<CompiledUnit>,
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub operator: OperatorId,
    pub unit: Arc<CompiledUnit>,
    /// Data type of the input the unit accepts (first primary input).
    pub data_type: String,
    /// One per construction parameter, in order.
    pub dependencies: Vec<Dependency>,
    /// Set when the unit consumes pre-aggregated groups.
    pub aggregate: Option<AggregateUnits>,
}

impl NodeInfo {
    pub fn new(op: &Operator, unit: Arc<CompiledUnit>) -> Result<NodeInfo> {
        let dependencies = unit
            .parameters
            .iter()
            .map(|p| dependency(op, p))
            .collect::<Result<Vec<_>>>()?;
        let data_type = op
            .primary_inputs()
            .next()
            .map(|(_, p)| p.data_type.clone())
            .unwrap_or_default();
        Ok(NodeInfo {
            operator: op.id,
            unit,
            data_type,
            dependencies,
            aggregate: None,
        })
    }

    pub fn with_aggregate(mut self, units: AggregateUnits) -> NodeInfo {
        self.aggregate = Some(units);
        self
    }

    /// Every unit this node needs loaded.
    pub fn units(&self) -> Vec<Arc<CompiledUnit>> {
        let mut out = vec![Arc::clone(&self.unit)];
        if let Some(a) = &self.aggregate {
            out.extend(a.mapper.iter().cloned());
            out.push(Arc::clone(&a.combiner));
            out.push(Arc::clone(&a.copier));
        }
        out
    }
}

fn dependency(op: &Operator, p: &Parameter) -> Result<Dependency> {
    Ok(match p {
        Parameter::Sink { output, .. } => Dependency::Successor { output: *output },
        Parameter::Table { input, .. } => Dependency::Table { input: *input },
        Parameter::Context => Dependency::Context,
        Parameter::Argument { index, .. } => {
            let arg = op.arguments.get(*index).ok_or_else(|| {
                Error::Invariant(format!("{} has no argument {}", op, index))
            })?;
            Dependency::Literal(arg.value.clone())
        }
    })
}
