//! Vertex descriptions in, fused operations out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use dagc_codegen::CompiledUnit;
use dagc_core::dag::PortRef;
use dagc_core::id::{ElementId, OperatorId, SlotId, UnitId};

use crate::element::DependencyElement;

/// Operator output port -> vertex output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub port: PortRef,
    pub output: usize,
}

/// Side-input port -> vertex side-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBinding {
    pub port: PortRef,
    pub table: usize,
}

/// The operators of one vertex and how they meet the runtime boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexSpec {
    pub name: String,
    pub operators: Vec<OperatorId>,
    /// Receives every input of the vertex.
    pub entry: OperatorId,
    #[serde(default)]
    pub outputs: Vec<OutputBinding>,
    #[serde(default)]
    pub tables: Vec<TableBinding>,
}

impl VertexSpec {
    pub fn new(name: impl Into<String>, entry: OperatorId) -> Self {
        Self {
            name: name.into(),
            operators: vec![entry],
            entry,
            outputs: vec![],
            tables: vec![],
        }
    }

    pub fn member(mut self, op: OperatorId) -> Self {
        if !self.operators.contains(&op) {
            self.operators.push(op);
        }
        self
    }

    /// Bind output port `port` of `op` to vertex output `output`.
    pub fn output(mut self, op: OperatorId, port: usize, output: usize) -> Self {
        self.outputs.push(OutputBinding {
            port: PortRef::output(op, port),
            output,
        });
        self
    }

    /// Bind side-input port `port` of `op` to vertex side-table `table`.
    pub fn table(mut self, op: OperatorId, port: usize, table: usize) -> Self {
        self.tables.push(TableBinding {
            port: PortRef::input(op, port),
            table,
        });
        self
    }
}

/// How the vertex's input reaches the entry slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAdapter {
    /// One record per call.
    Record { data_type: String },
    /// One co-group cursor per call, one group per listed data type.
    CoGroup { groups: Vec<String> },
    /// Post-shuffle aggregates; the runtime may pre-aggregate with the
    /// companion units before the shuffle.
    Aggregated {
        data_type: String,
        mapper: Option<UnitId>,
        combiner: UnitId,
        copier: UnitId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAdapter {
    pub index: usize,
    pub data_type: String,
    pub slot: SlotId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAdapter {
    pub index: usize,
    pub data_type: String,
    pub slot: SlotId,
}

/// One slot initialization: build `element` from the earlier `arguments`.
#[derive(Debug, Clone)]
pub struct SlotInit {
    pub slot: SlotId,
    pub element: ElementId,
    pub kind: DependencyElement,
    pub arguments: Vec<SlotId>,
}

/// A whole vertex as one operation: slots in construction order plus the
/// slot that receives every input.
#[derive(Debug, Clone)]
pub struct FusedOperation {
    pub name: String,
    pub slots: Vec<SlotInit>,
    pub entry: SlotId,
    pub input: InputAdapter,
    pub outputs: Vec<OutputAdapter>,
    pub tables: Vec<TableAdapter>,
    pub context: Option<SlotId>,
}

impl FusedOperation {
    pub fn slot(&self, id: SlotId) -> Option<&SlotInit> {
        self.slots.get(id.index())
    }

    pub fn entry_slot(&self) -> Option<&SlotInit> {
        self.slot(self.entry)
    }

    /// Every distinct unit the operation loads, by unit id.
    pub fn units(&self) -> Vec<Arc<CompiledUnit>> {
        let mut out: Vec<Arc<CompiledUnit>> = self
            .slots
            .iter()
            .filter_map(|s| s.kind.node())
            .flat_map(|n| n.units())
            .collect();
        out.sort_by_key(|u| u.id);
        out.dedup_by_key(|u| u.id);
        out
    }
}
