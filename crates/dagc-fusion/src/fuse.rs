//! Fusing the operators of one vertex.
//!
//! Every member is compiled through the session (so its unit comes from the
//! shared cache), then each construction parameter is turned into a wiring
//! element: successor ports become operator, output or fan-out elements,
//! side inputs become table or empty-table elements, and context and literal
//! elements are shared. The element graph is ordered dependencies first and
//! each element gets the slot of its position.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use dagc_codegen::ir::InputShape;
use dagc_codegen::{CompileSession, Dependency, NodeInfo};
use dagc_core::dag::{InputUnit, Operator, PortRef};
use dagc_core::error::{Error, Result};
use dagc_core::graph::OperatorGraph;
use dagc_core::hash::{hash_values, Hash256};
use dagc_core::id::{ElementId, OperatorId, SlotId};
use dagc_core::types::Value;

use crate::element::{DependencyElement, Element};
use crate::order;
use crate::vertex::{FusedOperation, InputAdapter, OutputAdapter, SlotInit, TableAdapter, VertexSpec};

/// Element graph under construction.
#[derive(Default)]
struct Wiring {
    elements: Vec<Element>,
    operators: HashMap<OperatorId, ElementId>,
    outputs: BTreeMap<usize, ElementId>,
    tables: BTreeMap<usize, ElementId>,
    empty: HashMap<String, ElementId>,
    literals: HashMap<Hash256, ElementId>,
    context: Option<ElementId>,
}

impl Wiring {
    fn push(&mut self, kind: DependencyElement) -> ElementId {
        let id = ElementId::new(self.elements.len() as u64);
        self.elements.push(Element {
            id,
            kind,
            dependencies: vec![],
        });
        id
    }

    fn context(&mut self) -> ElementId {
        if let Some(id) = self.context {
            return id;
        }
        let id = self.push(DependencyElement::Context);
        self.context = Some(id);
        id
    }

    fn literal(&mut self, value: &Value) -> ElementId {
        let digest = hash_values([value]);
        if let Some(id) = self.literals.get(&digest) {
            return *id;
        }
        let id = self.push(DependencyElement::Literal(value.clone()));
        self.literals.insert(digest, id);
        id
    }

    fn table(&mut self, index: usize, data_type: &str) -> ElementId {
        if let Some(id) = self.tables.get(&index) {
            return *id;
        }
        let id = self.push(DependencyElement::DataTable {
            index,
            data_type: data_type.to_string(),
        });
        self.tables.insert(index, id);
        id
    }

    fn empty_table(&mut self, data_type: &str) -> ElementId {
        if let Some(id) = self.empty.get(data_type) {
            return *id;
        }
        let id = self.push(DependencyElement::EmptyTable {
            data_type: data_type.to_string(),
        });
        self.empty.insert(data_type.to_string(), id);
        id
    }
}

/// Member operators of a vertex with their ids brought up to date.
struct Members<'g> {
    ops: Vec<&'g Operator>,
    entry: OperatorId,
    outputs: Vec<(PortRef, usize)>,
    tables: HashMap<PortRef, usize>,
}

fn members<'g>(graph: &'g OperatorGraph, spec: &VertexSpec) -> Result<Members<'g>> {
    let current = |p: PortRef| PortRef {
        operator: graph.current(p.operator),
        ..p
    };
    let mut seen = BTreeSet::new();
    let mut ops = Vec::with_capacity(spec.operators.len());
    for id in &spec.operators {
        let id = graph.current(*id);
        if !graph.is_live(id) {
            return Err(Error::Invariant(format!(
                "vertex {} names {} which is not live",
                spec.name, id
            )));
        }
        if seen.insert(id) {
            ops.push(graph.get(id)?);
        }
    }
    let entry = graph.current(spec.entry);
    if !seen.contains(&entry) {
        return Err(Error::Invariant(format!(
            "vertex {} entry {} is not a member",
            spec.name, entry
        )));
    }
    Ok(Members {
        ops,
        entry,
        outputs: spec
            .outputs
            .iter()
            .map(|b| (current(b.port), b.output))
            .collect(),
        tables: spec
            .tables
            .iter()
            .map(|b| (current(b.port), b.table))
            .collect(),
    })
}

/// Compile and fuse one vertex.
pub fn fuse(session: &CompileSession, graph: &OperatorGraph, spec: &VertexSpec) -> Result<FusedOperation> {
    let members = members(graph, spec)?;
    let member_ids: BTreeSet<OperatorId> = members.ops.iter().map(|op| op.id).collect();

    let mut nodes: Vec<(&Operator, NodeInfo)> = Vec::with_capacity(members.ops.len());
    for op in &members.ops {
        let node = session.compile_operator(op)?;
        let grouped = node.unit.input != InputShape::Record || node.aggregate.is_some();
        if op.id != members.entry && grouped {
            return Err(Error::shape(
                op,
                format!("only the entry of vertex {} may consume groups", spec.name),
            ));
        }
        nodes.push((*op, node));
    }

    let mut w = Wiring::default();
    for (op, node) in &nodes {
        let kind = match node.aggregate {
            Some(_) => DependencyElement::Aggregate(node.clone()),
            None => DependencyElement::Operator(node.clone()),
        };
        let id = w.push(kind);
        w.operators.insert(op.id, id);
    }
    let mut output_types: BTreeMap<usize, String> = BTreeMap::new();
    for (port, index) in &members.outputs {
        if !member_ids.contains(&port.operator) {
            return Err(Error::Invariant(format!(
                "vertex {} binds output {} to non-member port {}",
                spec.name, index, port
            )));
        }
        let op = graph.get(port.operator)?;
        let data_type = op
            .output(port.index)
            .map(|p| p.data_type.clone())
            .ok_or_else(|| Error::shape(op, format!("no output port {}", port.index)))?;
        if let Some(previous) = output_types.insert(*index, data_type.clone()) {
            if previous != data_type {
                return Err(Error::Invariant(format!(
                    "vertex {} output {} bound to both {} and {}",
                    spec.name, index, previous, data_type
                )));
            }
        }
    }
    for (index, data_type) in &output_types {
        let id = w.push(DependencyElement::Output {
            index: *index,
            data_type: data_type.clone(),
        });
        w.outputs.insert(*index, id);
    }

    for (op, node) in &nodes {
        let mut dependencies = Vec::with_capacity(node.dependencies.len());
        for dep in &node.dependencies {
            let id = match dep {
                Dependency::Successor { output } => {
                    successor(&mut w, graph, &members, &member_ids, op, *output)?
                }
                Dependency::Table { input } => {
                    let port = PortRef::input(op.id, *input);
                    let data_type = op
                        .input(*input)
                        .map(|p| p.data_type.as_str())
                        .unwrap_or_default();
                    match members.tables.get(&port) {
                        Some(index) => w.table(*index, data_type),
                        None => w.empty_table(data_type),
                    }
                }
                Dependency::Context => w.context(),
                Dependency::Literal(v) => w.literal(v),
            };
            dependencies.push(id);
        }
        let element = w.operators[&op.id];
        w.elements[element.index()].dependencies = dependencies;
    }

    let order = order::topological(&w.elements)?;
    let mut slot_of = vec![SlotId::new(0); w.elements.len()];
    for (slot, element) in order.iter().enumerate() {
        slot_of[element.index()] = SlotId::new(slot as u64);
    }

    let entry_element = w.operators[&members.entry];
    let entry_node = nodes
        .iter()
        .find(|(op, _)| op.id == members.entry)
        .map(|(_, n)| n)
        .ok_or_else(|| Error::Invariant(format!("vertex {} lost its entry", spec.name)))?;
    let entry_op = graph.get(members.entry)?;
    let input = input_adapter(entry_op, entry_node);

    let outputs = w
        .outputs
        .iter()
        .map(|(index, id)| OutputAdapter {
            index: *index,
            data_type: output_types.get(index).cloned().unwrap_or_default(),
            slot: slot_of[id.index()],
        })
        .collect();
    let tables = w
        .tables
        .iter()
        .filter_map(|(index, id)| match &w.elements[id.index()].kind {
            DependencyElement::DataTable { data_type, .. } => Some(TableAdapter {
                index: *index,
                data_type: data_type.clone(),
                slot: slot_of[id.index()],
            }),
            _ => None,
        })
        .collect();
    let context = w.context.map(|id| slot_of[id.index()]);
    let entry = slot_of[entry_element.index()];

    let mut elements: Vec<Option<Element>> = w.elements.into_iter().map(Some).collect();
    let mut slots = Vec::with_capacity(order.len());
    for (slot, id) in order.iter().enumerate() {
        let element = elements[id.index()]
            .take()
            .ok_or_else(|| Error::Invariant(format!("{} ordered twice", id)))?;
        debug!(vertex = %spec.name, slot, element = %element.kind, "slot");
        slots.push(SlotInit {
            slot: SlotId::new(slot as u64),
            element: element.id,
            arguments: element
                .dependencies
                .iter()
                .map(|d| slot_of[d.index()])
                .collect(),
            kind: element.kind,
        });
    }

    info!(
        vertex = %spec.name,
        operators = nodes.len(),
        slots = slots.len(),
        entry = %entry,
        "vertex fused"
    );
    Ok(FusedOperation {
        name: spec.name.clone(),
        slots,
        entry,
        input,
        outputs,
        tables,
        context,
    })
}

/// The element fed by output port `output` of `op`.
fn successor(
    w: &mut Wiring,
    graph: &OperatorGraph,
    members: &Members<'_>,
    member_ids: &BTreeSet<OperatorId>,
    op: &Operator,
    output: usize,
) -> Result<ElementId> {
    let mut targets = Vec::new();
    for (consumer, input) in graph.consumers(op.id, output) {
        if !member_ids.contains(&consumer) {
            continue;
        }
        let downstream = graph.get(consumer)?;
        if downstream.input(input).map(|p| p.unit) == Some(InputUnit::WholeInput) {
            return Err(Error::shape(
                downstream,
                format!("side input {} is fed from inside its own vertex", input),
            ));
        }
        if consumer == members.entry {
            return Err(Error::shape(
                downstream,
                "the vertex entry cannot consume records from inside the vertex",
            ));
        }
        let target = w
            .operators
            .get(&consumer)
            .copied()
            .ok_or_else(|| Error::Invariant(format!("{} has no element", consumer)))?;
        targets.push(target);
    }
    let port = PortRef::output(op.id, output);
    targets.extend(
        members
            .outputs
            .iter()
            .filter(|(p, _)| *p == port)
            .filter_map(|(_, index)| w.outputs.get(index).copied()),
    );
    targets.sort_unstable();
    targets.dedup();

    if targets.len() == 1 {
        return Ok(targets[0]);
    }
    let data_type = op
        .output(output)
        .map(|p| p.data_type.clone())
        .unwrap_or_default();
    let id = w.push(DependencyElement::Fanout { data_type });
    w.elements[id.index()].dependencies = targets;
    Ok(id)
}

fn input_adapter(entry: &Operator, node: &NodeInfo) -> InputAdapter {
    if let Some(a) = &node.aggregate {
        return InputAdapter::Aggregated {
            data_type: node.data_type.clone(),
            mapper: a.mapper.as_ref().map(|m| m.id),
            combiner: a.combiner.id,
            copier: a.copier.id,
        };
    }
    match node.unit.input {
        InputShape::Groups { .. } => InputAdapter::CoGroup {
            groups: entry
                .primary_inputs()
                .map(|(_, p)| p.data_type.clone())
                .collect(),
        },
        InputShape::Record | InputShape::Pair => InputAdapter::Record {
            data_type: node.data_type.clone(),
        },
    }
}
