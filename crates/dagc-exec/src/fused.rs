//! Live instances of fused vertices.

use std::sync::Arc;

use dagc_codegen::CompiledUnit;
use dagc_core::id::SlotId;
use dagc_core::table::DataTable;
use dagc_core::types::{Record, Value};
use dagc_fusion::{DependencyElement, FusedOperation, InputAdapter};

use crate::aggregate::AggregateDriver;
use crate::instance::{Binding, RuntimeContext, UnitInput, UnitInstance};
use crate::runtime::{ExecError, Result, Runtime};
use crate::sink::{Fanout, RecordSink};

/// What the runtime supplies at the vertex boundary.
#[derive(Default)]
pub struct VertexIo {
    /// One sink per vertex output, by output index.
    pub outputs: Vec<Arc<dyn RecordSink>>,
    /// One table per vertex side-table, by table index.
    pub tables: Vec<Arc<DataTable>>,
}

impl VertexIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.outputs.push(sink);
        self
    }

    pub fn table(mut self, table: DataTable) -> Self {
        self.tables.push(Arc::new(table));
        self
    }
}

/// Vertex input for one call.
#[derive(Debug, Clone)]
pub enum VertexInput {
    Record(Record),
    /// One list per co-grouped input, or the single group of an aggregate.
    Groups(Vec<Vec<Record>>),
}

enum SlotValue {
    Literal(Value),
    Unit(Arc<UnitInstance>),
    Aggregate(Arc<AggregateDriver>),
    Sink(Arc<dyn RecordSink>),
    Table(Arc<DataTable>),
    Context(Arc<RuntimeContext>),
}

impl SlotValue {
    fn label(&self) -> &'static str {
        match self {
            SlotValue::Literal(_) => "literal",
            SlotValue::Unit(_) => "unit",
            SlotValue::Aggregate(_) => "aggregate",
            SlotValue::Sink(_) => "sink",
            SlotValue::Table(_) => "table",
            SlotValue::Context(_) => "context",
        }
    }

    fn as_sink(&self) -> Option<Arc<dyn RecordSink>> {
        match self {
            SlotValue::Unit(u) => Some(Arc::clone(u) as Arc<dyn RecordSink>),
            SlotValue::Sink(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }
}

enum Entry {
    Unit(Arc<UnitInstance>),
    Aggregate(Arc<AggregateDriver>),
}

pub struct FusedInstance {
    name: String,
    input: InputAdapter,
    entry: Entry,
    context: Arc<RuntimeContext>,
}

impl FusedInstance {
    pub(crate) fn build(runtime: &Runtime, op: &FusedOperation, io: VertexIo) -> Result<Self> {
        let context = RuntimeContext::new(op.name.clone());
        let mut slots: Vec<SlotValue> = Vec::with_capacity(op.slots.len());

        for init in &op.slots {
            if init.slot.index() != slots.len() {
                return Err(ExecError::Invalid(format!(
                    "{}: {} initialized out of order",
                    op.name, init.slot
                )));
            }
            let value = match &init.kind {
                DependencyElement::Literal(v) => SlotValue::Literal(v.clone()),
                DependencyElement::Operator(node) => {
                    let bindings = bind(&slots, &init.arguments, &node.unit)?;
                    SlotValue::Unit(Arc::new(runtime.instantiate_unit(&node.unit, bindings)?))
                }
                DependencyElement::Aggregate(node) => {
                    let bindings = bind(&slots, &init.arguments, &node.unit)?;
                    SlotValue::Aggregate(Arc::new(runtime.instantiate_aggregate(node, bindings)?))
                }
                DependencyElement::Output { index, .. } => {
                    SlotValue::Sink(io.outputs.get(*index).cloned().ok_or_else(|| {
                        ExecError::Binding(format!("{}: no sink for output {}", op.name, index))
                    })?)
                }
                DependencyElement::DataTable { index, .. } => {
                    SlotValue::Table(io.tables.get(*index).cloned().ok_or_else(|| {
                        ExecError::Binding(format!("{}: no side-table {}", op.name, index))
                    })?)
                }
                DependencyElement::Context => SlotValue::Context(Arc::clone(&context)),
                DependencyElement::EmptyTable { data_type } => {
                    SlotValue::Table(Arc::new(DataTable::empty(data_type.clone())))
                }
                DependencyElement::Fanout { .. } => {
                    let targets = init
                        .arguments
                        .iter()
                        .map(|s| sink_at(&slots, *s))
                        .collect::<Result<Vec<_>>>()?;
                    SlotValue::Sink(Arc::new(Fanout::new(targets)))
                }
            };
            slots.push(value);
        }

        let entry = match slots.get(op.entry.index()) {
            Some(SlotValue::Unit(u)) => Entry::Unit(Arc::clone(u)),
            Some(SlotValue::Aggregate(a)) => Entry::Aggregate(Arc::clone(a)),
            _ => {
                return Err(ExecError::Invalid(format!(
                    "{}: entry {} is not a unit",
                    op.name, op.entry
                )))
            }
        };
        tracing::debug!(vertex = %op.name, slots = slots.len(), "fused operation instantiated");
        Ok(Self {
            name: op.name.clone(),
            input: op.input.clone(),
            entry,
            context,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    /// The aggregate driver of an aggregated vertex, for pre-shuffle combining.
    pub fn aggregate(&self) -> Option<&AggregateDriver> {
        match &self.entry {
            Entry::Aggregate(a) => Some(a),
            Entry::Unit(_) => None,
        }
    }

    /// Hand one vertex input to the entry slot.
    pub fn feed(&self, input: VertexInput) -> Result<()> {
        match (&self.input, &self.entry, input) {
            (InputAdapter::Record { .. }, Entry::Unit(u), VertexInput::Record(r)) => {
                u.run(UnitInput::Record(r)).map(drop)
            }
            (InputAdapter::CoGroup { groups }, Entry::Unit(u), VertexInput::Groups(g))
                if g.len() == groups.len() =>
            {
                u.run(UnitInput::Groups(g)).map(drop)
            }
            (InputAdapter::Aggregated { .. }, Entry::Aggregate(a), VertexInput::Groups(g))
                if g.len() == 1 =>
            {
                a.accept_group(g.into_iter().flatten())
            }
            (adapter, _, _) => Err(ExecError::Invalid(format!(
                "{}: input does not fit {:?}",
                self.name, adapter
            ))),
        }
    }
}

impl RecordSink for FusedInstance {
    fn accept(&self, record: Record) -> Result<()> {
        self.feed(VertexInput::Record(record))
    }
}

fn sink_at(slots: &[SlotValue], slot: SlotId) -> Result<Arc<dyn RecordSink>> {
    let value = slots
        .get(slot.index())
        .ok_or_else(|| ExecError::Invalid(format!("{} used before it is built", slot)))?;
    value
        .as_sink()
        .ok_or_else(|| ExecError::Binding(format!("{} is a {}, not a sink", slot, value.label())))
}

/// Construction bindings of `unit` from earlier slots.
fn bind(slots: &[SlotValue], arguments: &[SlotId], unit: &CompiledUnit) -> Result<Vec<Binding>> {
    arguments
        .iter()
        .map(|s| {
            let value = slots
                .get(s.index())
                .ok_or_else(|| ExecError::Invalid(format!("{} used before it is built", s)))?;
            Ok(match value {
                SlotValue::Literal(v) => Binding::Literal(v.clone()),
                SlotValue::Table(t) => Binding::Table(Arc::clone(t)),
                SlotValue::Context(c) => Binding::Context(Arc::clone(c)),
                SlotValue::Unit(_) | SlotValue::Sink(_) => Binding::Sink(sink_at(slots, *s)?),
                SlotValue::Aggregate(_) => {
                    return Err(ExecError::Binding(format!(
                        "{}: {} is an aggregate and cannot be a successor",
                        unit.name, s
                    )))
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_codegen::CompileSession;
    use dagc_core::config::CompilerConfig;
    use dagc_core::dag::{CoreKind, Grouping, Operator, OperatorKind, UserKind};
    use dagc_core::graph::OperatorGraph;
    use dagc_core::logic::{Invocation, LogicRegistry, MethodRef, MethodShape, ParameterShape, ReturnShape};
    use dagc_core::schema::{DataModel, DataType, ModelRegistry};
    use dagc_fusion::{fuse, VertexSpec};

    use crate::sink::Collector;

    fn int(r: &Record, i: usize) -> i32 {
        match r.get(i) {
            Value::Int(v) => *v,
            _ => 0,
        }
    }

    fn item(key: i64, value: i32) -> Record {
        Record {
            model: "Item".into(),
            values: vec![Value::Long(key), Value::Int(value)],
        }
    }

    fn logic() -> Arc<LogicRegistry> {
        let record = || ParameterShape::Record("Item".into());
        Arc::new(
            LogicRegistry::new()
                .with(
                    MethodRef::new("Ops", "bump"),
                    MethodShape::new("Ops", ReturnShape::Void)
                        .param(record())
                        .param(ParameterShape::Argument(DataType::Int)),
                    |call: &mut Invocation| {
                        let n = match call.argument(0) {
                            Value::Int(n) => *n,
                            _ => 0,
                        };
                        let r = call.record_mut(0).ok_or("no record")?;
                        let v = int(r, 1);
                        r.set(1, Value::Int(v + n));
                        Ok(Value::Null)
                    },
                )
                .with(
                    MethodRef::new("Ops", "level"),
                    MethodShape::new(
                        "Ops",
                        ReturnShape::Enum {
                            name: "Level".into(),
                            cases: vec!["LOW".into(), "HIGH".into()],
                        },
                    )
                    .param(record()),
                    |call: &mut Invocation| {
                        let r = call.record(0).ok_or("no record")?;
                        let case = if int(r, 1) >= 20 { "HIGH" } else { "LOW" };
                        Ok(Value::Text(case.into()))
                    },
                )
                .with(
                    MethodRef::new("Ops", "merge"),
                    MethodShape::new("Ops", ReturnShape::Void).param(record()).param(record()),
                    |call: &mut Invocation| {
                        let right = call.record(1).map(|r| int(r, 1)).ok_or("no right")?;
                        let left = call.record_mut(0).ok_or("no left")?;
                        let v = int(left, 1);
                        left.set(1, Value::Int(v + right));
                        Ok(Value::Null)
                    },
                ),
        )
    }

    fn session() -> CompileSession {
        let models = ModelRegistry::new().with(
            DataModel::plain("Item")
                .with("key", DataType::Long)
                .with("value", DataType::Int),
        );
        CompileSession::new(CompilerConfig::default(), logic(), Arc::new(models))
    }

    fn op(kind: OperatorKind, method: Option<&str>) -> dagc_core::dag::OperatorBuilder {
        let b = Operator::builder(kind);
        match method {
            Some(m) => b.method(MethodRef::new("Ops", m)),
            None => b,
        }
    }

    #[test]
    fn chain_routes_records_to_vertex_outputs() {
        let mut g = OperatorGraph::new();
        let entry = g.add(
            op(OperatorKind::Core(CoreKind::Checkpoint), None)
                .input("in", "Item")
                .output("out", "Item")
                .build(),
        );
        let mut last = entry;
        for _ in 0..2 {
            let b = g.add(
                op(OperatorKind::User(UserKind::Update), Some("bump"))
                    .input("in", "Item")
                    .output("out", "Item")
                    .argument("n", Value::Int(5))
                    .build(),
            );
            g.connect(last, 0, b, 0).unwrap();
            last = b;
        }
        let br = g.add(
            op(OperatorKind::User(UserKind::Branch), Some("level"))
                .input("in", "Item")
                .output("low", "Item")
                .output("high", "Item")
                .build(),
        );
        g.connect(last, 0, br, 0).unwrap();

        let mut spec = VertexSpec::new("v", entry).member(br).output(br, 0, 0).output(br, 1, 1);
        for id in g.operators().map(|o| o.id).collect::<Vec<_>>() {
            spec = spec.member(id);
        }
        let s = session();
        let fused = fuse(&s, &g, &spec).unwrap();

        let (low, high) = (Collector::new(), Collector::new());
        let runtime = Runtime::new(logic());
        let io = VertexIo::new().output(low.clone()).output(high.clone());
        let vertex = runtime.instantiate(&fused, io).unwrap();
        // both bumps share one loaded unit
        assert_eq!(runtime.loaded(), 3);

        vertex.feed(VertexInput::Record(item(1, 5))).unwrap();
        vertex.feed(VertexInput::Record(item(2, 12))).unwrap();
        assert_eq!(low.records(), vec![item(1, 15)]);
        assert_eq!(high.records(), vec![item(2, 22)]);
        assert!(vertex.aggregate().is_none());
    }

    #[test]
    fn missing_outputs_are_binding_errors() {
        let mut g = OperatorGraph::new();
        let cp = g.add(
            op(OperatorKind::Core(CoreKind::Checkpoint), None)
                .input("in", "Item")
                .output("out", "Item")
                .build(),
        );
        let fused = fuse(&session(), &g, &VertexSpec::new("v", cp).output(cp, 0, 0)).unwrap();
        let err = Runtime::new(logic())
            .instantiate(&fused, VertexIo::new())
            .err()
            .unwrap();
        assert!(matches!(err, ExecError::Binding(_)));
    }

    #[test]
    fn fold_vertex_aggregates_each_group() {
        let mut g = OperatorGraph::new();
        let fold = g.add(
            op(OperatorKind::User(UserKind::Fold), Some("merge"))
                .group_input("in", "Item", Grouping::by(["key"]))
                .output("out", "Item")
                .build(),
        );
        let fused = fuse(&session(), &g, &VertexSpec::new("f", fold).output(fold, 0, 0)).unwrap();
        let out = Collector::new();
        let vertex = Runtime::new(logic())
            .instantiate(&fused, VertexIo::new().output(out.clone()))
            .unwrap();

        let group = vec![item(7, 1), item(7, 2), item(7, 3)];
        vertex.feed(VertexInput::Groups(vec![group.clone()])).unwrap();
        assert_eq!(out.records(), vec![item(7, 6)]);

        // pre-shuffle partials fold to the same result
        let driver = vertex.aggregate().unwrap();
        let partial = driver.pre_aggregate(group).unwrap().unwrap();
        assert_eq!(partial, item(7, 6));
        // aggregated vertices take groups only
        assert!(vertex.feed(VertexInput::Record(item(7, 1))).is_err());
    }
}
