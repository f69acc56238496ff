//! Constructed units: a loaded unit plus its construction parameters.

use std::fmt;
use std::sync::{Arc, Mutex};

use dagc_analyze::logging::LogLevel;
use dagc_codegen::ir::{InputShape, Local};
use dagc_codegen::Parameter;
use dagc_core::table::DataTable;
use dagc_core::types::{Record, Value};

use crate::interpreter::{self, Frame, LoadedUnit};
use crate::runtime::{ExecError, Result};
use crate::sink::RecordSink;

/// Runtime context handed to logging units.
#[derive(Debug)]
pub struct RuntimeContext {
    pub vertex: String,
    messages: Mutex<Vec<(LogLevel, String)>>,
}

impl RuntimeContext {
    pub fn new(vertex: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            vertex: vertex.into(),
            messages: Mutex::new(vec![]),
        })
    }

    pub fn log(&self, level: LogLevel, message: String) {
        interpreter::log(level, &self.vertex, &message);
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((level, message));
    }

    /// Everything logged through this context, oldest first.
    pub fn messages(&self) -> Vec<(LogLevel, String)> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Value of one construction parameter.
#[derive(Clone)]
pub enum Binding {
    Sink(Arc<dyn RecordSink>),
    Table(Arc<DataTable>),
    Context(Arc<RuntimeContext>),
    Literal(Value),
}

impl Binding {
    pub fn label(&self) -> &'static str {
        match self {
            Binding::Sink(_) => "sink",
            Binding::Table(_) => "table",
            Binding::Context(_) => "context",
            Binding::Literal(_) => "literal",
        }
    }

    fn fits(&self, p: &Parameter) -> bool {
        matches!(
            (self, p),
            (Binding::Sink(_), Parameter::Sink { .. })
                | (Binding::Table(_), Parameter::Table { .. })
                | (Binding::Context(_), Parameter::Context)
                | (Binding::Literal(_), Parameter::Argument { .. })
        )
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Literal(v) => write!(f, "Literal({:?})", v),
            Binding::Table(t) => write!(f, "Table({}, {} rows)", t.model, t.len()),
            other => f.write_str(other.label()),
        }
    }
}

/// One call's input.
#[derive(Debug, Clone)]
pub enum UnitInput {
    Record(Record),
    Pair(Record, Record),
    Groups(Vec<Vec<Record>>),
}

impl UnitInput {
    fn label(&self) -> &'static str {
        match self {
            UnitInput::Record(_) => "a record",
            UnitInput::Pair(..) => "a pair",
            UnitInput::Groups(_) => "groups",
        }
    }
}

#[derive(Debug)]
pub struct UnitInstance {
    loaded: Arc<LoadedUnit>,
    bindings: Vec<Binding>,
}

impl UnitInstance {
    /// Checks that `bindings` matches the unit's parameters one for one.
    pub fn new(loaded: Arc<LoadedUnit>, bindings: Vec<Binding>) -> Result<Self> {
        let params = &loaded.unit.parameters;
        if params.len() != bindings.len() {
            return Err(ExecError::Binding(format!(
                "{} takes {} parameter(s), got {}",
                loaded.name(),
                params.len(),
                bindings.len()
            )));
        }
        if let Some((i, (b, p))) = bindings
            .iter()
            .zip(params)
            .enumerate()
            .find(|(_, (b, p))| !b.fits(p))
        {
            return Err(ExecError::Binding(format!(
                "{}: parameter ${} is {:?}, got a {}",
                loaded.name(),
                i,
                p,
                b.label()
            )));
        }
        Ok(Self { loaded, bindings })
    }

    pub fn name(&self) -> &str {
        self.loaded.name()
    }

    pub fn loaded(&self) -> &Arc<LoadedUnit> {
        &self.loaded
    }

    pub fn run(&self, input: UnitInput) -> Result<Option<Record>> {
        let mut frame = Frame::new(&self.loaded, &self.bindings);
        match (self.loaded.unit.input, input) {
            (InputShape::Record, UnitInput::Record(r)) => frame.bind_record(Local(0), r)?,
            (InputShape::Pair, UnitInput::Pair(l, r)) => {
                frame.bind_record(Local(0), l)?;
                frame.bind_record(Local(1), r)?;
            }
            (InputShape::Groups { count }, UnitInput::Groups(g)) if g.len() == count => {
                frame.bind_groups(g)
            }
            (shape, input) => {
                return Err(ExecError::Invalid(format!(
                    "{} takes {:?}, got {}",
                    self.name(),
                    shape,
                    input.label()
                )))
            }
        }
        frame.run()
    }

    /// Run a unit that must hand back a record (mapper, combiner, copier).
    pub fn run_returning(&self, input: UnitInput) -> Result<Record> {
        self.run(input)?
            .ok_or_else(|| ExecError::Invalid(format!("{} returned no record", self.name())))
    }
}

impl RecordSink for UnitInstance {
    fn accept(&self, record: Record) -> Result<()> {
        self.run(UnitInput::Record(record)).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_codegen::ir::{CallArg, Expr, Stmt};
    use dagc_codegen::unit::{UnitBuilder, UnitRole};
    use dagc_codegen::UnitBackend;
    use dagc_core::hash::hash_values;
    use dagc_core::id::UnitId;
    use dagc_core::logic::{Invocation, LogicRegistry, MethodRef, MethodShape, ParameterShape, ReturnShape};
    use dagc_core::schema::DataType;

    use crate::interpreter::Interpreter;
    use crate::sink::Collector;

    fn item(key: i64, value: i32) -> Record {
        Record {
            model: "Item".into(),
            values: vec![Value::Long(key), Value::Int(value)],
        }
    }

    fn logic() -> Arc<LogicRegistry> {
        Arc::new(
            LogicRegistry::new()
                .with(
                    MethodRef::new("Ops", "add"),
                    MethodShape::new("Ops", ReturnShape::Void)
                        .param(ParameterShape::Record("Item".into()))
                        .param(ParameterShape::Argument(DataType::Int)),
                    |call: &mut Invocation| {
                        let n = match call.argument(0) {
                            Value::Int(n) => *n,
                            _ => 0,
                        };
                        let r = call.record_mut(0).ok_or("no record")?;
                        let v = match r.get(1) {
                            Value::Int(v) => *v,
                            _ => 0,
                        };
                        r.set(1, Value::Int(v + n));
                        Ok(Value::Null)
                    },
                )
                .with(
                    MethodRef::new("Ops", "twice"),
                    MethodShape::new("Ops", ReturnShape::Void)
                        .param(ParameterShape::Record("Item".into()))
                        .param(ParameterShape::Result("Item".into())),
                    |call: &mut Invocation| {
                        let r = call.record(0).cloned().ok_or("no record")?;
                        call.emit(0, r.clone());
                        call.emit(0, r);
                        Ok(Value::Null)
                    },
                )
                .with(
                    MethodRef::new("Ops", "fail"),
                    MethodShape::new("Ops", ReturnShape::Void),
                    |_: &mut Invocation| Err("boom".to_string()),
                ),
        )
    }

    fn load(b: UnitBuilder) -> Arc<LoadedUnit> {
        let unit = b.finish().seal(UnitId::new(1), "u".into(), hash_values([&Value::Int(0)]));
        Interpreter::new(logic()).lower(&unit).unwrap()
    }

    #[test]
    fn update_mutates_then_emits() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let out = b.parameter(Parameter::Sink {
            output: 0,
            data_type: "Item".into(),
        });
        let n = b.parameter(Parameter::Argument {
            index: 0,
            data_type: DataType::Int,
        });
        let m = b.method(&MethodRef::new("Ops", "add"));
        let ignored = b.local();
        b.push(Stmt::Let {
            local: ignored,
            value: Expr::Invoke {
                method: m,
                args: vec![CallArg::Record(Local(0)), CallArg::Argument(Expr::Dependency(n))],
            },
        });
        b.push(Stmt::Emit { sink: out, value: Local(0) });

        let sink = Collector::new();
        let unit = UnitInstance::new(
            load(b),
            vec![Binding::Sink(sink.clone()), Binding::Literal(Value::Int(5))],
        )
        .unwrap();
        unit.accept(item(1, 10)).unwrap();
        assert_eq!(sink.records(), vec![item(1, 15)]);
    }

    #[test]
    fn method_results_reach_their_sink() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let out = b.parameter(Parameter::Sink {
            output: 0,
            data_type: "Item".into(),
        });
        let m = b.method(&MethodRef::new("Ops", "twice"));
        let ignored = b.local();
        b.push(Stmt::Let {
            local: ignored,
            value: Expr::Invoke {
                method: m,
                args: vec![CallArg::Record(Local(0)), CallArg::Result(out)],
            },
        });
        let sink = Collector::new();
        let unit = UnitInstance::new(load(b), vec![Binding::Sink(sink.clone())]).unwrap();
        unit.accept(item(2, 1)).unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn bindings_must_match_parameters() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        b.parameter(Parameter::Context);
        let err = UnitInstance::new(load(b), vec![Binding::Literal(Value::Int(1))]).unwrap_err();
        assert!(matches!(err, ExecError::Binding(_)));

        let b = UnitBuilder::operation(InputShape::Record);
        let err = UnitInstance::new(load(b), vec![Binding::Literal(Value::Int(1))]).unwrap_err();
        assert!(matches!(err, ExecError::Binding(ref m) if m.contains("0 parameter")));
    }

    #[test]
    fn input_shape_is_checked() {
        let b = UnitBuilder::new(UnitRole::Combiner, InputShape::Pair);
        let unit = UnitInstance::new(load(b), vec![]).unwrap();
        assert!(unit.run(UnitInput::Record(item(1, 1))).is_err());
        assert_eq!(unit.run(UnitInput::Pair(item(1, 1), item(1, 2))).unwrap(), None);
    }

    #[test]
    fn method_failures_name_the_method() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let m = b.method(&MethodRef::new("Ops", "fail"));
        let ignored = b.local();
        b.push(Stmt::Let {
            local: ignored,
            value: Expr::Invoke { method: m, args: vec![] },
        });
        let unit = UnitInstance::new(load(b), vec![]).unwrap();
        let err = unit.run(UnitInput::Record(item(1, 1))).unwrap_err();
        assert!(matches!(err, ExecError::Method { ref method, ref message } if method == "Ops#fail" && message == "boom"));
    }

    #[test]
    fn switch_routes_by_case_name() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let low = b.parameter(Parameter::Sink {
            output: 0,
            data_type: "Item".into(),
        });
        let high = b.parameter(Parameter::Sink {
            output: 1,
            data_type: "Item".into(),
        });
        b.push(Stmt::Switch {
            on: Expr::Literal(Value::Text("HIGH".into())),
            cases: vec![
                ("LOW".into(), vec![Stmt::Emit { sink: low, value: Local(0) }]),
                ("HIGH".into(), vec![Stmt::Emit { sink: high, value: Local(0) }]),
            ],
            default: None,
        });
        let (l, h) = (Collector::new(), Collector::new());
        let unit = UnitInstance::new(load(b), vec![Binding::Sink(l.clone()), Binding::Sink(h.clone())]).unwrap();
        unit.accept(item(1, 1)).unwrap();
        assert!(l.is_empty());
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn switch_without_default_rejects_unknown_cases() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let only = b.parameter(Parameter::Sink {
            output: 0,
            data_type: "Item".into(),
        });
        b.push(Stmt::Switch {
            on: Expr::Literal(Value::Text("MIDDLE".into())),
            cases: vec![("LOW".into(), vec![Stmt::Emit { sink: only, value: Local(0) }])],
            default: None,
        });
        let sink = Collector::new();
        let unit = UnitInstance::new(load(b), vec![Binding::Sink(sink.clone())]).unwrap();
        let err = unit.accept(item(1, 1)).unwrap_err();
        assert!(matches!(err, ExecError::Invalid(ref m) if m.contains("MIDDLE")));
        assert!(sink.is_empty());
    }

    #[test]
    fn log_goes_through_the_context() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let ctx = b.parameter(Parameter::Context);
        b.push(Stmt::Log {
            level: LogLevel::Warn,
            context: ctx,
            message: Expr::Literal(Value::Text("hello".into())),
        });
        let context = RuntimeContext::new("v0");
        let unit = UnitInstance::new(load(b), vec![Binding::Context(context.clone())]).unwrap();
        unit.accept(item(1, 1)).unwrap();
        assert_eq!(context.messages(), vec![(LogLevel::Warn, "hello".to_string())]);
    }
}
