//! Tree-walking evaluation of unit bodies.
//!
//! Locals hold [`Datum`]s. Records passed to user methods are moved into the
//! [`Invocation`] and written back afterwards, so a method's mutations are
//! visible to the statements that follow the call. Enumerated returns are
//! matched by case name: a method returning an enum yields `Value::Text`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use dagc_analyze::logging::LogLevel;
use dagc_codegen::ir::{CallArg, DepSlot, Expr, Local, MethodSlot, Stmt};
use dagc_codegen::{CompiledUnit, UnitBackend};
use dagc_core::logic::{GroupInput, Invocation, LogicResolver, UserMethod};
use dagc_core::schema::Aggregation;
use dagc_core::table::DataTable;
use dagc_core::types::{Record, Value};

use crate::instance::{Binding, RuntimeContext};
use crate::runtime::{ExecError, Result};
use crate::sink::RecordSink;

/// A unit with its methods bound.
pub struct LoadedUnit {
    pub unit: Arc<CompiledUnit>,
    methods: Vec<Arc<dyn UserMethod>>,
}

impl LoadedUnit {
    pub fn name(&self) -> &str {
        &self.unit.name
    }
}

impl fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("unit", &self.unit.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Backend that loads units for in-process evaluation.
pub struct Interpreter {
    logic: Arc<dyn LogicResolver>,
}

impl Interpreter {
    pub fn new(logic: Arc<dyn LogicResolver>) -> Self {
        Self { logic }
    }
}

impl UnitBackend for Interpreter {
    type Output = Arc<LoadedUnit>;
    type Error = ExecError;

    fn lower(&self, unit: &CompiledUnit) -> Result<Arc<LoadedUnit>> {
        let methods = unit
            .methods
            .iter()
            .map(|m| self.logic.bind(m))
            .collect::<dagc_core::error::Result<Vec<_>>>()?;
        Ok(Arc::new(LoadedUnit {
            unit: Arc::new(unit.clone()),
            methods,
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Datum {
    #[default]
    Unset,
    Value(Value),
    Record(Record),
    Records(Vec<Record>),
}

impl Datum {
    fn is_unset(&self) -> bool {
        matches!(self, Datum::Unset | Datum::Value(Value::Null))
    }

    fn into_value(self) -> Value {
        match self {
            Datum::Value(v) => v,
            _ => Value::Null,
        }
    }

    fn into_records(self) -> Result<Vec<Record>> {
        match self {
            Datum::Records(rs) => Ok(rs),
            Datum::Unset => Ok(vec![]),
            other => Err(ExecError::Invalid(format!("expected records, found {:?}", other))),
        }
    }
}

enum Flow {
    Next,
    Done(Option<Record>),
}

/// State of one call of a unit.
pub(crate) struct Frame<'a> {
    unit: &'a LoadedUnit,
    bindings: &'a [Binding],
    locals: Vec<Datum>,
    groups: Vec<Vec<Record>>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(unit: &'a LoadedUnit, bindings: &'a [Binding]) -> Self {
        Self {
            unit,
            bindings,
            locals: vec![Datum::Unset; unit.unit.locals],
            groups: vec![],
        }
    }

    pub(crate) fn bind_record(&mut self, local: Local, record: Record) -> Result<()> {
        self.set(local, Datum::Record(record))
    }

    pub(crate) fn bind_groups(&mut self, groups: Vec<Vec<Record>>) {
        self.groups = groups;
    }

    /// Run the body; yields the record of a `Return(Some(..))`.
    pub(crate) fn run(mut self) -> Result<Option<Record>> {
        let unit = self.unit;
        match self.block(&unit.unit.body)? {
            Flow::Done(r) => Ok(r),
            Flow::Next => Ok(None),
        }
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for s in stmts {
            if let Flow::Done(r) = self.stmt(s)? {
                return Ok(Flow::Done(r));
            }
        }
        Ok(Flow::Next)
    }

    fn stmt(&mut self, s: &Stmt) -> Result<Flow> {
        match s {
            Stmt::Let { local, value } => {
                let v = self.eval(value)?;
                self.set(*local, v)?;
            }
            Stmt::SetProperty {
                record,
                index,
                value,
            } => {
                let v = self.eval(value)?.into_value();
                self.record_mut(*record)?.set(*index, v);
            }
            Stmt::CopyProperties { from, to, pairs } => {
                let src = self.record(*from)?;
                let values: Vec<(usize, Value)> =
                    pairs.iter().map(|(s, d)| (*d, src.get(*s).clone())).collect();
                let dst = self.record_mut(*to)?;
                for (d, v) in values {
                    dst.set(d, v);
                }
            }
            Stmt::Aggregate {
                target,
                index,
                source,
                policy,
            } => {
                let v = self.eval(source)?.into_value();
                if !v.is_null() {
                    let rec = self.record_mut(*target)?;
                    let folded = fold_value(*policy, rec.get(*index), v)?;
                    rec.set(*index, folded);
                }
            }
            Stmt::Emit { sink, value } => {
                let r = self.record(*value)?.clone();
                self.sink(*sink)?.accept(r)?;
            }
            Stmt::Switch { on, cases, default } => {
                let v = self.eval(on)?.into_value();
                let arm = v
                    .as_text()
                    .and_then(|case| cases.iter().find(|(name, _)| name == case))
                    .map(|(_, body)| body)
                    .or(default.as_ref())
                    .ok_or_else(|| {
                        ExecError::Invalid(format!(
                            "{}: no arm for selector case {}",
                            self.unit.unit.name, v
                        ))
                    })?;
                return self.block(arm);
            }
            Stmt::IfNull {
                value,
                then,
                otherwise,
            } => {
                let unset = self.eval(value)?.is_unset();
                return self.block(if unset { then } else { otherwise });
            }
            Stmt::ForEach {
                local,
                source,
                body,
            } => {
                for r in self.eval(source)?.into_records()? {
                    self.set(*local, Datum::Record(r))?;
                    if let Flow::Done(r) = self.block(body)? {
                        return Ok(Flow::Done(r));
                    }
                }
            }
            Stmt::Log {
                level,
                context,
                message,
            } => {
                let message = match self.eval(message)?.into_value() {
                    Value::Text(s) => s,
                    other => other.to_string(),
                };
                let ctx = Arc::clone(self.context(*context)?);
                ctx.log(*level, message);
            }
            Stmt::Return(local) => {
                let r = match local {
                    Some(l) => Some(self.take_record(*l)?),
                    None => None,
                };
                return Ok(Flow::Done(r));
            }
        }
        Ok(Flow::Next)
    }

    fn eval(&mut self, e: &Expr) -> Result<Datum> {
        Ok(match e {
            Expr::Local(l) => self.local(*l)?.clone(),
            Expr::Literal(v) => Datum::Value(v.clone()),
            Expr::Dependency(slot) => Datum::Value(self.literal(*slot)?.clone()),
            Expr::Property { record, index } => Datum::Value(self.record(*record)?.get(*index).clone()),
            Expr::Widen(inner) => Datum::Value(self.eval(inner)?.into_value().widen()),
            Expr::NewRecord { model, width } => Datum::Record(Record::new(model, *width)),
            Expr::Copy(l) => Datum::Record(self.record(*l)?.clone()),
            Expr::Invoke { method, args } => self.invoke(*method, args)?,
            Expr::Lookup { table, key } => {
                let key = key
                    .iter()
                    .map(|k| self.eval(k).map(Datum::into_value))
                    .collect::<Result<Vec<_>>>()?;
                Datum::Records(self.table(*table)?.find(&key).to_vec())
            }
            Expr::Group(i) => Datum::Records(
                self.groups
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| ExecError::Invalid(format!("no group {} in cursor", i)))?,
            ),
            Expr::Select {
                candidates,
                subject,
                selection,
                args,
            } => self.select(*candidates, *subject, *selection, args)?,
        })
    }

    fn invoke(&mut self, method: MethodSlot, args: &[CallArg]) -> Result<Datum> {
        let mut call = Invocation::default();
        let mut written_back = Vec::new();
        let mut sinks = Vec::new();
        for a in args {
            match a {
                CallArg::Record(l) => {
                    call.records.push(self.take_record(*l)?);
                    written_back.push(*l);
                }
                CallArg::Group {
                    records,
                    reiterable,
                } => {
                    let records = self.eval(records)?.into_records()?;
                    call.groups.push(GroupInput {
                        records,
                        reiterable: *reiterable,
                    });
                }
                CallArg::Table(slot) => call.tables.push(Arc::clone(self.table(*slot)?)),
                CallArg::Argument(e) => {
                    let v = self.eval(e)?.into_value();
                    call.arguments.push(v);
                }
                CallArg::Result(slot) => sinks.push(Arc::clone(self.sink(*slot)?)),
            }
        }
        call.results = vec![Vec::new(); sinks.len()];

        let value = self.call(method, &mut call)?;
        if call.records.len() != written_back.len() {
            return Err(self.method_error(method, "record arguments were not handed back"));
        }
        for (l, r) in written_back.into_iter().zip(call.records.drain(..)) {
            self.set(l, Datum::Record(r))?;
        }
        if call.results.len() > sinks.len() {
            return Err(self.method_error(method, "emitted to an undeclared result"));
        }
        for (sink, records) in sinks.iter().zip(call.results.drain(..)) {
            for r in records {
                sink.accept(r)?;
            }
        }
        Ok(match call.returned.take() {
            Some(r) => Datum::Record(r),
            None => Datum::Value(value),
        })
    }

    fn select(
        &mut self,
        candidates: Local,
        subject: Local,
        selection: Option<MethodSlot>,
        args: &[Expr],
    ) -> Result<Datum> {
        let list = self.local(candidates)?.clone().into_records()?;
        let Some(method) = selection else {
            return Ok(list.into_iter().next().map_or(Datum::Unset, Datum::Record));
        };

        let arguments = args
            .iter()
            .map(|e| self.eval(e).map(Datum::into_value))
            .collect::<Result<Vec<_>>>()?;
        let mut call = Invocation {
            records: vec![self.take_record(subject)?],
            groups: vec![GroupInput {
                records: list,
                reiterable: true,
            }],
            arguments,
            ..Invocation::default()
        };
        let picked = self.call(method, &mut call)?;
        let Some(r) = call.records.pop() else {
            return Err(self.method_error(method, "record arguments were not handed back"));
        };
        self.set(subject, Datum::Record(r))?;

        let mut list = call.groups.pop().map(|g| g.records).unwrap_or_default();
        Ok(match picked.as_long() {
            Some(i) if i >= 0 && (i as usize) < list.len() => Datum::Record(list.swap_remove(i as usize)),
            _ => Datum::Unset,
        })
    }

    fn call(&self, method: MethodSlot, call: &mut Invocation) -> Result<Value> {
        let f = self
            .unit
            .methods
            .get(method.0)
            .ok_or_else(|| ExecError::Invalid(format!("no method #{} in {}", method.0, self.unit.name())))?;
        f.invoke(call).map_err(|message| self.method_error(method, &message))
    }

    fn method_error(&self, method: MethodSlot, message: &str) -> ExecError {
        let name = self
            .unit
            .unit
            .methods
            .get(method.0)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("#{}", method.0));
        ExecError::Method {
            method: name,
            message: message.to_string(),
        }
    }

    fn local(&self, l: Local) -> Result<&Datum> {
        self.locals
            .get(l.0)
            .ok_or_else(|| ExecError::Invalid(format!("local l{} out of range", l.0)))
    }

    fn set(&mut self, l: Local, d: Datum) -> Result<()> {
        let slot = self
            .locals
            .get_mut(l.0)
            .ok_or_else(|| ExecError::Invalid(format!("local l{} out of range", l.0)))?;
        *slot = d;
        Ok(())
    }

    fn record(&self, l: Local) -> Result<&Record> {
        match self.local(l)? {
            Datum::Record(r) => Ok(r),
            other => Err(ExecError::Invalid(format!("l{} holds {:?}, not a record", l.0, other))),
        }
    }

    fn record_mut(&mut self, l: Local) -> Result<&mut Record> {
        match self.locals.get_mut(l.0) {
            Some(Datum::Record(r)) => Ok(r),
            _ => Err(ExecError::Invalid(format!("l{} holds no record", l.0))),
        }
    }

    fn take_record(&mut self, l: Local) -> Result<Record> {
        self.record(l)?;
        match self.locals.get_mut(l.0).map(std::mem::take) {
            Some(Datum::Record(r)) => Ok(r),
            _ => Err(ExecError::Invalid(format!("l{} holds no record", l.0))),
        }
    }

    fn binding(&self, slot: DepSlot) -> Result<&'a Binding> {
        self.bindings
            .get(slot.0)
            .ok_or_else(|| ExecError::Binding(format!("{}: no parameter ${}", self.unit.name(), slot.0)))
    }

    fn sink(&self, slot: DepSlot) -> Result<&'a Arc<dyn RecordSink>> {
        match self.binding(slot)? {
            Binding::Sink(s) => Ok(s),
            other => Err(self.mismatch(slot, "sink", other)),
        }
    }

    fn table(&self, slot: DepSlot) -> Result<&'a Arc<DataTable>> {
        match self.binding(slot)? {
            Binding::Table(t) => Ok(t),
            other => Err(self.mismatch(slot, "table", other)),
        }
    }

    fn context(&self, slot: DepSlot) -> Result<&'a Arc<RuntimeContext>> {
        match self.binding(slot)? {
            Binding::Context(c) => Ok(c),
            other => Err(self.mismatch(slot, "context", other)),
        }
    }

    fn literal(&self, slot: DepSlot) -> Result<&'a Value> {
        match self.binding(slot)? {
            Binding::Literal(v) => Ok(v),
            other => Err(self.mismatch(slot, "literal", other)),
        }
    }

    fn mismatch(&self, slot: DepSlot, wanted: &str, got: &Binding) -> ExecError {
        ExecError::Binding(format!(
            "{}: parameter ${} is a {}, expected a {}",
            self.unit.name(),
            slot.0,
            got.label(),
            wanted
        ))
    }
}

/// Fold one non-null value into an accumulator property.
fn fold_value(policy: Aggregation, current: &Value, next: Value) -> Result<Value> {
    Ok(match policy {
        Aggregation::Any => current.clone(),
        Aggregation::Sum | Aggregation::Count => current
            .add(&next)
            .ok_or_else(|| ExecError::Invalid(format!("cannot add {} and {}", current, next)))?,
        Aggregation::Max => pick(current, next, Ordering::Greater),
        Aggregation::Min => pick(current, next, Ordering::Less),
    })
}

fn pick(current: &Value, next: Value, wins: Ordering) -> Value {
    if current.is_null() || next.compare(current) == wins {
        next
    } else {
        current.clone()
    }
}

pub(crate) fn log(level: LogLevel, vertex: &str, message: &str) {
    match level {
        LogLevel::Error => tracing::error!(target: "dagc::operator", vertex, "{}", message),
        LogLevel::Warn => tracing::warn!(target: "dagc::operator", vertex, "{}", message),
        LogLevel::Info => tracing::info!(target: "dagc::operator", vertex, "{}", message),
        LogLevel::Debug => tracing::debug!(target: "dagc::operator", vertex, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_policies() {
        let five = Value::Long(5);
        // ANY keeps the left side, unset or not
        assert_eq!(fold_value(Aggregation::Any, &Value::Null, five.clone()).unwrap(), Value::Null);
        assert_eq!(
            fold_value(Aggregation::Any, &Value::Long(1), five.clone()).unwrap(),
            Value::Long(1)
        );
        assert_eq!(
            fold_value(Aggregation::Sum, &Value::Long(1), five.clone()).unwrap(),
            Value::Long(6)
        );
        assert_eq!(
            fold_value(Aggregation::Max, &Value::Long(9), five.clone()).unwrap(),
            Value::Long(9)
        );
        assert_eq!(fold_value(Aggregation::Min, &Value::Long(9), five.clone()).unwrap(), five);
        assert!(fold_value(Aggregation::Sum, &Value::Text("x".into()), five).is_err());
    }

    #[test]
    fn unset_values_count_as_null() {
        assert!(Datum::Unset.is_unset());
        assert!(Datum::Value(Value::Null).is_unset());
        assert!(!Datum::Record(Record::new("M", 0)).is_unset());
    }
}
