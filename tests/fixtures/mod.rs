//! Shared models, user logic and records for the scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use dagc_codegen::CompileSession;
use dagc_core::config::CompilerConfig;
use dagc_core::logic::{Invocation, LogicRegistry, MethodRef, MethodShape, ParameterShape, ReturnShape};
use dagc_core::schema::{DataModel, DataType, ModelRegistry};
use dagc_core::types::{Record, Value};

pub fn models() -> ModelRegistry {
    let declared: Vec<DataModel> =
        serde_yaml::from_str(include_str!("models.yaml")).expect("models.yaml parses");
    let mut registry = ModelRegistry::new();
    for m in declared {
        registry.register(m);
    }
    registry
}

pub fn int(r: &Record, index: usize) -> i32 {
    match r.get(index) {
        Value::Int(v) => *v,
        _ => 0,
    }
}

fn item_param() -> ParameterShape {
    ParameterShape::Record("Item".into())
}

/// `Ops#grade` sorts items into A (< 10), B (< 100) and C; negative values
/// get an undeclared case. `Ops#bump` adds its argument to `value`.
/// `Ops#merge` folds the right item's value into the left one.
///
/// Master-join helpers: `Ops#pick` chooses the last candidate master, none
/// for a zero value and an out-of-range index from 1000 up. `Ops#stamp`
/// adds a hundred times the master key to the item value. `Ops#presence`
/// answers FOUND or ORPHAN depending on whether the master is set.
/// `Ops#weigh` folds `right.value * weight` into the left item when the
/// right item's key has a master in the side-table.
pub fn logic() -> Arc<LogicRegistry> {
    Arc::new(
        LogicRegistry::new()
            .with(
                MethodRef::new("Ops", "grade"),
                MethodShape::new(
                    "Ops",
                    ReturnShape::Enum {
                        name: "Grade".into(),
                        cases: vec!["A".into(), "B".into(), "C".into()],
                    },
                )
                .param(item_param()),
                |call: &mut Invocation| {
                    let v = int(call.record(0).ok_or("missing item")?, 1);
                    let case = match v {
                        v if v < 0 => "UNDECLARED",
                        v if v < 10 => "A",
                        v if v < 100 => "B",
                        _ => "C",
                    };
                    Ok(Value::Text(case.into()))
                },
            )
            .with(
                MethodRef::new("Ops", "bump"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(item_param())
                    .param(ParameterShape::Argument(DataType::Int)),
                |call: &mut Invocation| {
                    let n = match call.argument(0) {
                        Value::Int(n) => *n,
                        _ => 0,
                    };
                    let r = call.record_mut(0).ok_or("missing item")?;
                    let v = int(r, 1);
                    r.set(1, Value::Int(v + n));
                    Ok(Value::Null)
                },
            )
            .with(
                MethodRef::new("Ops", "merge"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(item_param())
                    .param(item_param()),
                |call: &mut Invocation| {
                    let right = int(call.record(1).ok_or("missing right")?, 1);
                    let left = call.record_mut(0).ok_or("missing left")?;
                    let v = int(left, 1);
                    left.set(1, Value::Int(v + right));
                    Ok(Value::Null)
                },
            )
            .with(
                MethodRef::new("Ops", "pick"),
                MethodShape::new("Ops", ReturnShape::Value(DataType::Int))
                    .param(ParameterShape::Group("Master".into()))
                    .param(item_param()),
                |call: &mut Invocation| {
                    let candidates = call.groups.first().map_or(0, |g| g.records.len());
                    Ok(match int(call.record(0).ok_or("missing item")?, 1) {
                        0 => Value::Null,
                        v if v >= 1000 => Value::Int(candidates as i32 + 5),
                        _ => Value::Int(candidates as i32 - 1),
                    })
                },
            )
            .with(
                MethodRef::new("Ops", "stamp"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(ParameterShape::Record("Master".into()))
                    .param(item_param()),
                |call: &mut Invocation| {
                    let key = call.record(0).ok_or("missing master")?.get(0).as_long();
                    let tx = call.record_mut(1).ok_or("missing item")?;
                    let v = int(tx, 1);
                    tx.set(1, Value::Int(v + 100 * key.unwrap_or_default() as i32));
                    Ok(Value::Null)
                },
            )
            .with(
                MethodRef::new("Ops", "presence"),
                MethodShape::new(
                    "Ops",
                    ReturnShape::Enum {
                        name: "Presence".into(),
                        cases: vec!["FOUND".into(), "ORPHAN".into()],
                    },
                )
                .param(ParameterShape::Record("Master".into()))
                .param(item_param()),
                |call: &mut Invocation| {
                    let master = call.record(0).ok_or("missing master")?;
                    let case = if master.get(0).is_null() { "ORPHAN" } else { "FOUND" };
                    Ok(Value::Text(case.into()))
                },
            )
            .with(
                MethodRef::new("Ops", "weigh"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(item_param())
                    .param(item_param())
                    .param(ParameterShape::Table("Master".into()))
                    .param(ParameterShape::Argument(DataType::Int)),
                |call: &mut Invocation| {
                    let weight = match call.argument(0) {
                        Value::Int(n) => *n,
                        _ => 0,
                    };
                    let right = call.record(1).ok_or("missing right")?.clone();
                    let known = call
                        .tables
                        .first()
                        .is_some_and(|t| !t.find(&[right.get(0).clone()]).is_empty());
                    let left = call.record_mut(0).ok_or("missing left")?;
                    let v = int(left, 1);
                    let add = if known { int(&right, 1) * weight } else { 0 };
                    left.set(1, Value::Int(v + add));
                    Ok(Value::Null)
                },
            ),
    )
}

pub fn session(config: CompilerConfig) -> CompileSession {
    CompileSession::new(config, logic(), Arc::new(models()))
}

pub fn item(key: i64, value: i32) -> Record {
    Record {
        model: "Item".into(),
        values: vec![Value::Long(key), Value::Int(value)],
    }
}

pub fn master(key: i64, name: &str) -> Record {
    Record {
        model: "Master".into(),
        values: vec![Value::Long(key), Value::Text(name.into())],
    }
}
