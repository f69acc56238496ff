//! Lowering seam: a backend turns a compiled unit into something loadable.

use std::fmt::Write as _;

use crate::ir::{CallArg, Expr, Stmt};
use crate::unit::{CompiledUnit, Parameter};

/// Lowers compiled units. `Output` is whatever the runtime loads (text,
/// an executable instance, bytes).
pub trait UnitBackend {
    type Output;
    type Error;

    fn lower(&self, unit: &CompiledUnit) -> Result<Self::Output, Self::Error>;
}

/// Human-readable listing of a unit. Used in logs and golden tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingBackend;

impl UnitBackend for ListingBackend {
    type Output = String;
    type Error = std::fmt::Error;

    fn lower(&self, unit: &CompiledUnit) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(
            out,
            "unit {} ({}, {}) input={:?}",
            unit.name, unit.id, unit.role, unit.input
        )?;
        for (i, p) in unit.parameters.iter().enumerate() {
            let p = match p {
                Parameter::Sink { output, data_type } => format!("sink out{} : {}", output, data_type),
                Parameter::Table { input, data_type } => format!("table in{} : {}", input, data_type),
                Parameter::Context => "context".to_string(),
                Parameter::Argument { index, data_type } => format!("arg{} : {:?}", index, data_type),
            };
            writeln!(out, "  param ${} {}", i, p)?;
        }
        for (i, m) in unit.methods.iter().enumerate() {
            writeln!(out, "  method #{} {}", i, m)?;
        }
        if let Some(c) = &unit.companions {
            writeln!(
                out,
                "  companions mapper={:?} combiner={} copier={}",
                c.mapper.map(|m| m.get()),
                c.combiner,
                c.copier
            )?;
        }
        block(&mut out, &unit.body, 1)?;
        Ok(out)
    }
}

fn block(out: &mut String, stmts: &[Stmt], depth: usize) -> std::fmt::Result {
    for s in stmts {
        stmt(out, s, depth)?;
    }
    Ok(())
}

fn stmt(out: &mut String, s: &Stmt, depth: usize) -> std::fmt::Result {
    let pad = "  ".repeat(depth);
    match s {
        Stmt::Let { local, value } => writeln!(out, "{}l{} = {}", pad, local.0, expr(value)),
        Stmt::SetProperty {
            record,
            index,
            value,
        } => writeln!(out, "{}l{}[{}] = {}", pad, record.0, index, expr(value)),
        Stmt::CopyProperties { from, to, pairs } => {
            writeln!(out, "{}copy l{} -> l{} {:?}", pad, from.0, to.0, pairs)
        }
        Stmt::Aggregate {
            target,
            index,
            source,
            policy,
        } => writeln!(
            out,
            "{}l{}[{}] {:?}= {}",
            pad,
            target.0,
            index,
            policy,
            expr(source)
        ),
        Stmt::Emit { sink, value } => writeln!(out, "{}emit ${} l{}", pad, sink.0, value.0),
        Stmt::Switch { on, cases, default } => {
            writeln!(out, "{}switch {}", pad, expr(on))?;
            for (case, body) in cases {
                writeln!(out, "{}  case {}:", pad, case)?;
                block(out, body, depth + 2)?;
            }
            match default {
                Some(body) => {
                    writeln!(out, "{}  default:", pad)?;
                    block(out, body, depth + 2)?;
                }
                None => writeln!(out, "{}  default: fail", pad)?,
            }
            Ok(())
        }
        Stmt::IfNull {
            value,
            then,
            otherwise,
        } => {
            writeln!(out, "{}if unset {}", pad, expr(value))?;
            block(out, then, depth + 1)?;
            if !otherwise.is_empty() {
                writeln!(out, "{}else", pad)?;
                block(out, otherwise, depth + 1)?;
            }
            Ok(())
        }
        Stmt::ForEach {
            local,
            source,
            body,
        } => {
            writeln!(out, "{}for l{} in {}", pad, local.0, expr(source))?;
            block(out, body, depth + 1)
        }
        Stmt::Log {
            level,
            context,
            message,
        } => writeln!(out, "{}log {} ${} {}", pad, level, context.0, expr(message)),
        Stmt::Return(Some(l)) => writeln!(out, "{}return l{}", pad, l.0),
        Stmt::Return(None) => writeln!(out, "{}return", pad),
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Local(l) => format!("l{}", l.0),
        Expr::Literal(v) => format!("{:?}", v),
        Expr::Dependency(d) => format!("${}", d.0),
        Expr::Property { record, index } => format!("l{}[{}]", record.0, index),
        Expr::Widen(inner) => format!("widen({})", expr(inner)),
        Expr::NewRecord { model, width } => format!("new {}/{}", model, width),
        Expr::Copy(l) => format!("copy(l{})", l.0),
        Expr::Invoke { method, args } => {
            let args: Vec<String> = args.iter().map(call_arg).collect();
            format!("#{}({})", method.0, args.join(", "))
        }
        Expr::Lookup { table, key } => {
            let key: Vec<String> = key.iter().map(expr).collect();
            format!("${}.find({})", table.0, key.join(", "))
        }
        Expr::Group(i) => format!("group{}", i),
        Expr::Select {
            candidates,
            subject,
            selection,
            args,
        } => match selection {
            Some(m) => {
                let args: Vec<String> = args.iter().map(expr).collect();
                format!(
                    "select l{} for l{} by #{}({})",
                    candidates.0,
                    subject.0,
                    m.0,
                    args.join(", ")
                )
            }
            None => format!("first l{}", candidates.0),
        },
    }
}

fn call_arg(a: &CallArg) -> String {
    match a {
        CallArg::Record(l) => format!("&mut l{}", l.0),
        CallArg::Group {
            records,
            reiterable,
        } => {
            if *reiterable {
                format!("list {}", expr(records))
            } else {
                format!("iter {}", expr(records))
            }
        }
        CallArg::Table(d) => format!("table ${}", d.0),
        CallArg::Argument(e) => expr(e),
        CallArg::Result(d) => format!("result ${}", d.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InputShape, Local};
    use crate::unit::{UnitBuilder, UnitRole};
    use dagc_core::hash::hash_values;
    use dagc_core::id::UnitId;
    use dagc_core::types::Value;

    #[test]
    fn listing_shows_parameters_and_body() {
        let mut b = UnitBuilder::new(UnitRole::Operation, InputShape::Record);
        let sink = b.parameter(Parameter::Sink {
            output: 0,
            data_type: "M".into(),
        });
        b.push(Stmt::SetProperty {
            record: Local(0),
            index: 1,
            value: Expr::Literal(Value::Int(3)),
        });
        b.push(Stmt::Emit {
            sink,
            value: Local(0),
        });
        let unit = b
            .finish()
            .seal(UnitId::new(1), "u".into(), hash_values([&Value::Int(1)]));
        let text = ListingBackend.lower(&unit).unwrap();
        assert!(text.contains("param $0 sink out0 : M"));
        assert!(text.contains("l0[1] = Int(3)"));
        assert!(text.contains("emit $0 l0"));
    }
}
