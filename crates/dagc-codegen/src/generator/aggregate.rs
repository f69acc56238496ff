//! Fold / Summarize.
//!
//! Without side-tables an aggregate compiles to four units: a mapper
//! (Summarize only) turning a source record into a partial aggregate, a
//! combiner folding the right partial into the left in place, a copier, and
//! the operation unit forwarding the final aggregate. The runtime may run
//! mapper and combiner before the shuffle. With side-tables nothing can be
//! pushed down and one unit folds each whole group in a single pass.

use std::sync::Arc;

use dagc_analyze::{shape, summarize, PropertyFolding};
use dagc_core::dag::{InputUnit, Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};
use dagc_core::logic::MethodRef;
use dagc_core::schema::{Aggregation, DataModel};
use dagc_core::types::Value;

use crate::context::CodegenContext;
use crate::generator::{
    argument_literals, arguments, label, model, output_sinks, resolve_method, side_tables,
    tables, OperatorGenerator,
};
use crate::ir::{CallArg, DepSlot, Expr, InputShape, Local, Stmt};
use crate::key::CacheKey;
use crate::node::{AggregateUnits, NodeInfo};
use crate::unit::{Companions, UnitBuilder, UnitDraft, UnitRole};

pub struct AggregateGenerator;

/// Per-kind pieces shared by the split and single-pass layouts.
enum Folding {
    Summarize {
        foldings: Vec<PropertyFolding>,
        source: Arc<DataModel>,
        summarized: Arc<DataModel>,
    },
    Fold {
        method: MethodRef,
    },
}

impl OperatorGenerator for AggregateGenerator {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        let fold = match op.kind {
            OperatorKind::User(UserKind::Fold) => true,
            OperatorKind::User(UserKind::Summarize) => false,
            other => return Err(Error::UnsupportedKind(format!("{} is not an aggregate", other))),
        };
        shape::expect_primary_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Group)?;
        shape::expect_outputs(op, 1)?;
        let key = if fold {
            if op.inputs[0].data_type != op.outputs[0].data_type {
                return Err(Error::shape(op, "fold must output its input model"));
            }
            CacheKey::of(op).with_argument_values(op)
        } else {
            shape::expect_no_arguments(op)?;
            CacheKey::of(op)
        };
        let base = label(op);

        if op.has_side_inputs() {
            let unit = ctx.unit(key, &format!("{}_single", base), || {
                let folding = folding(ctx, op, fold)?;
                single_pass(op, &folding)
            })?;
            return NodeInfo::new(op, unit);
        }

        let mapper = if fold {
            None
        } else {
            Some(ctx.unit(key.for_role(UnitRole::Mapper), &format!("{}_mapper", base), || {
                let folding = folding(ctx, op, fold)?;
                let Folding::Summarize {
                    foldings,
                    source,
                    summarized,
                } = &folding
                else {
                    return Err(Error::Invariant("summarize mapper without foldings".into()));
                };
                let mut b = UnitBuilder::new(UnitRole::Mapper, InputShape::Record);
                let input = b.input_record();
                let partial = b.local();
                b.push(new_record(partial, summarized));
                b.extend(map_into(foldings, source, summarized, input, partial)?);
                b.push(Stmt::Return(Some(partial)));
                Ok(b.finish())
            })?)
        };

        let combiner = ctx.unit(
            key.for_role(UnitRole::Combiner),
            &format!("{}_combiner", base),
            || {
                let folding = folding(ctx, op, fold)?;
                let mut b = UnitBuilder::new(UnitRole::Combiner, InputShape::Pair);
                let (left, right) = (Local(0), Local(1));
                let stmts = combine_into(&folding, &mut b, left, right, &[], argument_literals(op))?;
                b.extend(stmts);
                b.push(Stmt::Return(Some(left)));
                Ok(b.finish())
            },
        )?;

        let copier = ctx.unit(key.for_role(UnitRole::Copier), &format!("{}_copier", base), || {
            let mut b = UnitBuilder::new(UnitRole::Copier, InputShape::Record);
            let input = b.input_record();
            let copy = b.local();
            b.push(Stmt::Let {
                local: copy,
                value: Expr::Copy(input),
            });
            b.push(Stmt::Return(Some(copy)));
            Ok(b.finish())
        })?;

        let companions = Companions {
            mapper: mapper.as_ref().map(|m| m.id),
            combiner: combiner.id,
            copier: copier.id,
        };
        let unit = ctx.unit(key, &base, || {
            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let input = b.input_record();
            b.push(Stmt::Emit {
                sink: sinks[0],
                value: input,
            });
            b.companions(companions);
            Ok(b.finish())
        })?;

        Ok(NodeInfo::new(op, unit)?.with_aggregate(AggregateUnits {
            mapper,
            combiner,
            copier,
        }))
    }
}

fn folding(ctx: &CodegenContext<'_>, op: &Operator, fold: bool) -> Result<Folding> {
    if fold {
        let (method, resolved) = resolve_method(ctx, op)?;
        shape::expect_parameters(op, &resolved, 2, 0, op.side_inputs().count(), 0)?;
        return Ok(Folding::Fold {
            method: method.clone(),
        });
    }
    let foldings = summarize::resolve(&ctx.analysis, op)?;
    let summarized = model(ctx, &op.outputs[0].data_type)?;
    let source = model(ctx, &op.inputs[0].data_type)?;
    Ok(Folding::Summarize {
        foldings,
        source,
        summarized,
    })
}

fn new_record(local: Local, m: &DataModel) -> Stmt {
    Stmt::Let {
        local,
        value: Expr::NewRecord {
            model: m.name.clone(),
            width: m.properties.len(),
        },
    }
}

/// Initial partial aggregate of one source record.
fn map_into(
    foldings: &[PropertyFolding],
    source: &DataModel,
    summarized: &DataModel,
    from: Local,
    to: Local,
) -> Result<Vec<Stmt>> {
    foldings
        .iter()
        .map(|f| -> Result<Stmt> {
            let (s, _) = source.require(&f.mapping.source)?;
            let (d, _) = summarized.require(&f.mapping.destination)?;
            let value = match f.aggregation {
                Aggregation::Count => Expr::Literal(Value::Long(1)),
                Aggregation::Sum => Expr::Widen(Box::new(Expr::property(from, s))),
                Aggregation::Any | Aggregation::Max | Aggregation::Min => Expr::property(from, s),
            };
            Ok(Stmt::SetProperty {
                record: to,
                index: d,
                value,
            })
        })
        .collect()
}

/// Fold `right` into `left`. Fold calls the logic with its arguments baked
/// in; `tables` are the side-table slots of a single-pass unit.
fn combine_into(
    folding: &Folding,
    b: &mut UnitBuilder,
    left: Local,
    right: Local,
    table_slots: &[DepSlot],
    literals: Vec<Expr>,
) -> Result<Vec<Stmt>> {
    match folding {
        Folding::Summarize {
            foldings,
            summarized,
            ..
        } => foldings
            .iter()
            .map(|f| -> Result<Stmt> {
                let (d, _) = summarized.require(&f.mapping.destination)?;
                Ok(Stmt::Aggregate {
                    target: left,
                    index: d,
                    source: Expr::property(right, d),
                    policy: f.aggregation,
                })
            })
            .collect(),
        Folding::Fold { method } => {
            let m = b.method(method);
            let ignored = b.local();
            let call: Vec<CallArg> = [CallArg::Record(left), CallArg::Record(right)]
                .into_iter()
                .chain(tables(table_slots))
                .chain(arguments(literals))
                .collect();
            Ok(vec![Stmt::Let {
                local: ignored,
                value: Expr::Invoke { method: m, args: call },
            }])
        }
    }
}

/// One unit folding a whole group: the first record seeds the accumulator,
/// every later one is combined into it.
fn single_pass(op: &Operator, folding: &Folding) -> Result<UnitDraft> {
    let mut b = UnitBuilder::operation(InputShape::Groups { count: 1 });
    let sinks = output_sinks(&mut b, op);
    let table_slots = side_tables(&mut b, op);
    let acc = b.local();
    let record = b.local();
    b.push(Stmt::Let {
        local: acc,
        value: Expr::Literal(Value::Null),
    });

    let body = match folding {
        Folding::Summarize {
            foldings,
            source,
            summarized,
        } => {
            let partial = b.local();
            let mut body = vec![new_record(partial, summarized)];
            body.extend(map_into(foldings, source, summarized, record, partial)?);
            body.push(Stmt::IfNull {
                value: Expr::Local(acc),
                then: vec![Stmt::Let {
                    local: acc,
                    value: Expr::Local(partial),
                }],
                otherwise: combine_into(folding, &mut b, acc, partial, &table_slots, vec![])?,
            });
            body
        }
        Folding::Fold { .. } => vec![Stmt::IfNull {
            value: Expr::Local(acc),
            then: vec![Stmt::Let {
                local: acc,
                value: Expr::Copy(record),
            }],
            otherwise: combine_into(
                folding,
                &mut b,
                acc,
                record,
                &table_slots,
                argument_literals(op),
            )?,
        }],
    };
    b.push(Stmt::ForEach {
        local: record,
        source: Expr::Group(0),
        body,
    });
    b.push(Stmt::IfNull {
        value: Expr::Local(acc),
        then: vec![],
        otherwise: vec![Stmt::Emit {
            sink: sinks[0],
            value: acc,
        }],
    });
    Ok(b.finish())
}
