//! Master-join family: MasterJoin, MasterCheck, MasterJoinUpdate, MasterBranch.
//!
//! Input 0 is the master, input 1 the transaction. How the master arrives
//! picks the strategy:
//!
//! - `Table`: the master is a whole-input side-table (first construction
//!   parameter); each transaction record looks its key up.
//! - `Merge`: master and transaction arrive as groups of one co-group
//!   cursor (group 0 and group 1); each transaction in the group is matched.
//!
//! Either way a transaction either finds a master (optionally chosen by the
//! selection method) or misses, and the per-kind outcome is the same.

use std::fmt;

use dagc_analyze::selection::{self, Selection};
use dagc_analyze::{branch, join, shape};
use dagc_core::dag::{InputUnit, Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};
use dagc_core::logic::ParameterShape;
use dagc_core::schema::DataModel;

use crate::context::CodegenContext;
use crate::generator::branch::route;
use crate::generator::{
    argument_parameters, arguments, index_pairs, label, model, output_sinks, resolve_method,
    OperatorGenerator,
};
use crate::ir::{CallArg, DepSlot, Expr, InputShape, Local, MethodSlot, Stmt};
use crate::key::{CacheKey, KeyElement};
use crate::node::NodeInfo;
use crate::unit::{Parameter, UnitBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinStrategy {
    Table,
    Merge,
}

impl JoinStrategy {
    pub fn tag(self) -> &'static str {
        match self {
            JoinStrategy::Table => "table",
            JoinStrategy::Merge => "merge",
        }
    }

    /// Strategy from how the master and transaction inputs are consumed.
    pub fn select(op: &Operator) -> Result<JoinStrategy> {
        let (master, tx) = match (op.input(0), op.input(1)) {
            (Some(m), Some(t)) => (m, t),
            _ => return Err(Error::shape(op, "needs master and transaction inputs")),
        };
        match (master.unit, tx.unit) {
            (InputUnit::WholeInput, InputUnit::Record) => Ok(JoinStrategy::Table),
            (InputUnit::Group, InputUnit::Group) => Ok(JoinStrategy::Merge),
            (m, t) => Err(Error::shape(
                op,
                format!(
                    "master {:?} with transaction {:?} has no join strategy",
                    m, t
                ),
            )),
        }
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub struct MasterJoinGenerator;

impl OperatorGenerator for MasterJoinGenerator {
    fn name(&self) -> &'static str {
        "master_join"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        let kind = match op.kind {
            OperatorKind::User(k) if k.is_master_join_family() => k,
            other => return Err(Error::UnsupportedKind(format!("{} is not a master join", other))),
        };
        shape::expect_inputs(op, 2)?;
        match kind {
            UserKind::MasterBranch => shape::expect_at_least_outputs(op, 1)?,
            _ => shape::expect_outputs(op, 2)?,
        }
        let strategy = JoinStrategy::select(op)?;
        let key = CacheKey::of(op).with(KeyElement::Strategy(strategy.tag()));
        let unit = ctx.unit(key, &format!("{}_{}", label(op), strategy), || {
            let selection = selection::analyze(&ctx.analysis, op)?;
            let join_key = join::resolve_key(&ctx.analysis, op)?;
            let tx_model = model(ctx, &op.inputs[1].data_type)?;

            let input = match strategy {
                JoinStrategy::Table => InputShape::Record,
                JoinStrategy::Merge => InputShape::Groups { count: 2 },
            };
            let mut b = UnitBuilder::operation(input);
            let master_table = match strategy {
                JoinStrategy::Table => Some(b.parameter(Parameter::Table {
                    input: 0,
                    data_type: op.inputs[0].data_type.clone(),
                })),
                JoinStrategy::Merge => None,
            };
            let sinks = output_sinks(&mut b, op);
            let args = argument_parameters(&mut b, op);
            let selector = selection_plan(&mut b, op, selection.as_ref(), &args)?;

            let candidates = b.local();
            let tx = match strategy {
                JoinStrategy::Table => b.input_record(),
                JoinStrategy::Merge => b.local(),
            };
            let master = b.local();

            let mut per_tx = vec![Stmt::Let {
                local: master,
                value: Expr::Select {
                    candidates,
                    subject: tx,
                    selection: selector.0,
                    args: selector.1,
                },
            }];
            per_tx.push(outcome(ctx, &mut b, op, kind, master, tx, &sinks, &args)?);

            match (strategy, master_table) {
                (JoinStrategy::Table, Some(table)) => {
                    let key = join_key
                        .transaction
                        .iter()
                        .map(|k| -> Result<Expr> { Ok(Expr::property(tx, tx_model.require(k)?.0)) })
                        .collect::<Result<Vec<_>>>()?;
                    b.push(Stmt::Let {
                        local: candidates,
                        value: Expr::Lookup { table, key },
                    });
                    b.extend(per_tx);
                }
                _ => {
                    b.push(Stmt::Let {
                        local: candidates,
                        value: Expr::Group(0),
                    });
                    b.push(Stmt::ForEach {
                        local: tx,
                        source: Expr::Group(1),
                        body: per_tx,
                    });
                }
            }
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}

/// Selection method slot plus the arguments it is called with.
fn selection_plan(
    b: &mut UnitBuilder,
    op: &Operator,
    selection: Option<&Selection>,
    args: &[Expr],
) -> Result<(Option<MethodSlot>, Vec<Expr>)> {
    let Some(s) = selection else {
        return Ok((None, vec![]));
    };
    let wanted = s.shape.count(|p| matches!(p, ParameterShape::Argument(_)));
    let passed = match wanted {
        0 => vec![],
        n if n == args.len() => args.to_vec(),
        n => {
            return Err(Error::shape(
                op,
                format!(
                    "selection method {} takes {} argument(s), operator declares {}",
                    s.method,
                    n,
                    args.len()
                ),
            ))
        }
    };
    Ok((Some(b.method(&s.method)), passed))
}

/// `if master is unset { missed } else { found }` for one transaction.
#[allow(clippy::too_many_arguments)]
fn outcome(
    ctx: &CodegenContext<'_>,
    b: &mut UnitBuilder,
    op: &Operator,
    kind: UserKind,
    master: Local,
    tx: Local,
    sinks: &[DepSlot],
    args: &[Expr],
) -> Result<Stmt> {
    let (found, missed) = match kind {
        UserKind::MasterJoin => {
            let mapping = join::resolve_master_join(&ctx.analysis, op)?;
            let joined = model(ctx, &mapping.model)?;
            let master_model = model(ctx, &op.inputs[0].data_type)?;
            let tx_model = model(ctx, &op.inputs[1].data_type)?;
            let pairs = |from: &DataModel, side: usize| {
                index_pairs(
                    from,
                    &joined,
                    mapping.sides[side]
                        .iter()
                        .map(|m| (m.source.as_str(), m.destination.as_str())),
                )
            };
            let master_pairs = pairs(&master_model, 0)?;
            let tx_pairs = pairs(&tx_model, 1)?;
            let out = b.local();
            (
                vec![
                    Stmt::Let {
                        local: out,
                        value: Expr::NewRecord {
                            model: joined.name.clone(),
                            width: joined.properties.len(),
                        },
                    },
                    Stmt::CopyProperties {
                        from: master,
                        to: out,
                        pairs: master_pairs,
                    },
                    Stmt::CopyProperties {
                        from: tx,
                        to: out,
                        pairs: tx_pairs,
                    },
                    Stmt::Emit {
                        sink: sinks[0],
                        value: out,
                    },
                ],
                vec![Stmt::Emit {
                    sink: sinks[1],
                    value: tx,
                }],
            )
        }
        UserKind::MasterCheck => (
            vec![Stmt::Emit {
                sink: sinks[0],
                value: tx,
            }],
            vec![Stmt::Emit {
                sink: sinks[1],
                value: tx,
            }],
        ),
        UserKind::MasterJoinUpdate => {
            let (method, resolved) = resolve_method(ctx, op)?;
            shape::expect_parameters(op, &resolved, 2, 0, 0, 0)?;
            let m = b.method(method);
            let ignored = b.local();
            (
                vec![
                    Stmt::Let {
                        local: ignored,
                        value: Expr::Invoke {
                            method: m,
                            args: call(master, tx, args),
                        },
                    },
                    Stmt::Emit {
                        sink: sinks[0],
                        value: tx,
                    },
                ],
                vec![Stmt::Emit {
                    sink: sinks[1],
                    value: tx,
                }],
            )
        }
        UserKind::MasterBranch => {
            let (method, resolved) = resolve_method(ctx, op)?;
            shape::expect_parameters(op, &resolved, 2, 0, 0, 0)?;
            let mapping = branch::analyze(&ctx.analysis, op)?;
            let master_model = model(ctx, &op.inputs[0].data_type)?;
            let m = b.method(method);
            let selected = b.local();
            // A missing master reaches the method as an all-unset record.
            let absent = b.local();
            (
                vec![
                    Stmt::Let {
                        local: selected,
                        value: Expr::Invoke {
                            method: m,
                            args: call(master, tx, args),
                        },
                    },
                    route(&mapping, sinks, Expr::Local(selected), tx),
                ],
                vec![
                    Stmt::Let {
                        local: absent,
                        value: Expr::NewRecord {
                            model: master_model.name.clone(),
                            width: master_model.properties.len(),
                        },
                    },
                    Stmt::Let {
                        local: selected,
                        value: Expr::Invoke {
                            method: m,
                            args: call(absent, tx, args),
                        },
                    },
                    route(&mapping, sinks, Expr::Local(selected), tx),
                ],
            )
        }
        other => {
            return Err(Error::UnsupportedKind(format!(
                "{:?} is not a master join",
                other
            )))
        }
    };
    Ok(Stmt::IfNull {
        value: Expr::Local(master),
        then: missed,
        otherwise: found,
    })
}

fn call(master: Local, tx: Local, args: &[Expr]) -> Vec<CallArg> {
    [CallArg::Record(master), CallArg::Record(tx)]
        .into_iter()
        .chain(arguments(args.to_vec()))
        .collect()
}
