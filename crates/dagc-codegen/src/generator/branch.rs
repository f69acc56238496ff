//! Branch: route each record to the output its selector case names.

use dagc_analyze::branch::{self, BranchMapping};
use dagc_analyze::shape;
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::Result;

use crate::context::CodegenContext;
use crate::generator::{
    argument_parameters, arguments, label, output_sinks, resolve_method, side_tables, tables,
    OperatorGenerator,
};
use crate::ir::{CallArg, DepSlot, Expr, InputShape, Local, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

pub struct BranchGenerator;

impl OperatorGenerator for BranchGenerator {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        shape::expect_primary_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Record)?;
        shape::expect_at_least_outputs(op, 1)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let (method, resolved) = resolve_method(ctx, op)?;
            let side = op.side_inputs().count();
            shape::expect_parameters(op, &resolved, 1, 0, side, 0)?;
            let mapping = branch::analyze(&ctx.analysis, op)?;

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let table_slots = side_tables(&mut b, op);
            let args = argument_parameters(&mut b, op);
            let input = b.input_record();
            let m = b.method(method);
            let selected = b.local();
            let call: Vec<CallArg> = std::iter::once(CallArg::Record(input))
                .chain(tables(&table_slots))
                .chain(arguments(args))
                .collect();
            b.push(Stmt::Let {
                local: selected,
                value: Expr::Invoke { method: m, args: call },
            });
            b.push(route(&mapping, &sinks, Expr::Local(selected), input));
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}

/// `switch (on) { case -> emit(record to its port) }`.
pub(crate) fn route(mapping: &BranchMapping, sinks: &[DepSlot], on: Expr, record: Local) -> Stmt {
    Stmt::Switch {
        on,
        cases: mapping
            .cases
            .iter()
            .map(|c| {
                (
                    c.case.clone(),
                    vec![Stmt::Emit {
                        sink: sinks[c.output],
                        value: record,
                    }],
                )
            })
            .collect(),
        default: None,
    }
}
