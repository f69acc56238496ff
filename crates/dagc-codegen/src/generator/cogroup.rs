//! CoGroup / GroupSort: hand every group of the cursor to the logic.

use dagc_analyze::{buffer, shape};
use dagc_core::dag::{InputUnit, Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};

use crate::context::CodegenContext;
use crate::generator::{
    argument_parameters, arguments, label, output_sinks, resolve_method, results, side_tables,
    tables, OperatorGenerator,
};
use crate::ir::{CallArg, Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

pub struct CoGroupGenerator;

impl OperatorGenerator for CoGroupGenerator {
    fn name(&self) -> &'static str {
        "co_group"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        if shape::primary_unit(op)? != InputUnit::Group {
            return Err(Error::shape(op, "grouping inputs must be consumed per group"));
        }
        let groups = op.primary_inputs().count();
        if op.kind == OperatorKind::User(UserKind::GroupSort) {
            shape::expect_primary_inputs(op, 1)?;
        }
        shape::expect_at_least_outputs(op, 1)?;
        let buffers = buffer::analyze(op)?;

        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let (method, resolved) = resolve_method(ctx, op)?;
            let side = op.side_inputs().count();
            shape::expect_parameters(op, &resolved, 0, groups, side, op.outputs.len())?;

            let mut b = UnitBuilder::operation(InputShape::Groups { count: groups });
            let sinks = output_sinks(&mut b, op);
            let table_slots = side_tables(&mut b, op);
            let args = argument_parameters(&mut b, op);
            let m = b.method(method);
            let ignored = b.local();
            // Buffers follow primary-input order: buffer i reads group i.
            let cursor = buffers.iter().enumerate().map(|(i, g)| CallArg::Group {
                records: Expr::Group(i),
                reiterable: g.policy.is_reiterable(),
            });
            let call: Vec<CallArg> = cursor
                .chain(tables(&table_slots))
                .chain(results(&sinks))
                .chain(arguments(args))
                .collect();
            b.push(Stmt::Let {
                local: ignored,
                value: Expr::Invoke { method: m, args: call },
            });
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}
