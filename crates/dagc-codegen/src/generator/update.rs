//! Update: the logic mutates the record in place, then it moves on.

use dagc_analyze::shape;
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::Result;

use crate::context::CodegenContext;
use crate::generator::{
    argument_parameters, arguments, label, output_sinks, resolve_method, side_tables, tables,
    OperatorGenerator,
};
use crate::ir::{CallArg, Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

pub struct UpdateGenerator;

impl OperatorGenerator for UpdateGenerator {
    fn name(&self) -> &'static str {
        "update"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        shape::expect_primary_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Record)?;
        shape::expect_outputs(op, 1)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let (method, resolved) = resolve_method(ctx, op)?;
            shape::expect_parameters(op, &resolved, 1, 0, op.side_inputs().count(), 0)?;

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let table_slots = side_tables(&mut b, op);
            let args = argument_parameters(&mut b, op);
            let input = b.input_record();
            let m = b.method(method);
            let ignored = b.local();
            let call: Vec<CallArg> = std::iter::once(CallArg::Record(input))
                .chain(tables(&table_slots))
                .chain(arguments(args))
                .collect();
            b.push(Stmt::Let {
                local: ignored,
                value: Expr::Invoke { method: m, args: call },
            });
            b.push(Stmt::Emit {
                sink: sinks[0],
                value: input,
            });
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}
