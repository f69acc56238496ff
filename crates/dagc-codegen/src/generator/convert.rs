//! Convert: the original record goes to port 0, the logic's new record to port 1.

use dagc_analyze::shape;
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::{Error, Result};
use dagc_core::logic::ReturnShape;

use crate::context::CodegenContext;
use crate::generator::{
    argument_parameters, arguments, label, output_sinks, resolve_method, side_tables, tables,
    OperatorGenerator,
};
use crate::ir::{CallArg, Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

pub struct ConvertGenerator;

impl OperatorGenerator for ConvertGenerator {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        shape::expect_primary_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Record)?;
        shape::expect_outputs(op, 2)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let (method, resolved) = resolve_method(ctx, op)?;
            shape::expect_parameters(op, &resolved, 1, 0, op.side_inputs().count(), 0)?;
            match &resolved.returns {
                ReturnShape::Record(m) if *m == op.outputs[1].data_type => {}
                other => {
                    return Err(Error::binding(
                        op,
                        format!(
                            "{} must return a {} record, returns {:?}",
                            method, op.outputs[1].data_type, other
                        ),
                    ))
                }
            }

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let table_slots = side_tables(&mut b, op);
            let args = argument_parameters(&mut b, op);
            let input = b.input_record();
            let m = b.method(method);
            let converted = b.local();
            b.push(Stmt::Emit {
                sink: sinks[0],
                value: input,
            });
            let call: Vec<CallArg> = std::iter::once(CallArg::Record(input))
                .chain(tables(&table_slots))
                .chain(arguments(args))
                .collect();
            b.push(Stmt::Let {
                local: converted,
                value: Expr::Invoke { method: m, args: call },
            });
            b.push(Stmt::Emit {
                sink: sinks[1],
                value: converted,
            });
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}
