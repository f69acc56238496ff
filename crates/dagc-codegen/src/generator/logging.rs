//! Logging: log the logic's message at the declared level, pass the record on.

use dagc_analyze::{logging, shape};
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::{Error, Result};
use dagc_core::logic::ReturnShape;
use dagc_core::schema::DataType;

use crate::context::CodegenContext;
use crate::generator::{
    argument_parameters, arguments, label, output_sinks, resolve_method, OperatorGenerator,
};
use crate::ir::{CallArg, Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::{Parameter, UnitBuilder};

pub struct LoggingGenerator;

impl OperatorGenerator for LoggingGenerator {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        shape::expect_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Record)?;
        shape::expect_outputs(op, 1)?;
        let level = logging::analyze(op)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let (method, resolved) = resolve_method(ctx, op)?;
            shape::expect_parameters(op, &resolved, 1, 0, 0, 0)?;
            if resolved.returns != ReturnShape::Value(DataType::Text) {
                return Err(Error::binding(
                    op,
                    format!("{} must return a Text message", method),
                ));
            }

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let context = b.parameter(Parameter::Context);
            let args = argument_parameters(&mut b, op);
            let input = b.input_record();
            let m = b.method(method);
            let message = b.local();
            let call: Vec<CallArg> = std::iter::once(CallArg::Record(input))
                .chain(arguments(args))
                .collect();
            b.push(Stmt::Let {
                local: message,
                value: Expr::Invoke { method: m, args: call },
            });
            b.push(Stmt::Log {
                level,
                context,
                message: Expr::Local(message),
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
