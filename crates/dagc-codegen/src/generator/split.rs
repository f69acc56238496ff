//! Split: one joined record out to its two source models.

use dagc_analyze::{join, shape};
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::Result;

use crate::context::CodegenContext;
use crate::generator::{index_pairs, label, model, output_sinks, OperatorGenerator};
use crate::ir::{Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

pub struct SplitGenerator;

impl OperatorGenerator for SplitGenerator {
    fn name(&self) -> &'static str {
        "split"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        shape::expect_inputs(op, 1)?;
        shape::expect_unit(op, 0, InputUnit::Record)?;
        shape::expect_outputs(op, 2)?;
        shape::expect_no_arguments(op)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let mapping = join::resolve_split_operator(&ctx.analysis, op)?;
            let joined = model(ctx, &mapping.model)?;

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let input = b.input_record();
            let mut outs = Vec::with_capacity(2);
            // sides[i] feeds output i.
            for (i, side) in mapping.sides.iter().enumerate() {
                let destination = model(ctx, &op.outputs[i].data_type)?;
                let pairs = index_pairs(
                    &joined,
                    &destination,
                    side.iter().map(|m| (m.source.as_str(), m.destination.as_str())),
                )?;
                let out = b.local();
                b.push(Stmt::Let {
                    local: out,
                    value: Expr::NewRecord {
                        model: destination.name.clone(),
                        width: destination.properties.len(),
                    },
                });
                b.push(Stmt::CopyProperties {
                    from: input,
                    to: out,
                    pairs,
                });
                outs.push(out);
            }
            for (sink, out) in sinks.iter().zip(outs) {
                b.push(Stmt::Emit {
                    sink: *sink,
                    value: out,
                });
            }
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}
