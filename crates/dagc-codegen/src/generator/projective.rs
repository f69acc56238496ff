//! Core kinds: projective copies and checkpoints.

use dagc_analyze::{projective, shape};
use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::Result;

use crate::context::CodegenContext;
use crate::generator::{index_pairs, label, model, output_sinks, OperatorGenerator};
use crate::ir::{Expr, InputShape, Stmt};
use crate::key::CacheKey;
use crate::node::NodeInfo;
use crate::unit::UnitBuilder;

fn expect_record_pipe(op: &Operator) -> Result<()> {
    shape::expect_inputs(op, 1)?;
    shape::expect_outputs(op, 1)?;
    shape::expect_unit(op, 0, InputUnit::Record)?;
    shape::expect_no_arguments(op)
}

/// Project / Extend / Restructure: copy same-named properties into a fresh
/// record of the output model.
pub struct ProjectiveGenerator;

impl OperatorGenerator for ProjectiveGenerator {
    fn name(&self) -> &'static str {
        "projective"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        expect_record_pipe(op)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let mappings = projective::resolve(&ctx.analysis, op)?;
            let source = model(ctx, &op.inputs[0].data_type)?;
            let destination = model(ctx, &op.outputs[0].data_type)?;
            let pairs = index_pairs(
                &source,
                &destination,
                mappings
                    .iter()
                    .map(|m| (m.source.as_str(), m.destination.as_str())),
            )?;

            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let input = b.input_record();
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
            b.push(Stmt::Emit {
                sink: sinks[0],
                value: out,
            });
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}

/// Checkpoint: records pass through unchanged.
pub struct CheckpointGenerator;

impl OperatorGenerator for CheckpointGenerator {
    fn name(&self) -> &'static str {
        "checkpoint"
    }

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo> {
        expect_record_pipe(op)?;
        let unit = ctx.unit(CacheKey::of(op), &label(op), || {
            let mut b = UnitBuilder::operation(InputShape::Record);
            let sinks = output_sinks(&mut b, op);
            let input = b.input_record();
            b.push(Stmt::Emit {
                sink: sinks[0],
                value: input,
            });
            Ok(b.finish())
        })?;
        NodeInfo::new(op, unit)
    }
}
