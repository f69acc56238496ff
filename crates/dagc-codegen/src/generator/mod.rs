//! Per-kind generators.
//!
//! A generator validates its operator, builds the structural key, submits
//! it to the cache and, on a miss, emits the unit IR. Dependencies are
//! derived from the unit's parameters against the concrete operator, so a
//! cache hit still wires the right sinks and literal values.

use std::sync::Arc;

use dagc_analyze::shape;
use dagc_core::dag::Operator;
use dagc_core::error::Result;
use dagc_core::logic::{MethodRef, MethodShape};
use dagc_core::schema::DataModel;

use crate::context::CodegenContext;
use crate::ir::{CallArg, DepSlot, Expr};
use crate::node::NodeInfo;
use crate::unit::{Parameter, UnitBuilder};

pub mod aggregate;
pub mod branch;
pub mod cogroup;
pub mod convert;
pub mod extract;
pub mod logging;
pub mod master_join;
pub mod projective;
pub mod split;
pub mod update;

/// One code-generation strategy.
pub trait OperatorGenerator: Send + Sync {
    /// Human-readable generator name (stable).
    fn name(&self) -> &'static str;

    fn generate(&self, ctx: &CodegenContext<'_>, op: &Operator) -> Result<NodeInfo>;
}

/// Unit label derived from the kind tag (`user.master_join` -> `user_master_join`).
pub(crate) fn label(op: &Operator) -> String {
    op.kind.tag().replace('.', "_")
}

pub(crate) fn resolve_method<'o>(
    ctx: &CodegenContext<'_>,
    op: &'o Operator,
) -> Result<(&'o MethodRef, MethodShape)> {
    let method = shape::expect_method(op)?;
    let resolved = ctx.analysis.logic.resolve(method)?;
    Ok((method, resolved))
}

pub(crate) fn model(ctx: &CodegenContext<'_>, name: &str) -> Result<Arc<DataModel>> {
    ctx.analysis.models.model(name)
}

/// One sink parameter per output port, in port order.
pub(crate) fn output_sinks(b: &mut UnitBuilder, op: &Operator) -> Vec<DepSlot> {
    op.outputs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            b.parameter(Parameter::Sink {
                output: i,
                data_type: p.data_type.clone(),
            })
        })
        .collect()
}

/// One table parameter per side input, in port order.
pub(crate) fn side_tables(b: &mut UnitBuilder, op: &Operator) -> Vec<DepSlot> {
    op.side_inputs()
        .map(|(i, p)| {
            b.parameter(Parameter::Table {
                input: i,
                data_type: p.data_type.clone(),
            })
        })
        .collect()
}

/// Operator arguments as literal construction parameters.
pub(crate) fn argument_parameters(b: &mut UnitBuilder, op: &Operator) -> Vec<Expr> {
    op.arguments
        .iter()
        .enumerate()
        .map(|(index, a)| {
            Expr::Dependency(b.parameter(Parameter::Argument {
                index,
                data_type: a.data_type,
            }))
        })
        .collect()
}

/// Operator arguments baked into the unit.
pub(crate) fn argument_literals(op: &Operator) -> Vec<Expr> {
    op.arguments
        .iter()
        .map(|a| Expr::Literal(a.value.clone()))
        .collect()
}

pub(crate) fn tables(slots: &[DepSlot]) -> impl Iterator<Item = CallArg> + '_ {
    slots.iter().map(|s| CallArg::Table(*s))
}

pub(crate) fn results(slots: &[DepSlot]) -> impl Iterator<Item = CallArg> + '_ {
    slots.iter().map(|s| CallArg::Result(*s))
}

pub(crate) fn arguments(exprs: Vec<Expr>) -> impl Iterator<Item = CallArg> {
    exprs.into_iter().map(CallArg::Argument)
}

/// `(source index, destination index)` pairs for a set of property mappings.
pub(crate) fn index_pairs<'m>(
    from: &DataModel,
    to: &DataModel,
    names: impl IntoIterator<Item = (&'m str, &'m str)>,
) -> Result<Vec<(usize, usize)>> {
    names
        .into_iter()
        .map(|(s, d)| -> Result<(usize, usize)> { Ok((from.require(s)?.0, to.require(d)?.0)) })
        .collect()
}
