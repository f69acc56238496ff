//! Summarize resolution and the grouping-key patch.
//!
//! A summarize operator reads per-group records of a source model and writes
//! one record of a summarized model per group. The summarized model declares
//! one folding per destination property. Pre-aggregation shuffles partial
//! records of the *summarized* model, so the input grouping key must be
//! expressed in summarized property names: that is what [`patch`] does.

use std::collections::HashSet;

use tracing::debug;

use dagc_core::dag::{attr, Grouping, Operator, OperatorKind, PortRef, UserKind};
use dagc_core::error::{Error, Result};
use dagc_core::graph::OperatorGraph;
use dagc_core::id::OperatorId;
use dagc_core::schema::{Aggregation, DataType};

use crate::mapping::{PropertyFolding, PropertyMapping};
use crate::AnalysisContext;

pub fn is_supported(op: &Operator) -> bool {
    op.kind == OperatorKind::User(UserKind::Summarize)
}

pub fn is_patched(op: &Operator) -> bool {
    op.attribute(attr::SUMMARIZE_PATCHED).is_some()
}

/// Ordered foldings declared on the operator's output model.
pub fn resolve(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<Vec<PropertyFolding>> {
    if !is_supported(op) {
        return Err(Error::UnsupportedKind(format!("{} is not a summarize", op.kind)));
    }
    let (input, output) = match (op.input(0), op.output(0)) {
        (Some(i), Some(o)) => (i, o),
        _ => return Err(Error::shape(op, "summarize needs one input and one output")),
    };
    let summarized = ctx.models.model(&output.data_type)?;
    let decl = summarized.as_summarized().ok_or_else(|| {
        Error::binding(op, format!("model {} is not a summarized model", summarized.name))
    })?;
    if decl.source != input.data_type {
        return Err(Error::binding(
            op,
            format!(
                "{} summarizes {}, input is {}",
                summarized.name, decl.source, input.data_type
            ),
        ));
    }
    let source = ctx.models.model(&decl.source)?;

    let source_port = PortRef::input(op.id, 0);
    let destination_port = PortRef::output(op.id, 0);
    let mut seen = HashSet::new();
    let mut foldings = Vec::with_capacity(decl.foldings.len());
    for f in &decl.foldings {
        let (_, from) = source
            .require(&f.source)
            .map_err(|e| Error::binding(op, e.to_string()))?;
        let (_, to) = summarized
            .require(&f.destination)
            .map_err(|e| Error::binding(op, e.to_string()))?;
        if !seen.insert(f.destination.as_str()) {
            return Err(Error::binding(
                op,
                format!("'{}.{}' is folded twice", summarized.name, f.destination),
            ));
        }
        check_policy(op, f.aggregation, &f.source, from, &f.destination, to)?;
        foldings.push(PropertyFolding {
            mapping: PropertyMapping {
                source_port,
                source: f.source.clone(),
                destination_port,
                destination: f.destination.clone(),
                data_type: from,
            },
            aggregation: f.aggregation,
            destination_type: to,
        });
    }

    let unfolded: Vec<_> = summarized
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .filter(|n| !seen.contains(n))
        .collect();
    if !unfolded.is_empty() {
        return Err(Error::binding(
            op,
            format!("properties {:?} of {} have no folding", unfolded, summarized.name),
        ));
    }
    Ok(foldings)
}

fn check_policy(
    op: &Operator,
    aggregation: Aggregation,
    source: &str,
    from: DataType,
    destination: &str,
    to: DataType,
) -> Result<()> {
    let ok = match aggregation {
        Aggregation::Count => to == DataType::Long,
        Aggregation::Sum => from.is_numeric() && from.widened() == Some(to),
        Aggregation::Any => from == to,
        Aggregation::Max | Aggregation::Min => from == to && from.is_ordered(),
    };
    if ok {
        return Ok(());
    }
    Err(Error::binding(
        op,
        format!(
            "{}({}: {}) cannot produce '{}: {}'",
            aggregation, source, from, destination, to
        ),
    ))
}

/// The operator with its input grouping key renamed into summarized
/// property names. An already-patched operator comes back unchanged.
pub fn patch(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<Operator> {
    if is_patched(op) {
        return Ok(op.clone());
    }
    let foldings = resolve(ctx, op)?;
    let mut port = op
        .input(0)
        .cloned()
        .ok_or_else(|| Error::shape(op, "summarize needs one input"))?;
    let grouping = port.grouping.take().unwrap_or_default();

    let rename = |property: &str| -> Option<String> {
        foldings
            .iter()
            .find(|f| f.aggregation == Aggregation::Any && f.mapping.source == property)
            .map(|f| f.mapping.destination.clone())
    };
    let mut keys = Vec::with_capacity(grouping.keys.len());
    for key in &grouping.keys {
        let renamed = rename(key).ok_or_else(|| {
            Error::binding(
                op,
                format!("grouping property '{}' has no ANY folding", key),
            )
        })?;
        keys.push(renamed);
    }
    // Partial aggregates carry no in-group order.
    port.grouping = Some(Grouping {
        keys,
        ordering: vec![],
    });

    debug!(op = %op, "patched summarize grouping key");
    Ok(op
        .to_builder()
        .replace_input(0, port)
        .attribute(attr::SUMMARIZE_PATCHED, "true")
        .build())
}

/// Patch the summarize `id` in place. Returns the id now standing for it
/// (unchanged when the operator was already patched).
pub fn patch_in_graph(
    ctx: &AnalysisContext<'_>,
    graph: &mut OperatorGraph,
    id: OperatorId,
) -> Result<OperatorId> {
    let op = graph.get(id)?;
    if is_patched(op) {
        return Ok(id);
    }
    let patched = patch(ctx, op)?;
    graph.replace(id, patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::logic::LogicRegistry;
    use dagc_core::schema::{DataModel, FoldingDecl, ModelRegistry};

    fn fold(a: Aggregation, s: &str, d: &str) -> FoldingDecl {
        FoldingDecl {
            aggregation: a,
            source: s.into(),
            destination: d.into(),
        }
    }

    fn models(foldings: Vec<FoldingDecl>, dest: &[(&str, DataType)]) -> ModelRegistry {
        let mut total = DataModel::plain("Total");
        for (n, t) in dest {
            total = total.with(*n, *t);
        }
        ModelRegistry::new()
            .with(
                DataModel::plain("Sale")
                    .with("key", DataType::Int)
                    .with("value", DataType::Int)
                    .with("flag", DataType::Boolean),
            )
            .with(total.summarized("Sale", foldings))
    }

    fn standard() -> ModelRegistry {
        models(
            vec![
                fold(Aggregation::Any, "key", "k"),
                fold(Aggregation::Count, "value", "count"),
                fold(Aggregation::Sum, "value", "sum"),
                fold(Aggregation::Max, "value", "max"),
            ],
            &[
                ("k", DataType::Int),
                ("count", DataType::Long),
                ("sum", DataType::Long),
                ("max", DataType::Int),
            ],
        )
    }

    fn op() -> Operator {
        Operator::builder(OperatorKind::User(UserKind::Summarize))
            .group_input("in", "Sale", Grouping::by(["key"]))
            .output("out", "Total")
            .build()
    }

    #[test]
    fn foldings_follow_declaration_order() {
        let logic = LogicRegistry::new();
        let m = standard();
        let ctx = AnalysisContext::new(&logic, &m);
        let f = resolve(&ctx, &op()).unwrap();
        let aggs: Vec<_> = f.iter().map(|f| f.aggregation).collect();
        assert_eq!(
            aggs,
            vec![Aggregation::Any, Aggregation::Count, Aggregation::Sum, Aggregation::Max]
        );
        assert_eq!(f[2].destination_type, DataType::Long);
        assert_eq!(f[2].mapping.data_type, DataType::Int);
    }

    #[test]
    fn sum_must_widen() {
        let logic = LogicRegistry::new();
        let m = models(
            vec![
                fold(Aggregation::Any, "key", "k"),
                fold(Aggregation::Sum, "value", "sum"),
            ],
            &[("k", DataType::Int), ("sum", DataType::Int)],
        );
        let ctx = AnalysisContext::new(&logic, &m);
        assert!(matches!(resolve(&ctx, &op()), Err(Error::Binding { .. })));
    }

    #[test]
    fn max_on_boolean_is_rejected() {
        let logic = LogicRegistry::new();
        let m = models(
            vec![
                fold(Aggregation::Any, "key", "k"),
                fold(Aggregation::Max, "flag", "f"),
            ],
            &[("k", DataType::Int), ("f", DataType::Boolean)],
        );
        let ctx = AnalysisContext::new(&logic, &m);
        assert!(matches!(resolve(&ctx, &op()), Err(Error::Binding { .. })));
    }

    #[test]
    fn patch_renames_keys_and_is_idempotent() {
        let logic = LogicRegistry::new();
        let m = standard();
        let ctx = AnalysisContext::new(&logic, &m);
        let mut graph = OperatorGraph::new();
        let id = graph.add(op());

        let patched_id = patch_in_graph(&ctx, &mut graph, id).unwrap();
        assert_ne!(patched_id, id);
        let patched = graph.get(patched_id).unwrap();
        assert!(is_patched(patched));
        assert_eq!(
            patched.inputs[0].grouping.as_ref().unwrap().keys,
            vec!["k".to_string()]
        );

        assert_eq!(&patch(&ctx, patched).unwrap(), patched);
        let again = patch_in_graph(&ctx, &mut graph, patched_id).unwrap();
        assert_eq!(again, patched_id);
    }

    #[test]
    fn grouping_key_without_any_folding_fails() {
        let logic = LogicRegistry::new();
        let m = models(
            vec![fold(Aggregation::Count, "key", "count")],
            &[("count", DataType::Long)],
        );
        let ctx = AnalysisContext::new(&logic, &m);
        assert!(matches!(patch(&ctx, &op()), Err(Error::Binding { .. })));
    }
}
