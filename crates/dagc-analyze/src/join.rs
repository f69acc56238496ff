//! Join resolution for joined data models.
//!
//! A joined model declares two terms, each a source model plus
//! `source -> joined` property pairs and a join key. *Merge* reads the two
//! source ports into the joined output; *split* reads one joined input back
//! out to two destination ports. Merge must cover the joined model exactly;
//! split tolerates destination properties nobody writes (unless strict).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use dagc_core::dag::{Operator, OperatorKind, PortRef, UserKind};
use dagc_core::error::{Error, Result};
use dagc_core::schema::{DataModel, JoinTerm, JoinedModel};

use crate::mapping::PropertyMapping;
use crate::AnalysisContext;

/// Per-side property mappings of one joined model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMapping {
    /// The joined model.
    pub model: String,
    /// `sides[i]` belongs to the i-th non-joined port, in term declaration order.
    pub sides: [Vec<PropertyMapping>; 2],
}

impl JoinMapping {
    pub fn all(&self) -> impl Iterator<Item = &PropertyMapping> {
        self.sides.iter().flatten()
    }
}

/// Grouping keys the master and transaction inputs join on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    pub master: Vec<String>,
    pub transaction: Vec<String>,
}

pub fn is_supported(op: &Operator) -> bool {
    matches!(
        op.kind,
        OperatorKind::User(UserKind::MasterJoin) | OperatorKind::User(UserKind::Split)
    )
}

/// Merge `inputs` of `op` into output `output` (a joined model).
pub fn resolve_merge(
    ctx: &AnalysisContext<'_>,
    op: &Operator,
    inputs: [usize; 2],
    output: usize,
) -> Result<JoinMapping> {
    let out = op
        .output(output)
        .ok_or_else(|| Error::shape(op, format!("missing output {}", output)))?;
    let joined = ctx.models.model(&out.data_type)?;
    let decl = joined_decl(op, &joined)?;

    let mut sources = Vec::with_capacity(2);
    for i in inputs {
        let port = op
            .input(i)
            .ok_or_else(|| Error::shape(op, format!("missing input {}", i)))?;
        sources.push(port.data_type.as_str());
    }
    let order = match_terms(op, decl, [sources[0], sources[1]])?;

    let destination_port = PortRef::output(op.id, output);
    let mut covered: HashMap<&str, String> = HashMap::new();
    let mut sides: [Vec<PropertyMapping>; 2] = [vec![], vec![]];
    for (side, &term_index) in order.iter().enumerate() {
        let term = &decl.terms[term_index];
        let source = ctx.models.model(&term.source)?;
        let source_port = PortRef::input(op.id, inputs[side]);
        for pair in &term.mappings {
            let data_type = paired_type(op, &source, &pair.source, &joined, &pair.destination)?;
            if let Some(prev) = covered.insert(pair.destination.as_str(), term.source.clone()) {
                return Err(Error::binding(
                    op,
                    format!(
                        "joined property '{}.{}' is written by both {} and {}",
                        joined.name, pair.destination, prev, term.source
                    ),
                ));
            }
            sides[side].push(PropertyMapping {
                source_port,
                source: pair.source.clone(),
                destination_port,
                destination: pair.destination.clone(),
                data_type,
            });
        }
    }

    let leftover: Vec<_> = joined
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .filter(|n| !covered.contains_key(n))
        .collect();
    if !leftover.is_empty() {
        return Err(Error::binding(
            op,
            format!("joined properties {:?} of {} are not mapped", leftover, joined.name),
        ));
    }

    trace!(op = %op, model = %joined.name, "resolved join merge");
    Ok(JoinMapping {
        model: joined.name.clone(),
        sides,
    })
}

/// Split input `input` of `op` (a joined model) out to `outputs`.
pub fn resolve_split(
    ctx: &AnalysisContext<'_>,
    op: &Operator,
    input: usize,
    outputs: [usize; 2],
) -> Result<JoinMapping> {
    let port = op
        .input(input)
        .ok_or_else(|| Error::shape(op, format!("missing input {}", input)))?;
    let joined = ctx.models.model(&port.data_type)?;
    let decl = joined_decl(op, &joined)?;

    let mut destinations = Vec::with_capacity(2);
    for o in outputs {
        let out = op
            .output(o)
            .ok_or_else(|| Error::shape(op, format!("missing output {}", o)))?;
        destinations.push(out.data_type.as_str());
    }
    let order = match_terms(op, decl, [destinations[0], destinations[1]])?;

    let source_port = PortRef::input(op.id, input);
    let mut sides: [Vec<PropertyMapping>; 2] = [vec![], vec![]];
    for (side, &term_index) in order.iter().enumerate() {
        let term = &decl.terms[term_index];
        let destination = ctx.models.model(&term.source)?;
        let destination_port = PortRef::output(op.id, outputs[side]);
        let mut written: HashSet<&str> = HashSet::new();
        for pair in &term.mappings {
            let data_type = paired_type(op, &destination, &pair.source, &joined, &pair.destination)?;
            if !written.insert(pair.source.as_str()) {
                return Err(Error::binding(
                    op,
                    format!(
                        "property '{}.{}' is written twice by the split",
                        destination.name, pair.source
                    ),
                ));
            }
            sides[side].push(PropertyMapping {
                source_port,
                source: pair.destination.clone(),
                destination_port,
                destination: pair.source.clone(),
                data_type,
            });
        }
        if ctx.split_strict {
            let leftover: Vec<_> = destination
                .properties
                .iter()
                .map(|p| p.name.as_str())
                .filter(|n| !written.contains(n))
                .collect();
            if !leftover.is_empty() {
                return Err(Error::binding(
                    op,
                    format!(
                        "split leaves properties {:?} of {} unset",
                        leftover, destination.name
                    ),
                ));
            }
        }
    }

    trace!(op = %op, model = %joined.name, "resolved join split");
    Ok(JoinMapping {
        model: joined.name.clone(),
        sides,
    })
}

/// Master join: inputs (master, transaction) merge into output 0.
pub fn resolve_master_join(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<JoinMapping> {
    if op.kind != OperatorKind::User(UserKind::MasterJoin) {
        return Err(Error::UnsupportedKind(format!("{} is not a master join", op.kind)));
    }
    resolve_merge(ctx, op, [0, 1], 0)
}

/// Split: input 0 splits to outputs 0 and 1.
pub fn resolve_split_operator(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<JoinMapping> {
    if op.kind != OperatorKind::User(UserKind::Split) {
        return Err(Error::UnsupportedKind(format!("{} is not a split", op.kind)));
    }
    resolve_split(ctx, op, 0, [0, 1])
}

/// Join key of a master-join-family operator, taken from the groupings of
/// its master (input 0) and transaction (input 1) ports.
pub fn resolve_key(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<JoinKey> {
    let key_of = |index: usize, role: &str| -> Result<(Vec<String>, std::sync::Arc<DataModel>)> {
        let port = op
            .input(index)
            .ok_or_else(|| Error::shape(op, format!("missing {} input", role)))?;
        let grouping = port
            .grouping
            .as_ref()
            .filter(|g| !g.keys.is_empty())
            .ok_or_else(|| Error::shape(op, format!("{} input '{}' has no join key", role, port.name)))?;
        Ok((grouping.keys.clone(), ctx.models.model(&port.data_type)?))
    };
    let (master, master_model) = key_of(0, "master")?;
    let (transaction, tx_model) = key_of(1, "transaction")?;
    if master.len() != transaction.len() {
        return Err(Error::binding(
            op,
            format!(
                "join keys differ in length: {:?} vs {:?}",
                master, transaction
            ),
        ));
    }
    for (m, t) in master.iter().zip(&transaction) {
        let (_, mt) = master_model.require(m).map_err(|e| Error::binding(op, e.to_string()))?;
        let (_, tt) = tx_model.require(t).map_err(|e| Error::binding(op, e.to_string()))?;
        if mt != tt {
            return Err(Error::binding(
                op,
                format!("join key '{}' is {} but '{}' is {}", m, mt, t, tt),
            ));
        }
    }
    Ok(JoinKey {
        master,
        transaction,
    })
}

fn joined_decl<'m>(op: &Operator, model: &'m DataModel) -> Result<&'m JoinedModel> {
    let decl = model
        .as_joined()
        .ok_or_else(|| Error::binding(op, format!("model {} is not a joined model", model.name)))?;
    if decl.terms.len() != 2 {
        return Err(Error::binding(
            op,
            format!("joined model {} declares {} term(s), expected 2", model.name, decl.terms.len()),
        ));
    }
    Ok(decl)
}

/// Term index for each of the two non-joined ports.
fn match_terms(op: &Operator, decl: &JoinedModel, ports: [&str; 2]) -> Result<[usize; 2]> {
    let fits = |t: &JoinTerm, p: &str| t.source == p;
    let terms = &decl.terms;
    if fits(&terms[0], ports[0]) && fits(&terms[1], ports[1]) {
        return Ok([0, 1]);
    }
    if fits(&terms[1], ports[0]) && fits(&terms[0], ports[1]) {
        return Ok([1, 0]);
    }
    Err(Error::binding(
        op,
        format!(
            "ports {:?} do not match join terms ({}, {})",
            ports, terms[0].source, terms[1].source
        ),
    ))
}

/// Type of a `term property <-> joined property` pair; both must exist and agree.
fn paired_type(
    op: &Operator,
    term: &DataModel,
    term_property: &str,
    joined: &DataModel,
    joined_property: &str,
) -> Result<dagc_core::schema::DataType> {
    let (_, a) = term
        .require(term_property)
        .map_err(|e| Error::binding(op, e.to_string()))?;
    let (_, b) = joined
        .require(joined_property)
        .map_err(|e| Error::binding(op, e.to_string()))?;
    if a != b {
        return Err(Error::binding(
            op,
            format!(
                "'{}.{}' is {} but '{}.{}' is {}",
                term.name, term_property, a, joined.name, joined_property, b
            ),
        ));
    }
    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::dag::Grouping;
    use dagc_core::logic::LogicRegistry;
    use dagc_core::schema::{DataType, ModelRegistry, PropertyPair};

    fn pair(s: &str, d: &str) -> PropertyPair {
        PropertyPair {
            source: s.into(),
            destination: d.into(),
        }
    }

    fn models(extra_joined: bool) -> ModelRegistry {
        let mut joined = DataModel::plain("ItemOrder")
            .with("id", DataType::Long)
            .with("price", DataType::Int)
            .with("qty", DataType::Int);
        if extra_joined {
            joined = joined.with("note", DataType::Text);
        }
        ModelRegistry::new()
            .with(
                DataModel::plain("Item")
                    .with("id", DataType::Long)
                    .with("price", DataType::Int),
            )
            .with(
                DataModel::plain("Order")
                    .with("item", DataType::Long)
                    .with("qty", DataType::Int)
                    .with("memo", DataType::Text),
            )
            .with(joined.joined(vec![
                JoinTerm {
                    source: "Item".into(),
                    mappings: vec![pair("id", "id"), pair("price", "price")],
                    key: vec!["id".into()],
                },
                JoinTerm {
                    source: "Order".into(),
                    mappings: vec![pair("qty", "qty")],
                    key: vec!["item".into()],
                },
            ]))
    }

    fn join_op(master: &str, tx: &str) -> Operator {
        Operator::builder(OperatorKind::User(UserKind::MasterJoin))
            .group_input("master", master, Grouping::by(["id"]))
            .group_input("tx", tx, Grouping::by(["item"]))
            .output("joined", "ItemOrder")
            .output("missed", tx)
            .build()
    }

    fn split_op() -> Operator {
        Operator::builder(OperatorKind::User(UserKind::Split))
            .input("in", "ItemOrder")
            .output("left", "Item")
            .output("right", "Order")
            .build()
    }

    fn names(m: &JoinMapping) -> HashSet<(String, String)> {
        m.all()
            .map(|p| (p.source.clone(), p.destination.clone()))
            .collect()
    }

    #[test]
    fn merge_covers_every_joined_property() {
        let logic = LogicRegistry::new();
        let m = models(false);
        let ctx = AnalysisContext::new(&logic, &m);
        let j = resolve_master_join(&ctx, &join_op("Item", "Order")).unwrap();
        assert_eq!(j.sides[0].len(), 2);
        assert_eq!(j.sides[1][0].source, "qty");
        assert_eq!(j.sides[1][0].source_port.index, 1);
    }

    #[test]
    fn merge_leftover_is_fatal_but_split_leftover_is_not() {
        let logic = LogicRegistry::new();
        let m = models(true);
        let ctx = AnalysisContext::new(&logic, &m);
        assert!(matches!(
            resolve_master_join(&ctx, &join_op("Item", "Order")),
            Err(Error::Binding { .. })
        ));
        // Order.memo is never written by the split.
        assert!(resolve_split_operator(&ctx, &split_op()).is_ok());
        let strict = ctx.strict_split(true);
        assert!(matches!(
            resolve_split_operator(&strict, &split_op()),
            Err(Error::Binding { .. })
        ));
    }

    #[test]
    fn terms_are_matched_by_model_name() {
        let logic = LogicRegistry::new();
        let m = models(false);
        let ctx = AnalysisContext::new(&logic, &m);
        let op = Operator::builder(OperatorKind::User(UserKind::Split))
            .input("in", "ItemOrder")
            .output("orders", "Order")
            .output("items", "Item")
            .build();
        let j = resolve_split_operator(&ctx, &op).unwrap();
        assert_eq!(j.sides[0].len(), 1);
        assert_eq!(j.sides[0][0].destination, "qty");
    }

    #[test]
    fn unmatched_port_type_is_a_binding_error() {
        let logic = LogicRegistry::new();
        let m = models(false).with(DataModel::plain("Other").with("x", DataType::Int));
        let ctx = AnalysisContext::new(&logic, &m);
        assert!(matches!(
            resolve_master_join(&ctx, &join_op("Item", "Other")),
            Err(Error::Binding { .. })
        ));
    }

    #[test]
    fn split_mirrors_merge() {
        let logic = LogicRegistry::new();
        let m = models(false);
        let ctx = AnalysisContext::new(&logic, &m);
        let merge = resolve_master_join(&ctx, &join_op("Item", "Order")).unwrap();
        let split = resolve_split_operator(&ctx, &split_op()).unwrap();
        let mirrored: HashSet<_> = names(&merge).into_iter().map(|(s, d)| (d, s)).collect();
        assert_eq!(mirrored, names(&split));
    }

    #[test]
    fn join_key_types_must_agree() {
        let logic = LogicRegistry::new();
        let m = models(false);
        let ctx = AnalysisContext::new(&logic, &m);
        let key = resolve_key(&ctx, &join_op("Item", "Order")).unwrap();
        assert_eq!(key.master, vec!["id".to_string()]);
        assert_eq!(key.transaction, vec!["item".to_string()]);

        let bad = Operator::builder(OperatorKind::User(UserKind::MasterJoin))
            .group_input("master", "Item", Grouping::by(["id"]))
            .group_input("tx", "Order", Grouping::by(["qty"]))
            .build();
        assert!(matches!(resolve_key(&ctx, &bad), Err(Error::Binding { .. })));
    }
}
