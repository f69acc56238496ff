//! Master-selection analysis.
//!
//! A master-join-family operator may name a selection method in its
//! `selection` attribute. The method sees the candidate master records and
//! the transaction record and returns the index of the chosen master, or
//! unset when none is acceptable.

use serde::{Deserialize, Serialize};

use dagc_core::dag::{attr, Operator};
use dagc_core::error::{Error, Result};
use dagc_core::logic::{MethodRef, MethodShape, ParameterShape, ReturnShape};
use dagc_core::schema::DataType;

use crate::AnalysisContext;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub method: MethodRef,
    pub shape: MethodShape,
}

pub fn is_supported(op: &Operator) -> bool {
    op.kind.user().is_some_and(|k| k.is_master_join_family())
}

/// `None` when no selection is configured.
pub fn analyze(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<Option<Selection>> {
    if !is_supported(op) {
        return Err(Error::UnsupportedKind(format!(
            "{} takes no master selection",
            op.kind
        )));
    }
    let raw = match op.attribute(attr::SELECTION).map(str::trim) {
        None => return Ok(None),
        Some(attr::NO_SELECTION) | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    let method = MethodRef::parse(raw).ok_or_else(|| {
        Error::binding(op, format!("malformed selection reference '{}'", raw))
    })?;
    let shape = ctx.logic.resolve(&method).map_err(|e| {
        Error::binding(op, format!("selection method {} not found: {}", method, e))
    })?;

    let (master, tx) = match (op.input(0), op.input(1)) {
        (Some(m), Some(t)) => (m, t),
        _ => return Err(Error::shape(op, "master join needs master and transaction inputs")),
    };
    let expected = [
        ParameterShape::Group(master.data_type.clone()),
        ParameterShape::Record(tx.data_type.clone()),
    ];
    if shape.parameters.len() < 2 || shape.parameters[..2] != expected {
        return Err(Error::binding(
            op,
            format!(
                "selection method {} must take ({} list, {}), takes {:?}",
                method, master.data_type, tx.data_type, shape.parameters
            ),
        ));
    }
    if shape.parameters[2..]
        .iter()
        .any(|p| !matches!(p, ParameterShape::Argument(_)))
    {
        return Err(Error::binding(
            op,
            format!("selection method {} may only take scalar arguments after the records", method),
        ));
    }
    match shape.returns {
        ReturnShape::Value(DataType::Int) | ReturnShape::Value(DataType::Long) => {}
        ref other => {
            return Err(Error::binding(
                op,
                format!(
                    "selection method {} must return a master index, returns {:?}",
                    method, other
                ),
            ))
        }
    }
    Ok(Some(Selection { method, shape }))
}
