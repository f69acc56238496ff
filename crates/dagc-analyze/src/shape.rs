//! Validation guards run at the start of every generator.
//!
//! All failures here are shape errors carrying the operator's identity.

use dagc_core::dag::{InputUnit, Operator};
use dagc_core::error::{Error, Result};
use dagc_core::logic::{MethodRef, MethodShape, ParameterShape};

pub fn expect_inputs(op: &Operator, n: usize) -> Result<()> {
    if op.inputs.len() != n {
        return Err(Error::shape(
            op,
            format!("expects {} input(s), found {}", n, op.inputs.len()),
        ));
    }
    Ok(())
}

pub fn expect_primary_inputs(op: &Operator, n: usize) -> Result<()> {
    let found = op.primary_inputs().count();
    if found != n {
        return Err(Error::shape(
            op,
            format!("expects {} primary input(s), found {}", n, found),
        ));
    }
    Ok(())
}

pub fn expect_outputs(op: &Operator, n: usize) -> Result<()> {
    if op.outputs.len() != n {
        return Err(Error::shape(
            op,
            format!("expects {} output(s), found {}", n, op.outputs.len()),
        ));
    }
    Ok(())
}

pub fn expect_at_least_outputs(op: &Operator, n: usize) -> Result<()> {
    if op.outputs.len() < n {
        return Err(Error::shape(
            op,
            format!("expects at least {} output(s), found {}", n, op.outputs.len()),
        ));
    }
    Ok(())
}

pub fn expect_no_arguments(op: &Operator) -> Result<()> {
    if !op.arguments.is_empty() {
        return Err(Error::shape(
            op,
            format!("takes no arguments, found {}", op.arguments.len()),
        ));
    }
    Ok(())
}

pub fn expect_no_side_inputs(op: &Operator) -> Result<()> {
    if op.has_side_inputs() {
        return Err(Error::shape(op, "does not accept side-table inputs"));
    }
    Ok(())
}

pub fn expect_method(op: &Operator) -> Result<&MethodRef> {
    op.method
        .as_ref()
        .ok_or_else(|| Error::shape(op, "no operator method declared"))
}

/// The one unit of consumption shared by all primary inputs.
///
/// Mixed per-record / per-group primary inputs are rejected, and there must
/// be at least one primary input.
pub fn primary_unit(op: &Operator) -> Result<InputUnit> {
    let mut units = op.primary_inputs().map(|(_, p)| p.unit);
    let first = units
        .next()
        .ok_or_else(|| Error::shape(op, "no per-record or per-group input"))?;
    if units.any(|u| u != first) {
        return Err(Error::shape(
            op,
            "primary inputs mix per-record and per-group consumption",
        ));
    }
    Ok(first)
}

pub fn expect_unit(op: &Operator, index: usize, unit: InputUnit) -> Result<()> {
    let port = op
        .input(index)
        .ok_or_else(|| Error::shape(op, format!("missing input {}", index)))?;
    if port.unit != unit {
        return Err(Error::shape(
            op,
            format!(
                "input '{}' must be consumed {:?}, declared {:?}",
                port.name, unit, port.unit
            ),
        ));
    }
    Ok(())
}

/// Check a method's parameter list against the operator's ports/arguments.
///
/// `records`/`groups`/`tables`/`results` are the counts the generator will
/// pass; operator arguments must match the trailing `Argument` parameters
/// one to one, by type.
pub fn expect_parameters(
    op: &Operator,
    shape: &MethodShape,
    records: usize,
    groups: usize,
    tables: usize,
    results: usize,
) -> Result<()> {
    let count = |f: fn(&ParameterShape) -> bool| shape.count(f);
    let found = (
        count(|p| matches!(p, ParameterShape::Record(_))),
        count(|p| matches!(p, ParameterShape::Group(_))),
        count(|p| matches!(p, ParameterShape::Table(_))),
        count(|p| matches!(p, ParameterShape::Result(_))),
    );
    if found != (records, groups, tables, results) {
        return Err(Error::shape(
            op,
            format!(
                "method takes {} record/{} group/{} table/{} result parameter(s), operator provides {}/{}/{}/{}",
                found.0, found.1, found.2, found.3, records, groups, tables, results
            ),
        ));
    }
    let arg_types: Vec<_> = shape
        .parameters
        .iter()
        .filter_map(|p| match p {
            ParameterShape::Argument(t) => Some(*t),
            _ => None,
        })
        .collect();
    if arg_types.len() != op.arguments.len() {
        return Err(Error::shape(
            op,
            format!(
                "method takes {} argument(s), operator declares {}",
                arg_types.len(),
                op.arguments.len()
            ),
        ));
    }
    for (declared, arg) in arg_types.iter().zip(&op.arguments) {
        if *declared != arg.data_type {
            return Err(Error::shape(
                op,
                format!(
                    "argument '{}' is {}, method expects {}",
                    arg.name, arg.data_type, declared
                ),
            ));
        }
    }
    Ok(())
}
