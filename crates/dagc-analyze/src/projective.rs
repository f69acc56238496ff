//! Core projective kinds: property copies by name.

use dagc_core::dag::{CoreKind, Operator, OperatorKind, PortRef};
use dagc_core::error::{Error, Result};

use crate::mapping::PropertyMapping;
use crate::AnalysisContext;

pub fn is_supported(op: &Operator) -> bool {
    matches!(
        op.kind,
        OperatorKind::Core(CoreKind::Project)
            | OperatorKind::Core(CoreKind::Extend)
            | OperatorKind::Core(CoreKind::Restructure)
    )
}

/// Same-named property mappings from input 0 to output 0, in output order.
///
/// Project needs every output property present on the input, Extend every
/// input property present on the output. Common names must agree on type.
pub fn resolve(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<Vec<PropertyMapping>> {
    let kind = match op.kind {
        OperatorKind::Core(k) if is_supported(op) => k,
        _ => {
            return Err(Error::UnsupportedKind(format!(
                "{} is not projective",
                op.kind
            )))
        }
    };
    let (input, output) = match (op.input(0), op.output(0)) {
        (Some(i), Some(o)) => (i, o),
        _ => return Err(Error::shape(op, "needs one input and one output")),
    };
    let source = ctx.models.model(&input.data_type)?;
    let destination = ctx.models.model(&output.data_type)?;

    let mut mappings = Vec::new();
    for p in &destination.properties {
        match source.property(&p.name) {
            Some(s) if s.data_type != p.data_type => {
                return Err(Error::binding(
                    op,
                    format!(
                        "'{}' is {} on {} but {} on {}",
                        p.name, s.data_type, source.name, p.data_type, destination.name
                    ),
                ))
            }
            Some(_) => mappings.push(PropertyMapping {
                source_port: PortRef::input(op.id, 0),
                source: p.name.clone(),
                destination_port: PortRef::output(op.id, 0),
                destination: p.name.clone(),
                data_type: p.data_type,
            }),
            None if kind == CoreKind::Project => {
                return Err(Error::binding(
                    op,
                    format!("projected property '{}' is not on {}", p.name, source.name),
                ))
            }
            None => {}
        }
    }
    if kind == CoreKind::Extend {
        if let Some(dropped) = source
            .properties
            .iter()
            .find(|p| destination.property(&p.name).is_none())
        {
            return Err(Error::binding(
                op,
                format!(
                    "extension {} drops property '{}'",
                    destination.name, dropped.name
                ),
            ));
        }
    }
    Ok(mappings)
}
