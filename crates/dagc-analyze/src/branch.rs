//! Branch analysis: enumerated case -> output port.
//!
//! The operator method returns an enumerated selector. Each case pairs with
//! the output port whose normalized name equals the case's normalized name.
//! Every case needs a port and every port needs a case.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use dagc_core::dag::{Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};
use dagc_core::logic::ReturnShape;

use crate::naming::normalize;
use crate::shape;
use crate::AnalysisContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCase {
    pub case: String,
    pub output: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMapping {
    /// Name of the enumerated selector type.
    pub selector: String,
    /// In case declaration order.
    pub cases: Vec<BranchCase>,
}

impl BranchMapping {
    pub fn output_of(&self, case: &str) -> Option<usize> {
        self.cases.iter().find(|c| c.case == case).map(|c| c.output)
    }
}

pub fn is_supported(op: &Operator) -> bool {
    matches!(
        op.kind,
        OperatorKind::User(UserKind::Branch) | OperatorKind::User(UserKind::MasterBranch)
    )
}

pub fn analyze(ctx: &AnalysisContext<'_>, op: &Operator) -> Result<BranchMapping> {
    if !is_supported(op) {
        return Err(Error::UnsupportedKind(format!("{} is not a branch", op.kind)));
    }
    let method = shape::expect_method(op)?;
    let resolved = ctx.logic.resolve(method)?;
    let (selector, cases) = match resolved.returns {
        ReturnShape::Enum { name, cases } => (name, cases),
        other => {
            return Err(Error::binding(
                op,
                format!("{} must return an enumerated selector, returns {:?}", method, other),
            ))
        }
    };

    let mut ports: HashMap<String, usize> = HashMap::new();
    for (i, port) in op.outputs.iter().enumerate() {
        if let Some(prev) = ports.insert(normalize(&port.name), i) {
            return Err(Error::binding(
                op,
                format!(
                    "outputs '{}' and '{}' normalize to the same name",
                    op.outputs[prev].name, port.name
                ),
            ));
        }
    }

    let mut mapped = Vec::with_capacity(cases.len());
    for case in cases {
        let output = ports.remove(&normalize(&case)).ok_or_else(|| {
            Error::binding(
                op,
                format!("case {}.{} has no matching output port", selector, case),
            )
        })?;
        mapped.push(BranchCase { case, output });
    }

    if !ports.is_empty() {
        let mut rest: Vec<_> = ports.values().map(|&i| op.outputs[i].name.as_str()).collect();
        rest.sort_unstable();
        return Err(Error::binding(
            op,
            format!("output port(s) {:?} match no case of {}", rest, selector),
        ));
    }

    Ok(BranchMapping {
        selector,
        cases: mapped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::logic::{LogicRegistry, MethodRef, MethodShape, ParameterShape};
    use dagc_core::schema::ModelRegistry;
    use dagc_core::types::Value;

    fn registry(cases: &[&str]) -> LogicRegistry {
        LogicRegistry::new().with(
            MethodRef::new("Ops", "select"),
            MethodShape::new(
                "Ops",
                ReturnShape::Enum {
                    name: "Level".into(),
                    cases: cases.iter().map(|s| s.to_string()).collect(),
                },
            )
            .param(ParameterShape::Record("Item".into())),
            |_: &mut dagc_core::logic::Invocation| Ok(Value::Null),
        )
    }

    fn op(outputs: &[&str]) -> Operator {
        let mut b = Operator::builder(OperatorKind::User(UserKind::Branch))
            .method(MethodRef::new("Ops", "select"))
            .input("in", "Item");
        for o in outputs {
            b = b.output(o, "Item");
        }
        b.build()
    }

    #[test]
    fn cases_pair_with_normalized_ports() {
        let logic = registry(&["HIGH_PRICE", "LOW", "UNKNOWN"]);
        let models = ModelRegistry::new();
        let ctx = AnalysisContext::new(&logic, &models);
        let m = analyze(&ctx, &op(&["low", "highPrice", "unknown"])).unwrap();
        assert_eq!(m.output_of("HIGH_PRICE"), Some(1));
        assert_eq!(m.output_of("LOW"), Some(0));
        assert_eq!(m.output_of("UNKNOWN"), Some(2));
    }

    #[test]
    fn missing_port_is_a_binding_error() {
        let logic = registry(&["A", "B", "C"]);
        let models = ModelRegistry::new();
        let ctx = AnalysisContext::new(&logic, &models);
        let err = analyze(&ctx, &op(&["a", "b"])).unwrap_err();
        assert!(matches!(err, Error::Binding { ref message, .. } if message.contains("C")));
    }

    #[test]
    fn leftover_port_is_a_binding_error() {
        let logic = registry(&["A"]);
        let models = ModelRegistry::new();
        let ctx = AnalysisContext::new(&logic, &models);
        let err = analyze(&ctx, &op(&["a", "extra"])).unwrap_err();
        assert!(matches!(err, Error::Binding { ref message, .. } if message.contains("extra")));
    }

    #[test]
    fn non_enum_return_is_rejected() {
        let logic = LogicRegistry::new().with(
            MethodRef::new("Ops", "select"),
            MethodShape::new("Ops", ReturnShape::Void),
            |_: &mut dagc_core::logic::Invocation| Ok(Value::Null),
        );
        let models = ModelRegistry::new();
        let ctx = AnalysisContext::new(&logic, &models);
        assert!(matches!(
            analyze(&ctx, &op(&["a"])),
            Err(Error::Binding { .. })
        ));
    }
}
