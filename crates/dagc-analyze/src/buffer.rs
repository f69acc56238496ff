//! Grouping-buffer analysis.
//!
//! A per-group list input is materialized (re-iterable) unless the operator
//! asks to escape it, in which case the group is volatile and single-pass.
//! `buffer.<port>` overrides `buffer`.

use serde::{Deserialize, Serialize};

use dagc_core::dag::{attr, InputUnit, Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferPolicy {
    Materialize,
    Escape,
}

impl BufferPolicy {
    pub fn is_reiterable(self) -> bool {
        self == BufferPolicy::Materialize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupBuffer {
    pub input: usize,
    pub policy: BufferPolicy,
}

pub fn is_supported(op: &Operator) -> bool {
    matches!(
        op.kind,
        OperatorKind::User(UserKind::CoGroup) | OperatorKind::User(UserKind::GroupSort)
    )
}

pub fn analyze(op: &Operator) -> Result<Vec<GroupBuffer>> {
    if !is_supported(op) {
        return Err(Error::UnsupportedKind(format!(
            "{} has no group buffers",
            op.kind
        )));
    }
    let default = match op.attribute(attr::BUFFER) {
        Some(v) => parse(op, attr::BUFFER, v)?,
        None => BufferPolicy::Materialize,
    };
    let mut buffers = Vec::new();
    for (i, port) in op.inputs.iter().enumerate() {
        if port.unit != InputUnit::Group {
            continue;
        }
        let key = format!("{}{}", attr::BUFFER_PREFIX, port.name);
        let policy = match op.attribute(&key) {
            Some(v) => parse(op, &key, v)?,
            None => default,
        };
        buffers.push(GroupBuffer { input: i, policy });
    }
    Ok(buffers)
}

fn parse(op: &Operator, key: &str, value: &str) -> Result<BufferPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "materialize" => Ok(BufferPolicy::Materialize),
        "escape" => Ok(BufferPolicy::Escape),
        _ => Err(Error::binding(
            op,
            format!("attribute '{}' must be 'materialize' or 'escape', got '{}'", key, value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::dag::Grouping;

    fn cogroup() -> dagc_core::dag::OperatorBuilder {
        Operator::builder(OperatorKind::User(UserKind::CoGroup))
            .group_input("orders", "Order", Grouping::by(["id"]))
            .group_input("items", "Item", Grouping::by(["id"]))
            .table_input("prices", "Price", Grouping::by(["id"]))
    }

    #[test]
    fn defaults_to_materialize() {
        let b = analyze(&cogroup().build()).unwrap();
        assert_eq!(b.len(), 2);
        assert!(b.iter().all(|g| g.policy == BufferPolicy::Materialize));
    }

    #[test]
    fn per_port_escape_overrides_default() {
        let op = cogroup().attribute("buffer.items", "escape").build();
        let b = analyze(&op).unwrap();
        assert_eq!(b[0].policy, BufferPolicy::Materialize);
        assert_eq!(b[1], GroupBuffer { input: 1, policy: BufferPolicy::Escape });
    }

    #[test]
    fn bad_policy_is_a_binding_error() {
        let op = cogroup().attribute("buffer", "disk").build();
        assert!(matches!(analyze(&op), Err(Error::Binding { .. })));
    }
}
