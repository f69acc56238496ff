//! Arena graph of operators addressed by stable `OperatorId`s.
//!
//! Nodes are never mutated or removed. `replace` allocates a new node,
//! rewires every connection of the old node to it, and leaves the old node
//! orphaned (still addressable, no longer live).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dag::Operator;
use crate::error::{Error, Result};
use crate::id::OperatorId;

/// `upstream` output port feeds `downstream` input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub upstream: OperatorId,
    pub output: usize,
    pub downstream: OperatorId,
    pub input: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorGraph {
    nodes: Vec<Operator>,
    live: Vec<bool>,
    edges: Vec<Connection>,
    /// Orphaned node -> the node that replaced it.
    #[serde(default)]
    replaced: BTreeMap<OperatorId, OperatorId>,
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operator and return its id (the operator's `id` is overwritten).
    pub fn add(&mut self, mut op: Operator) -> OperatorId {
        let id = OperatorId::new(self.nodes.len() as u64);
        op.id = id;
        self.nodes.push(op);
        self.live.push(true);
        id
    }

    pub fn connect(
        &mut self,
        upstream: OperatorId,
        output: usize,
        downstream: OperatorId,
        input: usize,
    ) -> Result<()> {
        let up = self.get(upstream)?;
        if output >= up.outputs.len() {
            return Err(Error::shape(up, format!("no output port {}", output)));
        }
        let down = self.get(downstream)?;
        if input >= down.inputs.len() {
            return Err(Error::shape(down, format!("no input port {}", input)));
        }
        let (up_ty, down_ty) = (&up.outputs[output].data_type, &down.inputs[input].data_type);
        if up_ty != down_ty {
            return Err(Error::shape(
                down,
                format!(
                    "input {} expects '{}' but {} produces '{}'",
                    input, down_ty, up, up_ty
                ),
            ));
        }
        self.edges.push(Connection {
            upstream,
            output,
            downstream,
            input,
        });
        Ok(())
    }

    /// Any node ever allocated, live or orphaned.
    pub fn get(&self, id: OperatorId) -> Result<&Operator> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| Error::Invariant(format!("unknown operator {}", id)))
    }

    pub fn is_live(&self, id: OperatorId) -> bool {
        self.live.get(id.index()).copied().unwrap_or(false)
    }

    /// Live operators in allocation order.
    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.nodes
            .iter()
            .zip(self.live.iter())
            .filter(|(_, live)| **live)
            .map(|(op, _)| op)
    }

    /// The live node standing for `id`, following replacements.
    pub fn current(&self, mut id: OperatorId) -> OperatorId {
        while let Some(next) = self.replaced.get(&id) {
            id = *next;
        }
        id
    }

    pub fn len(&self) -> usize {
        self.operators().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connections(&self) -> &[Connection] {
        &self.edges
    }

    /// Downstream `(operator, input)` pairs fed by one output port.
    pub fn consumers(&self, id: OperatorId, output: usize) -> Vec<(OperatorId, usize)> {
        self.edges
            .iter()
            .filter(|c| c.upstream == id && c.output == output)
            .map(|c| (c.downstream, c.input))
            .collect()
    }

    /// Upstream `(operator, output)` pairs feeding one input port.
    pub fn producers(&self, id: OperatorId, input: usize) -> Vec<(OperatorId, usize)> {
        self.edges
            .iter()
            .filter(|c| c.downstream == id && c.input == input)
            .map(|c| (c.upstream, c.output))
            .collect()
    }

    /// Swap `old` for `replacement`; port counts must agree so every edge
    /// can be carried over by index.
    pub fn replace(&mut self, old: OperatorId, replacement: Operator) -> Result<OperatorId> {
        let previous = self.get(old)?;
        if !self.is_live(old) {
            return Err(Error::Invariant(format!("{} was already replaced", previous)));
        }
        if previous.inputs.len() != replacement.inputs.len()
            || previous.outputs.len() != replacement.outputs.len()
        {
            return Err(Error::shape(
                previous,
                "replacement must keep the same number of ports",
            ));
        }
        let id = self.add(replacement);
        for c in &mut self.edges {
            if c.upstream == old {
                c.upstream = id;
            }
            if c.downstream == old {
                c.downstream = id;
            }
        }
        self.live[old.index()] = false;
        self.replaced.insert(old, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{CoreKind, OperatorKind};

    fn checkpoint(ty: &str) -> Operator {
        Operator::builder(OperatorKind::Core(CoreKind::Checkpoint))
            .input("in", ty)
            .output("out", ty)
            .build()
    }

    #[test]
    fn replace_rewires_and_orphans() {
        let mut g = OperatorGraph::new();
        let a = g.add(checkpoint("M"));
        let b = g.add(checkpoint("M"));
        let c = g.add(checkpoint("M"));
        g.connect(a, 0, b, 0).unwrap();
        g.connect(b, 0, c, 0).unwrap();

        let b2 = g.replace(b, checkpoint("M")).unwrap();
        assert!(!g.is_live(b));
        assert!(g.is_live(b2));
        assert_eq!(g.consumers(a, 0), vec![(b2, 0)]);
        assert_eq!(g.producers(c, 0), vec![(b2, 0)]);
        assert_eq!(g.len(), 3);
        assert_eq!(g.current(b), b2);
        assert_eq!(g.current(a), a);
        assert!(g.replace(b, checkpoint("M")).is_err());
    }

    #[test]
    fn connect_checks_types() {
        let mut g = OperatorGraph::new();
        let a = g.add(checkpoint("M"));
        let b = g.add(checkpoint("N"));
        assert!(matches!(g.connect(a, 0, b, 0), Err(Error::Shape { .. })));
        assert!(g.connect(a, 3, a, 0).is_err());
    }
}
