//! Nodes of the per-vertex wiring graph.

use std::fmt;

use dagc_codegen::NodeInfo;
use dagc_core::id::ElementId;
use dagc_core::types::Value;

/// What one slot of a fused operation holds.
#[derive(Debug, Clone)]
pub enum DependencyElement {
    Literal(Value),
    /// A compiled operator unit.
    Operator(NodeInfo),
    /// An aggregate operation unit with its mapper/combiner/copier.
    Aggregate(NodeInfo),
    /// Vertex output `index`, supplied by the runtime.
    Output { index: usize, data_type: String },
    /// Vertex side-table `index`, supplied by the runtime.
    DataTable { index: usize, data_type: String },
    Context,
    /// Stands in for a side input nothing is bound to.
    EmptyTable { data_type: String },
    /// Hands each record to every dependency, one copy each. With no
    /// dependencies the records are dropped.
    Fanout { data_type: String },
}

impl DependencyElement {
    pub fn label(&self) -> &'static str {
        match self {
            DependencyElement::Literal(_) => "literal",
            DependencyElement::Operator(_) => "operator",
            DependencyElement::Aggregate(_) => "aggregate",
            DependencyElement::Output { .. } => "output",
            DependencyElement::DataTable { .. } => "table",
            DependencyElement::Context => "context",
            DependencyElement::EmptyTable { .. } => "empty_table",
            DependencyElement::Fanout { .. } => "fanout",
        }
    }

    /// The compiled node, for operator and aggregate elements.
    pub fn node(&self) -> Option<&NodeInfo> {
        match self {
            DependencyElement::Operator(n) | DependencyElement::Aggregate(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyElement::Literal(v) => write!(f, "literal {}", v),
            DependencyElement::Operator(n) | DependencyElement::Aggregate(n) => {
                write!(f, "{} {}", self.label(), n.unit.name)
            }
            DependencyElement::Output { index, data_type }
            | DependencyElement::DataTable { index, data_type } => {
                write!(f, "{} {} : {}", self.label(), index, data_type)
            }
            DependencyElement::Context => f.write_str("context"),
            DependencyElement::EmptyTable { data_type } | DependencyElement::Fanout { data_type } => {
                write!(f, "{} : {}", self.label(), data_type)
            }
        }
    }
}

/// One element plus the elements it is constructed from, in parameter order.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub kind: DependencyElement,
    pub dependencies: Vec<ElementId>,
}
