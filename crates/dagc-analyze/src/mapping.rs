//! Derived facts shared by the join, split, summarize and projective analyses.

use std::fmt;

use serde::{Deserialize, Serialize};

use dagc_core::dag::PortRef;
use dagc_core::schema::{Aggregation, DataType};

/// `(source port, source property) -> (destination port, destination property)`.
/// Outside foldings both sides have the same property type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyMapping {
    pub source_port: PortRef,
    pub source: String,
    pub destination_port: PortRef,
    pub destination: String,
    /// Property type; for a folding this is the source side's type.
    pub data_type: DataType,
}

impl PropertyMapping {
    /// The same mapping, read in the other direction.
    pub fn reversed(&self) -> PropertyMapping {
        PropertyMapping {
            source_port: self.destination_port,
            source: self.destination.clone(),
            destination_port: self.source_port,
            destination: self.source.clone(),
            data_type: self.data_type,
        }
    }
}

impl fmt::Display for PropertyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source_port, self.source, self.destination_port, self.destination
        )
    }
}

/// A mapping plus how partial aggregates of the destination combine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyFolding {
    pub mapping: PropertyMapping,
    pub aggregation: Aggregation,
    /// Destination type (COUNT: Long, SUM: widened source type).
    pub destination_type: DataType,
}
