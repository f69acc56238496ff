//! Data models. Pure data plus the reflector seam used by the analyzers.
//!
//! A data model is a named record type with ordered, typed properties. Joined
//! and summarized models additionally carry the declarations the join/split
//! and summarize analyses read.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Text,
    Date,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::Long | DataType::Float | DataType::Double
        )
    }

    /// Accumulator type for SUM over this type.
    pub fn widened(self) -> Option<DataType> {
        match self {
            DataType::Int | DataType::Long => Some(DataType::Long),
            DataType::Float | DataType::Double => Some(DataType::Double),
            _ => None,
        }
    }

    /// MAX/MIN need a total order.
    pub fn is_ordered(self) -> bool {
        !matches!(self, DataType::Boolean)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub data_type: DataType,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Aggregation policy of one summarized property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Aggregation {
    Any,
    Sum,
    Count,
    Max,
    Min,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Aggregation::Any => "ANY",
            Aggregation::Sum => "SUM",
            Aggregation::Count => "COUNT",
            Aggregation::Max => "MAX",
            Aggregation::Min => "MIN",
        };
        f.write_str(s)
    }
}

/// `source` property of a term model feeds `destination` of the declaring model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPair {
    pub source: String,
    pub destination: String,
}

/// One side of a joined model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTerm {
    /// Name of the term's source model.
    pub source: String,
    pub mappings: Vec<PropertyPair>,
    /// Join key, in source-model property names.
    pub key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedModel {
    pub terms: Vec<JoinTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldingDecl {
    pub aggregation: Aggregation,
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizedModel {
    pub source: String,
    pub foldings: Vec<FoldingDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelKind {
    #[default]
    Plain,
    Joined(JoinedModel),
    Summarized(SummarizedModel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataModel {
    pub name: String,
    pub properties: Vec<Property>,
    #[serde(default)]
    pub kind: ModelKind,
}

impl DataModel {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: vec![],
            kind: ModelKind::Plain,
        }
    }

    pub fn with(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.properties.push(Property::new(name, data_type));
        self
    }

    pub fn joined(mut self, terms: Vec<JoinTerm>) -> Self {
        self.kind = ModelKind::Joined(JoinedModel { terms });
        self
    }

    pub fn summarized(mut self, source: impl Into<String>, foldings: Vec<FoldingDecl>) -> Self {
        self.kind = ModelKind::Summarized(SummarizedModel {
            source: source.into(),
            foldings,
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Index and type of a property, or a model error naming both sides.
    pub fn require(&self, name: &str) -> Result<(usize, DataType)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .map(|(i, p)| (i, p.data_type))
            .ok_or_else(|| {
                Error::Model(format!("model '{}' has no property '{}'", self.name, name))
            })
    }

    /// A record of this model with every property unset.
    pub fn new_record(&self) -> Record {
        Record::new(&self.name, self.properties.len())
    }

    /// Build a record from `(property, value)` pairs; unnamed properties stay unset.
    pub fn record<'a>(&self, values: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Record> {
        let mut record = self.new_record();
        for (name, value) in values {
            let (index, data_type) = self.require(name)?;
            if let Some(actual) = value.data_type() {
                if actual != data_type {
                    return Err(Error::Model(format!(
                        "property '{}.{}' is {}, got {}",
                        self.name, name, data_type, actual
                    )));
                }
            }
            record.set(index, value);
        }
        Ok(record)
    }

    pub fn as_joined(&self) -> Option<&JoinedModel> {
        match &self.kind {
            ModelKind::Joined(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_summarized(&self) -> Option<&SummarizedModel> {
        match &self.kind {
            ModelKind::Summarized(s) => Some(s),
            _ => None,
        }
    }
}

/// Data-model reflector: resolves a port's data type to its declaration.
pub trait ModelReflector: Send + Sync {
    fn model(&self, name: &str) -> Result<Arc<DataModel>>;
}

/// In-memory reflector.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<DataModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: DataModel) -> Arc<DataModel> {
        let model = Arc::new(model);
        self.models.insert(model.name.clone(), Arc::clone(&model));
        model
    }

    pub fn with(mut self, model: DataModel) -> Self {
        self.register(model);
        self
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelReflector for ModelRegistry {
    fn model(&self, name: &str) -> Result<Arc<DataModel>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Model(format!("unknown data model '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_rejects_mismatched_types() {
        let m = DataModel::plain("Item")
            .with("key", DataType::Long)
            .with("name", DataType::Text);
        assert!(m.record([("key", Value::Long(1))]).is_ok());
        assert!(m.record([("key", Value::Text("x".into()))]).is_err());
        assert!(m.record([("nope", Value::Long(1))]).is_err());
    }

    #[test]
    fn widened_sum_types() {
        assert_eq!(DataType::Int.widened(), Some(DataType::Long));
        assert_eq!(DataType::Float.widened(), Some(DataType::Double));
        assert_eq!(DataType::Text.widened(), None);
    }

    #[test]
    fn registry_reports_unknown_models() {
        let reg = ModelRegistry::new().with(DataModel::plain("A"));
        assert!(reg.model("A").is_ok());
        assert!(matches!(reg.model("B"), Err(Error::Model(_))));
    }
}
