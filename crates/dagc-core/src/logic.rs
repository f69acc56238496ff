//! User logic: method references, their shapes, and the resolver seam.
//!
//! The compiler only needs *shapes* (what a method takes and returns). The
//! reference runtime later asks the same resolver to *bind* the reference
//! to something it can invoke.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::DataType;
use crate::table::DataTable;
use crate::types::{Record, Value};

/// Reference to a declared operator method: `Owner#name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse the `Owner#name` form used in attributes.
    pub fn parse(s: &str) -> Option<Self> {
        let (owner, name) = s.split_once('#')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterShape {
    /// One record (mutable in place).
    Record(String),
    /// All records of one group.
    Group(String),
    /// A keyed side-table.
    Table(String),
    /// An output sink the method emits into.
    Result(String),
    /// A scalar operator argument.
    Argument(DataType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnShape {
    Void,
    Value(DataType),
    /// An enumerated selector with its case names, in declaration order.
    Enum { name: String, cases: Vec<String> },
    /// A freshly built record of the named model.
    Record(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodShape {
    pub declaring: String,
    pub parameters: Vec<ParameterShape>,
    pub returns: ReturnShape,
}

impl MethodShape {
    pub fn new(declaring: impl Into<String>, returns: ReturnShape) -> Self {
        Self {
            declaring: declaring.into(),
            parameters: vec![],
            returns,
        }
    }

    pub fn param(mut self, p: ParameterShape) -> Self {
        self.parameters.push(p);
        self
    }

    pub fn count(&self, pred: impl Fn(&ParameterShape) -> bool) -> usize {
        self.parameters.iter().filter(|p| pred(p)).count()
    }
}

/// One group handed to a method.
#[derive(Debug, Clone, Default)]
pub struct GroupInput {
    pub records: Vec<Record>,
    /// `false` when the group was escaped and may be walked only once.
    pub reiterable: bool,
}

/// Everything a user method sees for one call.
///
/// Records are moved in and written back after the call, so the method may
/// mutate them freely. `results[i]` collects records emitted to result `i`.
#[derive(Debug, Default)]
pub struct Invocation {
    pub records: Vec<Record>,
    pub groups: Vec<GroupInput>,
    pub tables: Vec<Arc<DataTable>>,
    pub arguments: Vec<Value>,
    pub results: Vec<Vec<Record>>,
    pub returned: Option<Record>,
}

impl Invocation {
    pub fn emit(&mut self, result: usize, record: Record) {
        if result >= self.results.len() {
            self.results.resize_with(result + 1, Vec::new);
        }
        self.results[result].push(record);
    }

    /// Return a freshly built record (Convert-style methods).
    pub fn returning(&mut self, record: Record) {
        self.returned = Some(record);
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    pub fn argument(&self, index: usize) -> &Value {
        self.arguments.get(index).unwrap_or(&Value::Null)
    }
}

/// Something the runtime can call.
pub trait UserMethod: Send + Sync {
    fn invoke(&self, call: &mut Invocation) -> std::result::Result<Value, String>;
}

impl<F> UserMethod for F
where
    F: Fn(&mut Invocation) -> std::result::Result<Value, String> + Send + Sync,
{
    fn invoke(&self, call: &mut Invocation) -> std::result::Result<Value, String> {
        self(call)
    }
}

/// Runtime-logic resolver.
pub trait LogicResolver: Send + Sync {
    /// Parameter/return shape and declaring type of a method.
    fn resolve(&self, method: &MethodRef) -> Result<MethodShape>;

    /// Bind a method for invocation.
    fn bind(&self, method: &MethodRef) -> Result<Arc<dyn UserMethod>>;
}

/// In-memory resolver.
#[derive(Default, Clone)]
pub struct LogicRegistry {
    entries: HashMap<MethodRef, (MethodShape, Arc<dyn UserMethod>)>,
}

impl LogicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, method: MethodRef, shape: MethodShape, f: F)
    where
        F: Fn(&mut Invocation) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let f: Arc<dyn UserMethod> = Arc::new(f);
        self.entries.insert(method, (shape, f));
    }

    pub fn with<F>(mut self, method: MethodRef, shape: MethodShape, f: F) -> Self
    where
        F: Fn(&mut Invocation) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.register(method, shape, f);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for LogicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicRegistry")
            .field("methods", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LogicResolver for LogicRegistry {
    fn resolve(&self, method: &MethodRef) -> Result<MethodShape> {
        self.entries
            .get(method)
            .map(|(shape, _)| shape.clone())
            .ok_or_else(|| Error::resolution(method, "no such operator method"))
    }

    fn bind(&self, method: &MethodRef) -> Result<Arc<dyn UserMethod>> {
        self.entries
            .get(method)
            .map(|(_, f)| Arc::clone(f))
            .ok_or_else(|| Error::resolution(method, "no such operator method"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_refs() {
        assert_eq!(
            MethodRef::parse("Ops#pick"),
            Some(MethodRef::new("Ops", "pick"))
        );
        assert_eq!(MethodRef::parse("Ops"), None);
        assert_eq!(MethodRef::parse("#pick"), None);
    }

    #[test]
    fn registry_resolves_and_binds() {
        let m = MethodRef::new("Ops", "twice");
        let reg = LogicRegistry::new().with(
            m.clone(),
            MethodShape::new("Ops", ReturnShape::Value(DataType::Long))
                .param(ParameterShape::Argument(DataType::Long)),
            |call: &mut Invocation| {
                let v = call.argument(0).as_long().unwrap_or(0);
                Ok(Value::Long(v * 2))
            },
        );
        assert_eq!(reg.resolve(&m).unwrap().parameters.len(), 1);
        let f = reg.bind(&m).unwrap();
        let mut call = Invocation {
            arguments: vec![Value::Long(21)],
            ..Default::default()
        };
        assert_eq!(f.invoke(&mut call).unwrap(), Value::Long(42));

        let missing = MethodRef::new("Ops", "none");
        assert!(matches!(
            reg.resolve(&missing),
            Err(Error::Resolution { .. })
        ));
    }
}
