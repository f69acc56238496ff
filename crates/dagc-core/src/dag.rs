//! Operator model: kinds, ports, arguments and declared attributes.
//!
//! Operators are immutable once built. The graph (`crate::graph`) assigns
//! their ids; a "patch" builds a new operator and swaps it in.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::id::OperatorId;
use crate::logic::MethodRef;
use crate::schema::DataType;
use crate::types::Value;

/// Kinds built into the compiler itself (no user logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoreKind {
    Project,
    Extend,
    Restructure,
    Checkpoint,
}

/// Kinds backed by a user-declared operator method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserKind {
    Branch,
    Convert,
    Update,
    Extract,
    Logging,
    Split,
    MasterJoin,
    MasterJoinUpdate,
    MasterCheck,
    MasterBranch,
    CoGroup,
    GroupSort,
    Fold,
    Summarize,
}

impl UserKind {
    pub fn is_master_join_family(self) -> bool {
        matches!(
            self,
            UserKind::MasterJoin
                | UserKind::MasterJoinUpdate
                | UserKind::MasterCheck
                | UserKind::MasterBranch
        )
    }

    /// Kinds whose semantics need no operator method.
    pub fn is_declarative(self) -> bool {
        matches!(
            self,
            UserKind::Split | UserKind::MasterJoin | UserKind::MasterCheck | UserKind::Summarize
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OperatorKind {
    Core(CoreKind),
    User(UserKind),
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 18] = [
        OperatorKind::Core(CoreKind::Project),
        OperatorKind::Core(CoreKind::Extend),
        OperatorKind::Core(CoreKind::Restructure),
        OperatorKind::Core(CoreKind::Checkpoint),
        OperatorKind::User(UserKind::Branch),
        OperatorKind::User(UserKind::Convert),
        OperatorKind::User(UserKind::Update),
        OperatorKind::User(UserKind::Extract),
        OperatorKind::User(UserKind::Logging),
        OperatorKind::User(UserKind::Split),
        OperatorKind::User(UserKind::MasterJoin),
        OperatorKind::User(UserKind::MasterJoinUpdate),
        OperatorKind::User(UserKind::MasterCheck),
        OperatorKind::User(UserKind::MasterBranch),
        OperatorKind::User(UserKind::CoGroup),
        OperatorKind::User(UserKind::GroupSort),
        OperatorKind::User(UserKind::Fold),
        OperatorKind::User(UserKind::Summarize),
    ];

    /// Stable textual tag (`core.project`, `user.master_join`, ...).
    pub fn tag(self) -> &'static str {
        use CoreKind as C;
        use UserKind as U;
        match self {
            OperatorKind::Core(C::Project) => "core.project",
            OperatorKind::Core(C::Extend) => "core.extend",
            OperatorKind::Core(C::Restructure) => "core.restructure",
            OperatorKind::Core(C::Checkpoint) => "core.checkpoint",
            OperatorKind::User(U::Branch) => "user.branch",
            OperatorKind::User(U::Convert) => "user.convert",
            OperatorKind::User(U::Update) => "user.update",
            OperatorKind::User(U::Extract) => "user.extract",
            OperatorKind::User(U::Logging) => "user.logging",
            OperatorKind::User(U::Split) => "user.split",
            OperatorKind::User(U::MasterJoin) => "user.master_join",
            OperatorKind::User(U::MasterJoinUpdate) => "user.master_join_update",
            OperatorKind::User(U::MasterCheck) => "user.master_check",
            OperatorKind::User(U::MasterBranch) => "user.master_branch",
            OperatorKind::User(U::CoGroup) => "user.co_group",
            OperatorKind::User(U::GroupSort) => "user.group_sort",
            OperatorKind::User(U::Fold) => "user.fold",
            OperatorKind::User(U::Summarize) => "user.summarize",
        }
    }

    pub fn user(self) -> Option<UserKind> {
        match self {
            OperatorKind::User(k) => Some(k),
            OperatorKind::Core(_) => None,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Core(k) => write!(f, "{:?}", k),
            OperatorKind::User(k) => write!(f, "{:?}", k),
        }
    }
}

impl FromStr for OperatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorKind::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == s)
            .ok_or_else(|| Error::UnsupportedKind(s.to_string()))
    }
}

impl TryFrom<String> for OperatorKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OperatorKind> for String {
    fn from(k: OperatorKind) -> Self {
        k.tag().to_string()
    }
}

/// How an input port consumes its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputUnit {
    Record,
    Group,
    /// Broadcast / side data, available in full to every invocation.
    WholeInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderTerm {
    pub property: String,
    pub direction: Direction,
}

/// Grouping key plus the in-group ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Grouping {
    pub keys: Vec<String>,
    #[serde(default)]
    pub ordering: Vec<OrderTerm>,
}

impl Grouping {
    pub fn by<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ordering: vec![],
        }
    }

    pub fn order(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.ordering.push(OrderTerm {
            property: property.into(),
            direction,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    pub data_type: String,
    pub unit: InputUnit,
    #[serde(default)]
    pub grouping: Option<Grouping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Address of one port of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub operator: OperatorId,
    pub direction: PortDirection,
    pub index: usize,
}

impl PortRef {
    pub fn input(operator: OperatorId, index: usize) -> Self {
        Self {
            operator,
            direction: PortDirection::Input,
            index,
        }
    }

    pub fn output(operator: OperatorId, index: usize) -> Self {
        Self {
            operator,
            direction: PortDirection::Output,
            index,
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = match self.direction {
            PortDirection::Input => "in",
            PortDirection::Output => "out",
        };
        write!(f, "{}.{}[{}]", self.operator, d, self.index)
    }
}

/// Declared metadata. Ordered so it hashes and fingerprints stably.
pub type Attributes = BTreeMap<String, String>;

/// Well-known attribute keys.
pub mod attr {
    pub const LOGGING_LEVEL: &str = "logging.level";
    pub const SELECTION: &str = "selection";
    pub const BUFFER: &str = "buffer";
    pub const BUFFER_PREFIX: &str = "buffer.";
    pub const SUMMARIZE_PATCHED: &str = "summarize.patched";
    /// Sentinel for "no selection method".
    pub const NO_SELECTION: &str = "-";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(default = "unassigned")]
    pub id: OperatorId,
    pub kind: OperatorKind,
    #[serde(default)]
    pub method: Option<MethodRef>,
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub attributes: Attributes,
}

fn unassigned() -> OperatorId {
    OperatorId::new(0)
}

impl Operator {
    pub fn builder(kind: OperatorKind) -> OperatorBuilder {
        OperatorBuilder {
            op: Operator {
                id: unassigned(),
                kind,
                method: None,
                inputs: vec![],
                outputs: vec![],
                arguments: vec![],
                attributes: Attributes::new(),
            },
        }
    }

    /// Rebuild this operator (patches start here).
    pub fn to_builder(&self) -> OperatorBuilder {
        OperatorBuilder { op: self.clone() }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn input(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    /// Indices of inputs consumed per record or per group.
    pub fn primary_inputs(&self) -> impl Iterator<Item = (usize, &InputPort)> {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.unit != InputUnit::WholeInput)
    }

    /// Indices of whole-input (side-table) inputs.
    pub fn side_inputs(&self) -> impl Iterator<Item = (usize, &InputPort)> {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.unit == InputUnit::WholeInput)
    }

    pub fn has_side_inputs(&self) -> bool {
        self.side_inputs().next().is_some()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id.get())?;
        if let Some(m) = &self.method {
            write!(f, "({})", m)?;
        }
        Ok(())
    }
}

pub struct OperatorBuilder {
    op: Operator,
}

impl OperatorBuilder {
    pub fn method(mut self, method: MethodRef) -> Self {
        self.op.method = Some(method);
        self
    }

    /// Per-record input.
    pub fn input(self, name: &str, data_type: &str) -> Self {
        self.port(name, data_type, InputUnit::Record, None)
    }

    /// Per-group input.
    pub fn group_input(self, name: &str, data_type: &str, grouping: Grouping) -> Self {
        self.port(name, data_type, InputUnit::Group, Some(grouping))
    }

    /// Whole-input (side-table) input, keyed by `grouping`.
    pub fn table_input(self, name: &str, data_type: &str, grouping: Grouping) -> Self {
        self.port(name, data_type, InputUnit::WholeInput, Some(grouping))
    }

    pub fn port(
        mut self,
        name: &str,
        data_type: &str,
        unit: InputUnit,
        grouping: Option<Grouping>,
    ) -> Self {
        self.op.inputs.push(InputPort {
            name: name.to_string(),
            data_type: data_type.to_string(),
            unit,
            grouping,
        });
        self
    }

    pub fn output(mut self, name: &str, data_type: &str) -> Self {
        self.op.outputs.push(OutputPort {
            name: name.to_string(),
            data_type: data_type.to_string(),
        });
        self
    }

    pub fn argument(mut self, name: &str, value: Value) -> Self {
        let data_type = value.data_type().unwrap_or(DataType::Text);
        self.op.arguments.push(Argument {
            name: name.to_string(),
            data_type,
            value,
        });
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.op.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn replace_input(mut self, index: usize, port: InputPort) -> Self {
        if let Some(slot) = self.op.inputs.get_mut(index) {
            *slot = port;
        }
        self
    }

    pub fn build(self) -> Operator {
        self.op
    }
}
