//! Unit IR: the statement tree a backend lowers.
//!
//! A unit's body runs once per accepted input. Records are positional:
//! every property access is resolved to an index at generation time, so the
//! IR carries no model lookups. Locals are numbered; the input shape
//! decides which locals are bound on entry (see [`InputShape`]).

use serde::{Deserialize, Serialize};

use dagc_analyze::logging::LogLevel;
use dagc_core::schema::Aggregation;
use dagc_core::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Local(pub usize);

/// Index into the unit's construction parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepSlot(pub usize);

/// Index into the unit's invoked-method list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSlot(pub usize);

/// What one call of the unit consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputShape {
    /// One record, bound to local 0.
    Record,
    /// Two records (left, right) bound to locals 0 and 1.
    Pair,
    /// One co-group cursor with `count` record lists, read by `Expr::Group`.
    Groups { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Local(Local),
    Literal(Value),
    /// A literal construction parameter.
    Dependency(DepSlot),
    Property { record: Local, index: usize },
    /// SUM's accumulator type for a numeric value.
    Widen(Box<Expr>),
    /// A record of the named model with every property unset.
    NewRecord { model: String, width: usize },
    /// Deep copy of a record.
    Copy(Local),
    /// Call a user method. Yields the returned record for record-returning
    /// methods, otherwise the returned value.
    Invoke { method: MethodSlot, args: Vec<CallArg> },
    /// Rows of a side-table matching a key.
    Lookup { table: DepSlot, key: Vec<Expr> },
    /// The records of the `i`-th group of the current co-group cursor.
    Group(usize),
    /// Pick one of `candidates` for `subject`: the first one, or the one the
    /// selection method names by index. Unset when there is none.
    Select {
        candidates: Local,
        subject: Local,
        selection: Option<MethodSlot>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn local(l: Local) -> Expr {
        Expr::Local(l)
    }

    pub fn property(record: Local, index: usize) -> Expr {
        Expr::Property { record, index }
    }
}

/// How a user method receives one of its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallArg {
    /// Passed by value and written back into the local after the call.
    Record(Local),
    Group { records: Expr, reiterable: bool },
    Table(DepSlot),
    Argument(Expr),
    /// A sink the method emits into.
    Result(DepSlot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        local: Local,
        value: Expr,
    },
    SetProperty {
        record: Local,
        index: usize,
        value: Expr,
    },
    /// `to[d] = from[s]` for every `(s, d)`.
    CopyProperties {
        from: Local,
        to: Local,
        pairs: Vec<(usize, usize)>,
    },
    /// Fold `source` into `target[index]` under `policy`; unset sources are
    /// ignored.
    Aggregate {
        target: Local,
        index: usize,
        source: Expr,
        policy: Aggregation,
    },
    /// Hand a copy of a record to a sink parameter.
    Emit {
        sink: DepSlot,
        value: Local,
    },
    /// Branch on an enumerated case name. Without a default arm a case
    /// outside `cases` fails the call.
    Switch {
        on: Expr,
        cases: Vec<(String, Vec<Stmt>)>,
        default: Option<Vec<Stmt>>,
    },
    IfNull {
        value: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    ForEach {
        local: Local,
        source: Expr,
        body: Vec<Stmt>,
    },
    Log {
        level: LogLevel,
        context: DepSlot,
        message: Expr,
    },
    /// Finish the call, optionally yielding a record to the caller.
    Return(Option<Local>),
}
