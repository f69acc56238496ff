//! Compiled processing units and the builder that assembles them.

use std::fmt;

use serde::{Deserialize, Serialize};

use dagc_core::hash::Hash256;
use dagc_core::id::UnitId;
use dagc_core::logic::MethodRef;
use dagc_core::manifest::UnitEntry;
use dagc_core::schema::DataType;

use crate::ir::{DepSlot, InputShape, Local, MethodSlot, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    /// Accepts one input of the operator itself.
    Operation,
    /// Source record -> partial aggregate.
    Mapper,
    /// Two partial aggregates -> one, in place on the left.
    Combiner,
    /// Deep copy of a partial aggregate.
    Copier,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitRole::Operation => "operation",
            UnitRole::Mapper => "mapper",
            UnitRole::Combiner => "combiner",
            UnitRole::Copier => "copier",
        };
        f.write_str(s)
    }
}

/// One construction parameter of a unit, in the unit's fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    /// Successor of output port `output`.
    Sink { output: usize, data_type: String },
    /// Side-table bound to input port `input`.
    Table { input: usize, data_type: String },
    /// Runtime context (logging).
    Context,
    /// Value of operator argument `index`.
    Argument { index: usize, data_type: DataType },
}

/// Companion units of an aggregate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companions {
    pub mapper: Option<UnitId>,
    pub combiner: UnitId,
    pub copier: UnitId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub id: UnitId,
    pub name: String,
    pub key_digest: Hash256,
    pub role: UnitRole,
    pub input: InputShape,
    pub parameters: Vec<Parameter>,
    pub methods: Vec<MethodRef>,
    pub locals: usize,
    pub body: Vec<Stmt>,
    pub companions: Option<Companions>,
}

impl CompiledUnit {
    pub fn entry(&self) -> UnitEntry {
        UnitEntry {
            id: self.id,
            name: self.name.clone(),
            role: self.role.to_string(),
            key_digest: self.key_digest,
        }
    }

    pub fn sinks(&self) -> impl Iterator<Item = (DepSlot, usize)> + '_ {
        self.parameters
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                Parameter::Sink { output, .. } => Some((DepSlot(i), *output)),
                _ => None,
            })
    }
}

/// A unit before the cache gives it an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDraft {
    pub role: UnitRole,
    pub input: InputShape,
    pub parameters: Vec<Parameter>,
    pub methods: Vec<MethodRef>,
    pub locals: usize,
    pub body: Vec<Stmt>,
    pub companions: Option<Companions>,
}

impl UnitDraft {
    pub fn seal(self, id: UnitId, name: String, key_digest: Hash256) -> CompiledUnit {
        CompiledUnit {
            id,
            name,
            key_digest,
            role: self.role,
            input: self.input,
            parameters: self.parameters,
            methods: self.methods,
            locals: self.locals,
            body: self.body,
            companions: self.companions,
        }
    }
}

/// Assembles one unit.
///
/// Locals bound by the input shape are reserved up front. Methods are
/// deduplicated so each is bound once per unit instance.
#[derive(Debug)]
pub struct UnitBuilder {
    role: UnitRole,
    input: InputShape,
    parameters: Vec<Parameter>,
    methods: Vec<MethodRef>,
    locals: usize,
    body: Vec<Stmt>,
    companions: Option<Companions>,
}

impl UnitBuilder {
    pub fn new(role: UnitRole, input: InputShape) -> Self {
        let locals = match input {
            InputShape::Record => 1,
            InputShape::Pair => 2,
            InputShape::Groups { .. } => 0,
        };
        Self {
            role,
            input,
            parameters: vec![],
            methods: vec![],
            locals,
            body: vec![],
            companions: None,
        }
    }

    pub fn operation(input: InputShape) -> Self {
        Self::new(UnitRole::Operation, input)
    }

    /// The record bound on entry (`Record` input).
    pub fn input_record(&self) -> Local {
        Local(0)
    }

    pub fn local(&mut self) -> Local {
        let l = Local(self.locals);
        self.locals += 1;
        l
    }

    pub fn parameter(&mut self, p: Parameter) -> DepSlot {
        self.parameters.push(p);
        DepSlot(self.parameters.len() - 1)
    }

    pub fn method(&mut self, m: &MethodRef) -> MethodSlot {
        if let Some(i) = self.methods.iter().position(|x| x == m) {
            return MethodSlot(i);
        }
        self.methods.push(m.clone());
        MethodSlot(self.methods.len() - 1)
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.body.push(stmt);
    }

    pub fn extend(&mut self, stmts: impl IntoIterator<Item = Stmt>) {
        self.body.extend(stmts);
    }

    pub fn companions(&mut self, c: Companions) {
        self.companions = Some(c);
    }

    pub fn finish(self) -> UnitDraft {
        UnitDraft {
            role: self.role,
            input: self.input,
            parameters: self.parameters,
            methods: self.methods,
            locals: self.locals,
            body: self.body,
            companions: self.companions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_are_deduplicated() {
        let mut b = UnitBuilder::operation(InputShape::Record);
        let m = MethodRef::new("Ops", "f");
        let a = b.method(&m);
        let c = b.method(&m);
        assert_eq!(a, c);
        assert_eq!(b.finish().methods.len(), 1);
    }

    #[test]
    fn pair_input_reserves_two_locals() {
        let mut b = UnitBuilder::new(UnitRole::Combiner, InputShape::Pair);
        assert_eq!(b.local(), Local(2));
    }
}
