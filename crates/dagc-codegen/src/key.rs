//! Structural cache keys.
//!
//! A key fingerprints everything generation depends on: the kind tag,
//! declared attributes, the user-logic reference, port names, data types
//! and groupings, and argument *types*. Port names enter normalized: branch
//! routing and buffer attributes resolve through them. Argument values and the execution
//! strategy enter only where a generator asks for them. Operator ids never
//! do, so structurally equal operators share one unit.

use serde::Serialize;

use dagc_analyze::naming::normalize;
use dagc_core::dag::{Grouping, InputUnit, Operator};
use dagc_core::error::Result;
use dagc_core::hash::{hash_serde, hash_values, Hash256};
use dagc_core::logic::MethodRef;
use dagc_core::schema::DataType;

use crate::unit::UnitRole;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum KeyElement {
    Kind(&'static str),
    Attribute(String, String),
    Method(MethodRef),
    Input {
        name: String,
        data_type: String,
        unit: InputUnit,
        grouping: Option<Grouping>,
    },
    Output {
        name: String,
        data_type: String,
    },
    ArgumentType(DataType),
    /// Digest of one argument value.
    ArgumentValue(Hash256),
    Strategy(&'static str),
    Role(UnitRole),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    elements: Vec<KeyElement>,
}

impl CacheKey {
    /// The structural signature shared by every kind.
    pub fn of(op: &Operator) -> CacheKey {
        let mut elements = vec![KeyElement::Kind(op.kind.tag())];
        elements.extend(
            op.attributes
                .iter()
                .map(|(k, v)| KeyElement::Attribute(k.clone(), v.clone())),
        );
        if let Some(m) = &op.method {
            elements.push(KeyElement::Method(m.clone()));
        }
        elements.extend(op.inputs.iter().map(|p| KeyElement::Input {
            name: normalize(&p.name),
            data_type: p.data_type.clone(),
            unit: p.unit,
            grouping: p.grouping.clone(),
        }));
        elements.extend(op.outputs.iter().map(|p| KeyElement::Output {
            name: normalize(&p.name),
            data_type: p.data_type.clone(),
        }));
        elements.extend(
            op.arguments
                .iter()
                .map(|a| KeyElement::ArgumentType(a.data_type)),
        );
        CacheKey { elements }
    }

    /// Add argument values (for kinds that bake them into the unit).
    pub fn with_argument_values(mut self, op: &Operator) -> CacheKey {
        self.elements.extend(
            op.arguments
                .iter()
                .map(|a| KeyElement::ArgumentValue(hash_values([&a.value]))),
        );
        self
    }

    pub fn with(mut self, element: KeyElement) -> CacheKey {
        self.elements.push(element);
        self
    }

    /// Same signature, addressed to a companion unit.
    pub fn for_role(&self, role: UnitRole) -> CacheKey {
        self.clone().with(KeyElement::Role(role))
    }

    pub fn elements(&self) -> &[KeyElement] {
        &self.elements
    }

    pub fn digest(&self) -> Result<Hash256> {
        hash_serde(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::dag::{OperatorKind, UserKind};
    use dagc_core::types::Value;

    fn update(arg: i32, id: u64) -> Operator {
        let mut op = Operator::builder(OperatorKind::User(UserKind::Update))
            .method(MethodRef::new("Ops", "bump"))
            .input("in", "M")
            .output("out", "M")
            .argument("n", Value::Int(arg))
            .build();
        op.id = dagc_core::id::OperatorId::new(id);
        op
    }

    #[test]
    fn ids_and_argument_values_do_not_matter_by_default() {
        assert_eq!(CacheKey::of(&update(1, 1)), CacheKey::of(&update(2, 7)));
    }

    #[test]
    fn argument_values_matter_when_requested() {
        let a = CacheKey::of(&update(1, 1)).with_argument_values(&update(1, 1));
        let b = CacheKey::of(&update(2, 1)).with_argument_values(&update(2, 1));
        assert_ne!(a, b);
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    fn branch(outputs: [&str; 2]) -> Operator {
        Operator::builder(OperatorKind::User(UserKind::Branch))
            .method(MethodRef::new("Ops", "grade"))
            .input("in", "M")
            .output(outputs[0], "M")
            .output(outputs[1], "M")
            .build()
    }

    #[test]
    fn output_names_are_part_of_the_key() {
        assert_ne!(CacheKey::of(&branch(["a", "b"])), CacheKey::of(&branch(["b", "a"])));
        // spelled differently, routed the same
        assert_eq!(
            CacheKey::of(&branch(["high_price", "low"])),
            CacheKey::of(&branch(["highPrice", "LOW"]))
        );
    }

    #[test]
    fn roles_address_distinct_units() {
        let k = CacheKey::of(&update(1, 1));
        assert_ne!(k.for_role(UnitRole::Combiner), k.for_role(UnitRole::Copier));
    }
}
