//! Debug-time checks for fused operations.
//!
//! Intended for tests and debug builds: a violation means fusion produced
//! something the runtime cannot construct.

use std::collections::HashSet;

use dagc_core::id::SlotId;

use crate::element::DependencyElement;
use crate::vertex::FusedOperation;

/// Every slot is built only from slots initialized before it.
pub fn assert_dependencies_first(op: &FusedOperation) {
    let mut seen = HashSet::<SlotId>::new();
    for s in &op.slots {
        for a in &s.arguments {
            assert!(
                seen.contains(a),
                "slot {} of {} is built from {} before it exists",
                s.slot,
                op.name,
                a
            );
        }
        seen.insert(s.slot);
    }
}

/// The entry slot holds a compiled unit.
pub fn assert_entry_is_unit(op: &FusedOperation) {
    let entry = op.entry_slot().map(|s| &s.kind);
    assert!(
        matches!(
            entry,
            Some(DependencyElement::Operator(_)) | Some(DependencyElement::Aggregate(_))
        ),
        "entry of {} is {:?}",
        op.name,
        entry.map(|k| k.label())
    );
}
