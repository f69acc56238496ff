//! Dependency-first ordering of wiring elements.
//!
//! An element can be constructed only after every element it depends on, so
//! construction follows a topological order of the `dependency -> dependent`
//! edges. Among ready elements the smallest id goes first, which makes the
//! order (and therefore slot numbering) deterministic.

use std::collections::{BTreeSet, HashMap};

use dagc_core::error::{Error, Result};
use dagc_core::id::ElementId;

use crate::element::Element;

/// Kahn-style tracker over `dependency -> dependent` edges.
pub struct OrderTracker {
    pending: HashMap<ElementId, usize>,
    dependents: HashMap<ElementId, Vec<ElementId>>,
    ready: BTreeSet<ElementId>,
    emitted: usize,
}

impl OrderTracker {
    pub fn new(elements: &[Element]) -> Self {
        let mut pending: HashMap<ElementId, usize> = HashMap::new();
        let mut dependents: HashMap<ElementId, Vec<ElementId>> = HashMap::new();

        for e in elements {
            pending.entry(e.id).or_default();
            for d in &e.dependencies {
                *pending.entry(e.id).or_default() += 1;
                dependents.entry(*d).or_default().push(e.id);
                pending.entry(*d).or_default();
            }
        }

        let ready: BTreeSet<ElementId> = pending
            .iter()
            .filter_map(|(e, &n)| if n == 0 { Some(*e) } else { None })
            .collect();

        Self {
            pending,
            dependents,
            ready,
            emitted: 0,
        }
    }

    /// Emit the smallest ready element and release its dependents.
    pub fn step(&mut self) -> Option<ElementId> {
        let e = self.ready.pop_first()?;
        self.emitted += 1;
        if let Some(next) = self.dependents.get(&e) {
            for v in next {
                if let Some(n) = self.pending.get_mut(v) {
                    *n -= 1;
                    if *n == 0 {
                        self.ready.insert(*v);
                    }
                }
            }
        }
        Some(e)
    }

    fn is_complete(&self) -> bool {
        self.emitted == self.pending.len()
    }

    /// Elements still waiting on a dependency (the members of any cycle).
    fn blocked(&self) -> Vec<ElementId> {
        let mut out: Vec<_> = self
            .pending
            .iter()
            .filter_map(|(e, &n)| if n > 0 { Some(*e) } else { None })
            .collect();
        out.sort_unstable();
        out
    }
}

/// Every element, dependencies first. A cycle is an invariant failure.
pub fn topological(elements: &[Element]) -> Result<Vec<ElementId>> {
    let mut tracker = OrderTracker::new(elements);
    let mut order = Vec::with_capacity(elements.len());
    while let Some(e) = tracker.step() {
        order.push(e);
    }
    if !tracker.is_complete() {
        let blocked: Vec<String> = tracker.blocked().iter().map(|e| e.to_string()).collect();
        return Err(Error::Invariant(format!(
            "dependency cycle among {}",
            blocked.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DependencyElement;

    fn el(id: u64, deps: &[u64]) -> Element {
        Element {
            id: ElementId::new(id),
            kind: DependencyElement::Context,
            dependencies: deps.iter().map(|d| ElementId::new(*d)).collect(),
        }
    }

    #[test]
    fn dependencies_come_first() {
        // 0 -> {1, 2}, 1 -> 3, 2 -> 3
        let elements = vec![el(0, &[1, 2]), el(1, &[3]), el(2, &[3]), el(3, &[])];
        let order = topological(&elements).unwrap();
        let ids: Vec<u64> = order.iter().map(|e| e.get()).collect();
        assert_eq!(ids, vec![3, 1, 2, 0]);
    }

    #[test]
    fn ties_break_by_id() {
        let elements = vec![el(5, &[]), el(2, &[]), el(9, &[])];
        let ids: Vec<u64> = topological(&elements)
            .unwrap()
            .iter()
            .map(|e| e.get())
            .collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn cycles_are_fatal() {
        let elements = vec![el(0, &[1]), el(1, &[0]), el(2, &[])];
        let err = topological(&elements).unwrap_err();
        assert!(matches!(err, Error::Invariant(ref m) if m.contains("ElementId(0)")));
    }
}
