#![forbid(unsafe_code)]
//! dagc-analyze: semantic analyzers for operator shapes and declared metadata.
//!
//! Every analyzer is a pure function `(context, operator) -> facts` gated by
//! an `is_supported` kind test. Analyzers never mutate an operator; the only
//! rewrite in this crate (`rules`) builds replacement operators and swaps
//! them into the arena graph.
//!
//! Facts recovered here:
//!     * branch case -> output port mapping (`branch`)
//!     * per-group buffer policy (`buffer`)
//!     * logging level (`logging`)
//!     * master-selection method (`selection`)
//!     * join / split property mappings (`join`)
//!     * summarize foldings and the grouping-key patch (`summarize`)
//!     * core projective mappings (`projective`)

use dagc_core::logic::LogicResolver;
use dagc_core::schema::ModelReflector;

pub mod branch;
pub mod buffer;
pub mod join;
pub mod logging;
pub mod mapping;
pub mod naming;
pub mod projective;
pub mod rules;
pub mod selection;
pub mod shape;
pub mod summarize;

pub use mapping::{PropertyFolding, PropertyMapping};

/// External collaborators every analyzer may consult.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub logic: &'a dyn LogicResolver,
    pub models: &'a dyn ModelReflector,
    /// Reject leftover destination properties in split resolution.
    pub split_strict: bool,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(logic: &'a dyn LogicResolver, models: &'a dyn ModelReflector) -> Self {
        Self {
            logic,
            models,
            split_strict: false,
        }
    }

    pub fn strict_split(mut self, strict: bool) -> Self {
        self.split_strict = strict;
        self
    }
}
