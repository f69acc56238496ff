//! Kind tag -> generator.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use dagc_core::dag::{CoreKind, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};

use crate::generator::aggregate::AggregateGenerator;
use crate::generator::branch::BranchGenerator;
use crate::generator::cogroup::CoGroupGenerator;
use crate::generator::convert::ConvertGenerator;
use crate::generator::extract::ExtractGenerator;
use crate::generator::logging::LoggingGenerator;
use crate::generator::master_join::MasterJoinGenerator;
use crate::generator::projective::{CheckpointGenerator, ProjectiveGenerator};
use crate::generator::split::SplitGenerator;
use crate::generator::update::UpdateGenerator;
use crate::generator::OperatorGenerator;

static BUILTIN: Lazy<Arc<GeneratorRegistry>> = Lazy::new(|| Arc::new(GeneratorRegistry::new()));

/// The built-in generator for a kind.
fn builtin(kind: OperatorKind) -> Arc<dyn OperatorGenerator> {
    use CoreKind as C;
    use UserKind as U;
    match kind {
        OperatorKind::Core(C::Project | C::Extend | C::Restructure) => Arc::new(ProjectiveGenerator),
        OperatorKind::Core(C::Checkpoint) => Arc::new(CheckpointGenerator),
        OperatorKind::User(U::Branch) => Arc::new(BranchGenerator),
        OperatorKind::User(U::Convert) => Arc::new(ConvertGenerator),
        OperatorKind::User(U::Update) => Arc::new(UpdateGenerator),
        OperatorKind::User(U::Extract) => Arc::new(ExtractGenerator),
        OperatorKind::User(U::Logging) => Arc::new(LoggingGenerator),
        OperatorKind::User(U::Split) => Arc::new(SplitGenerator),
        OperatorKind::User(
            U::MasterJoin | U::MasterJoinUpdate | U::MasterCheck | U::MasterBranch,
        ) => Arc::new(MasterJoinGenerator),
        OperatorKind::User(U::CoGroup | U::GroupSort) => Arc::new(CoGroupGenerator),
        OperatorKind::User(U::Fold | U::Summarize) => Arc::new(AggregateGenerator),
    }
}

#[derive(Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<OperatorKind, Arc<dyn OperatorGenerator>>,
}

impl GeneratorRegistry {
    /// Every built-in generator.
    pub fn new() -> Self {
        Self {
            generators: OperatorKind::ALL
                .iter()
                .map(|k| (*k, builtin(*k)))
                .collect(),
        }
    }

    /// Shared built-in registry.
    pub fn shared() -> Arc<GeneratorRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// An empty registry (embedders register what they support).
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: OperatorKind, generator: Arc<dyn OperatorGenerator>) {
        self.generators.insert(kind, generator);
    }

    pub fn without(mut self, kind: OperatorKind) -> Self {
        self.generators.remove(&kind);
        self
    }

    pub fn get(&self, kind: OperatorKind) -> Result<&dyn OperatorGenerator> {
        self.generators
            .get(&kind)
            .map(|g| g.as_ref())
            .ok_or_else(|| Error::UnsupportedKind(format!("no generator for {}", kind.tag())))
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.generators.keys().map(|k| k.tag()).collect();
        kinds.sort_unstable();
        f.debug_struct("GeneratorRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_builtin_generator() {
        let r = GeneratorRegistry::shared();
        assert_eq!(r.len(), OperatorKind::ALL.len());
        for k in OperatorKind::ALL {
            assert!(r.get(k).is_ok(), "{}", k);
        }
        assert_eq!(
            r.get(OperatorKind::User(UserKind::MasterCheck)).unwrap().name(),
            "master_join"
        );
    }

    #[test]
    fn missing_generator_is_unsupported() {
        let r = GeneratorRegistry::new().without(OperatorKind::User(UserKind::Fold));
        assert!(matches!(
            r.get(OperatorKind::User(UserKind::Fold)),
            Err(Error::UnsupportedKind(_))
        ));
    }
}
