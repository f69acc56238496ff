//! Everything a generator may consult while compiling one operator.

use std::sync::Arc;

use dagc_analyze::AnalysisContext;
use dagc_core::config::CompilerConfig;
use dagc_core::error::Result;

use crate::cache::UnitCache;
use crate::key::CacheKey;
use crate::unit::{CompiledUnit, UnitDraft};

#[derive(Clone, Copy)]
pub struct CodegenContext<'a> {
    pub analysis: AnalysisContext<'a>,
    pub cache: &'a UnitCache,
    pub config: &'a CompilerConfig,
}

impl<'a> CodegenContext<'a> {
    pub fn new(
        analysis: AnalysisContext<'a>,
        cache: &'a UnitCache,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            analysis,
            cache,
            config,
        }
    }

    /// Submit `key` to the structural cache, generating on a miss.
    pub fn unit<F>(&self, key: CacheKey, label: &str, generate: F) -> Result<Arc<CompiledUnit>>
    where
        F: FnOnce() -> Result<UnitDraft>,
    {
        self.cache.get_or_generate(key, label, generate)
    }
}
