//! Compilation session: configuration, resolvers and the structural cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use dagc_analyze::{rules, AnalysisContext};
use dagc_core::config::CompilerConfig;
use dagc_core::dag::Operator;
use dagc_core::error::{Diagnostics, Error, Result};
use dagc_core::graph::OperatorGraph;
use dagc_core::id::OperatorId;
use dagc_core::logic::LogicResolver;
use dagc_core::manifest::CompileManifest;
use dagc_core::schema::ModelReflector;

use crate::cache::{CacheStats, UnitCache};
use crate::context::CodegenContext;
use crate::node::NodeInfo;
use crate::registry::GeneratorRegistry;

/// Every live operator of a graph, compiled.
#[derive(Debug, Clone, Default)]
pub struct GraphUnits {
    pub nodes: BTreeMap<OperatorId, NodeInfo>,
}

impl GraphUnits {
    pub fn get(&self, id: OperatorId) -> Option<&NodeInfo> {
        self.nodes.get(&id)
    }

    pub fn require(&self, id: OperatorId) -> Result<&NodeInfo> {
        self.nodes.get(&id).ok_or_else(|| missing_unit(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Owns the state that outlives one operator's compilation.
///
/// `Sync`: vertex compilations on parallel workers share one session and so
/// one cache.
pub struct CompileSession {
    config: CompilerConfig,
    cache: UnitCache,
    registry: Arc<GeneratorRegistry>,
    logic: Arc<dyn LogicResolver>,
    models: Arc<dyn ModelReflector>,
    started_ms: u64,
}

impl CompileSession {
    pub fn new(
        config: CompilerConfig,
        logic: Arc<dyn LogicResolver>,
        models: Arc<dyn ModelReflector>,
    ) -> Self {
        let cache = UnitCache::new(config.cache_enabled, config.unit_prefix.clone());
        Self {
            config,
            cache,
            registry: GeneratorRegistry::shared(),
            logic,
            models,
            started_ms: now_ms(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<GeneratorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn cache(&self) -> &UnitCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn logic(&self) -> &Arc<dyn LogicResolver> {
        &self.logic
    }

    pub fn models(&self) -> &Arc<dyn ModelReflector> {
        &self.models
    }

    pub fn analysis(&self) -> AnalysisContext<'_> {
        AnalysisContext::new(self.logic.as_ref(), self.models.as_ref())
            .strict_split(self.config.split_strict)
    }

    fn context(&self) -> CodegenContext<'_> {
        CodegenContext::new(self.analysis(), &self.cache, &self.config)
    }

    /// Compile one operator.
    pub fn compile_operator(&self, op: &Operator) -> Result<NodeInfo> {
        let generator = self.registry.get(op.kind)?;
        let node = generator.generate(&self.context(), op)?;
        debug!(
            op = %op,
            generator = generator.name(),
            unit = %node.unit.name,
            "compiled operator"
        );
        Ok(node)
    }

    /// Apply the graph rewrites code generation expects. Ids of replaced
    /// operators keep resolving through `OperatorGraph::current`.
    pub fn prepare(&self, graph: &mut OperatorGraph) -> Result<Vec<OperatorId>> {
        rules::optimize(&self.analysis(), graph)
    }

    /// Apply graph rewrites, then compile every live operator.
    ///
    /// Errors are collected across operators unless `fail_fast` is set.
    pub fn compile_graph(
        &self,
        graph: &mut OperatorGraph,
    ) -> std::result::Result<GraphUnits, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        if let Err(e) = self.prepare(graph) {
            if self.config.fail_fast {
                return Err(e.into());
            }
            diagnostics.push(e);
        }

        let mut units = GraphUnits::default();
        for op in graph.operators() {
            match self.compile_operator(op) {
                Ok(node) => {
                    units.nodes.insert(op.id, node);
                }
                Err(e) => {
                    warn!(op = %op, error = %e, "operator failed to compile");
                    diagnostics.push(e);
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            operators = units.len(),
            errors = diagnostics.len(),
            units = stats.units,
            cache_hits = stats.hits,
            "graph compiled"
        );
        diagnostics.into_result(units)
    }

    /// Audit manifest of every unit issued by this session.
    pub fn manifest(&self) -> Result<CompileManifest> {
        let stats = self.stats();
        CompileManifest::new(self.started_ms).finish(
            now_ms(),
            self.cache.entries()?,
            stats.hits,
            stats.misses,
        )
    }
}

impl std::fmt::Debug for CompileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileSession")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .field("registry", &self.registry)
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn missing_unit(id: OperatorId) -> Error {
    Error::Invariant(format!("{} was not compiled", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::dag::{Grouping, InputUnit, OperatorKind, UserKind};
    use dagc_core::logic::{Invocation, LogicRegistry, MethodRef, MethodShape, ParameterShape, ReturnShape};
    use dagc_core::schema::{Aggregation, DataModel, DataType, FoldingDecl, ModelRegistry};
    use dagc_core::types::Value;

    use crate::node::Dependency;
    use crate::unit::UnitRole;

    fn noop(_: &mut Invocation) -> std::result::Result<Value, String> {
        Ok(Value::Null)
    }

    fn models() -> ModelRegistry {
        let folding = |aggregation, source: &str, destination: &str| FoldingDecl {
            aggregation,
            source: source.into(),
            destination: destination.into(),
        };
        ModelRegistry::new()
            .with(
                DataModel::plain("Item")
                    .with("key", DataType::Long)
                    .with("value", DataType::Int),
            )
            .with(
                DataModel::plain("Master")
                    .with("key", DataType::Long)
                    .with("name", DataType::Text),
            )
            .with(
                DataModel::plain("Stats")
                    .with("key", DataType::Long)
                    .with("count", DataType::Long)
                    .with("total", DataType::Long)
                    .summarized(
                        "Item",
                        vec![
                            folding(Aggregation::Any, "key", "key"),
                            folding(Aggregation::Count, "value", "count"),
                            folding(Aggregation::Sum, "value", "total"),
                        ],
                    ),
            )
    }

    fn logic() -> LogicRegistry {
        let record = || ParameterShape::Record("Item".into());
        let int_arg = || ParameterShape::Argument(DataType::Int);
        LogicRegistry::new()
            .with(
                MethodRef::new("Ops", "bump"),
                MethodShape::new("Ops", ReturnShape::Void).param(record()).param(int_arg()),
                noop,
            )
            .with(
                MethodRef::new("Ops", "reset"),
                MethodShape::new("Ops", ReturnShape::Void).param(record()).param(int_arg()),
                noop,
            )
            .with(
                MethodRef::new("Ops", "merge"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(record())
                    .param(record())
                    .param(int_arg()),
                noop,
            )
            .with(
                MethodRef::new("Ops", "explode"),
                MethodShape::new("Ops", ReturnShape::Void)
                    .param(record())
                    .param(ParameterShape::Result("Item".into()))
                    .param(int_arg()),
                noop,
            )
            .with(
                MethodRef::new("Ops", "level"),
                MethodShape::new(
                    "Ops",
                    ReturnShape::Enum {
                        name: "Level".into(),
                        cases: vec!["LOW".into(), "HIGH".into()],
                    },
                )
                .param(record())
                .param(int_arg()),
                noop,
            )
    }

    fn session(config: CompilerConfig) -> CompileSession {
        CompileSession::new(config, Arc::new(logic()), Arc::new(models()))
    }

    fn record_op(kind: UserKind, method: &str, arg: i32) -> Operator {
        Operator::builder(OperatorKind::User(kind))
            .method(MethodRef::new("Ops", method))
            .input("in", "Item")
            .output("out", "Item")
            .argument("n", Value::Int(arg))
            .build()
    }

    fn fold(arg: i32) -> Operator {
        Operator::builder(OperatorKind::User(UserKind::Fold))
            .method(MethodRef::new("Ops", "merge"))
            .group_input("in", "Item", Grouping::by(["key"]))
            .output("out", "Item")
            .argument("n", Value::Int(arg))
            .build()
    }

    fn branch(arg: i32) -> Operator {
        Operator::builder(OperatorKind::User(UserKind::Branch))
            .method(MethodRef::new("Ops", "level"))
            .input("in", "Item")
            .output("low", "Item")
            .output("high", "Item")
            .argument("n", Value::Int(arg))
            .build()
    }

    fn master_check(master: InputUnit, tx: InputUnit) -> Operator {
        Operator::builder(OperatorKind::User(UserKind::MasterCheck))
            .port("master", "Master", master, Some(Grouping::by(["key"])))
            .port("tx", "Item", tx, Some(Grouping::by(["key"])))
            .output("found", "Item")
            .output("missed", "Item")
            .build()
    }

    #[test]
    fn same_operator_twice_shares_one_unit() {
        let s = session(CompilerConfig::default());
        let a = s.compile_operator(&record_op(UserKind::Update, "bump", 1)).unwrap();
        let b = s.compile_operator(&record_op(UserKind::Update, "bump", 1)).unwrap();
        assert!(Arc::ptr_eq(&a.unit, &b.unit));
        assert_eq!(a.unit.id, b.unit.id);

        let c = s.compile_operator(&record_op(UserKind::Update, "reset", 1)).unwrap();
        assert_ne!(a.unit.id, c.unit.id);
        assert_eq!(s.stats().units, 2);
        assert_eq!(s.stats().hits, 1);
    }

    #[test]
    fn fold_arguments_bust_the_cache() {
        let s = session(CompilerConfig::default());
        let a = s.compile_operator(&fold(1)).unwrap();
        let b = s.compile_operator(&fold(2)).unwrap();
        assert_ne!(a.unit.id, b.unit.id);
        let combiner = |n: &NodeInfo| n.aggregate.as_ref().map(|a| a.combiner.id);
        assert_ne!(combiner(&a), combiner(&b));
        assert!(a.aggregate.as_ref().is_some_and(|a| a.mapper.is_none()));
    }

    #[test]
    fn record_kinds_take_arguments_as_construction_parameters() {
        let s = session(CompilerConfig::default());
        for (one, two) in [
            (record_op(UserKind::Update, "bump", 1), record_op(UserKind::Update, "bump", 2)),
            (
                record_op(UserKind::Extract, "explode", 1),
                record_op(UserKind::Extract, "explode", 2),
            ),
            (branch(1), branch(2)),
        ] {
            let a = s.compile_operator(&one).unwrap();
            let b = s.compile_operator(&two).unwrap();
            assert!(Arc::ptr_eq(&a.unit, &b.unit), "{}", one.kind);
            assert!(a.dependencies.contains(&Dependency::Literal(Value::Int(1))));
            assert!(b.dependencies.contains(&Dependency::Literal(Value::Int(2))));
        }
    }

    #[test]
    fn join_strategy_is_part_of_the_key() {
        let s = session(CompilerConfig::default());
        let table = s
            .compile_operator(&master_check(InputUnit::WholeInput, InputUnit::Record))
            .unwrap();
        let merge = s
            .compile_operator(&master_check(InputUnit::Group, InputUnit::Group))
            .unwrap();
        assert_ne!(table.unit.id, merge.unit.id);
        assert!(table.unit.name.contains("_table_"));
        assert!(merge.unit.name.contains("_merge_"));
        assert_eq!(table.dependencies[0], Dependency::Table { input: 0 });

        let mixed = s.compile_operator(&master_check(InputUnit::Group, InputUnit::Record));
        assert!(matches!(mixed, Err(Error::Shape { .. })));
    }

    #[test]
    fn summarize_compiles_to_four_units() {
        let s = session(CompilerConfig::default());
        let op = Operator::builder(OperatorKind::User(UserKind::Summarize))
            .group_input("in", "Item", Grouping::by(["key"]))
            .output("out", "Stats")
            .build();
        let node = s.compile_operator(&op).unwrap();
        let agg = node.aggregate.as_ref().unwrap();
        let companions = node.unit.companions.unwrap();
        assert_eq!(companions.mapper, agg.mapper.as_ref().map(|m| m.id));
        assert_eq!(companions.combiner, agg.combiner.id);
        assert_eq!(agg.combiner.role, UnitRole::Combiner);
        assert_eq!(node.units().len(), 4);
        let json = serde_json::to_string(&*node.unit).unwrap();
        assert!(json.contains("\"Operation\""));
    }

    #[test]
    fn generator_shape_errors_are_reported() {
        let s = session(CompilerConfig::default());
        let two_outputs = record_op(UserKind::Update, "bump", 1)
            .to_builder()
            .output("extra", "Item")
            .build();
        assert!(matches!(
            s.compile_operator(&two_outputs),
            Err(Error::Shape { .. })
        ));
        let unknown = record_op(UserKind::Update, "nope", 1);
        assert!(matches!(
            s.compile_operator(&unknown),
            Err(Error::Resolution { .. })
        ));
        assert_eq!(s.stats().units, 0);
    }

    #[test]
    fn compile_graph_collects_every_failure() {
        let s = session(CompilerConfig::default());
        let mut g = OperatorGraph::new();
        g.add(record_op(UserKind::Update, "bump", 1));
        g.add(record_op(UserKind::Update, "nope", 1));
        g.add(record_op(UserKind::Convert, "bump", 1));
        let diagnostics = s.compile_graph(&mut g).unwrap_err();
        assert_eq!(diagnostics.len(), 2);

        let fast = session(CompilerConfig {
            fail_fast: true,
            ..CompilerConfig::default()
        });
        assert_eq!(fast.compile_graph(&mut g).unwrap_err().len(), 1);
    }

    #[test]
    fn manifest_lists_issued_units() {
        let s = session(CompilerConfig::default().with_cache(false));
        s.compile_operator(&record_op(UserKind::Update, "bump", 1)).unwrap();
        s.compile_operator(&record_op(UserKind::Update, "bump", 1)).unwrap();
        let manifest = s.manifest().unwrap();
        assert_eq!(manifest.units.len(), 2);
        assert_eq!(manifest.cache_hits, 0);
    }
}
