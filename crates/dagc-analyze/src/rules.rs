//! Graph rewrites applied before code generation.

use tracing::debug;

use dagc_core::error::Result;
use dagc_core::graph::OperatorGraph;
use dagc_core::id::OperatorId;

use crate::summarize;
use crate::AnalysisContext;

/// Apply every rewrite to the live operators of `graph`.
///
/// Today that is the summarize grouping-key patch. Returns the ids of the
/// replacement operators; running it twice replaces nothing.
pub fn optimize(ctx: &AnalysisContext<'_>, graph: &mut OperatorGraph) -> Result<Vec<OperatorId>> {
    let pending: Vec<OperatorId> = graph
        .operators()
        .filter(|op| summarize::is_supported(op) && !summarize::is_patched(op))
        .map(|op| op.id)
        .collect();

    let mut replaced = Vec::with_capacity(pending.len());
    for id in pending {
        replaced.push(summarize::patch_in_graph(ctx, graph, id)?);
    }
    if !replaced.is_empty() {
        debug!(count = replaced.len(), "graph rewrites applied");
    }
    Ok(replaced)
}
