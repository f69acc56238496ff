//! Compiling many vertices on scoped worker threads.
//!
//! Workers pull vertex indices from a shared counter and fuse against one
//! session, so every vertex shares the session's structural cache. Results
//! come back in input order whatever order the workers finish in.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use dagc_codegen::CompileSession;
use dagc_core::error::{Diagnostics, Result};
use dagc_core::graph::OperatorGraph;

use crate::fuse::fuse;
use crate::vertex::{FusedOperation, VertexSpec};

/// Prepare `graph`, then fuse every vertex.
///
/// All failures are collected; with `fail_fast` workers stop taking new
/// vertices after the first one.
pub fn compile_vertices(
    session: &CompileSession,
    graph: &mut OperatorGraph,
    specs: &[VertexSpec],
) -> std::result::Result<Vec<FusedOperation>, Diagnostics> {
    session.prepare(graph)?;
    let graph: &OperatorGraph = graph;
    let workers = session.config().worker_threads.clamp(1, specs.len().max(1));
    let fail_fast = session.config().fail_fast;

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let results: Vec<Mutex<Option<Result<FusedOperation>>>> =
        specs.iter().map(|_| Mutex::new(None)).collect();

    debug!(vertices = specs.len(), workers, "compiling vertices");
    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                if fail_fast && failed.load(Ordering::Acquire) {
                    break;
                }
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(spec) = specs.get(i) else {
                    break;
                };
                let result = fuse(session, graph, spec);
                if let Err(e) = &result {
                    warn!(vertex = %spec.name, error = %e, "vertex failed to compile");
                    failed.store(true, Ordering::Release);
                }
                *results[i].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
            });
        }
    });

    let mut diagnostics = Diagnostics::new();
    let mut fused = Vec::with_capacity(specs.len());
    for slot in results {
        match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(Ok(op)) => fused.push(op),
            Some(Err(e)) => diagnostics.push(e),
            None => {}
        }
    }
    diagnostics.into_result(fused)
}
