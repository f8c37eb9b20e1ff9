//! Call graph construction and call-target resolution.
//!
//! Resolution policy, applied to every named call record:
//! - name in the always-external filter → external, no edge
//! - no definition anywhere → external, no edge
//! - exactly one definition → one edge
//! - several definitions (same name in several files) → one edge to each
//!
//! Repeated call sites and recursion collapse into a single edge.

use std::collections::{BTreeMap, BTreeSet};

use super::{CallGraph, GraphStats};
use crate::ingest::{CallTarget, FileFacts, FunctionId, FunctionRecord};

/// Builds a [`CallGraph`] from the facts of every analyzed file.
///
/// The result depends only on the set of facts, never on the order in
/// which files or call records are supplied.
#[derive(Debug, Clone, Default)]
pub struct CallGraphBuilder {
    external_names: BTreeSet<String>,
}

impl CallGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callee names that must never resolve, even when defined.
    pub fn with_external_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Build the graph.
    ///
    /// # Guarantees
    /// - Every edge endpoint is a node
    /// - Node and edge sets are independent of input order
    /// - Each node maps to exactly one definition; a same-file redefinition
    ///   (e.g. `#ifdef` variants) folds into the earliest one
    pub fn build<'a, I>(&self, facts: I) -> CallGraph
    where
        I: IntoIterator<Item = &'a FileFacts>,
    {
        let facts: Vec<&FileFacts> = facts.into_iter().collect();
        let mut graph = CallGraph::default();
        let mut stats = GraphStats::default();

        for file in &facts {
            for record in &file.functions {
                insert_function(&mut graph.functions, record, &mut stats);
            }
        }

        let mut by_name: BTreeMap<&str, BTreeSet<FunctionId>> = BTreeMap::new();
        for id in graph.functions.keys() {
            by_name.entry(id.name.as_str()).or_default().insert(id.clone());
        }

        let mut forward: BTreeMap<FunctionId, BTreeSet<FunctionId>> = BTreeMap::new();
        let mut reverse: BTreeMap<FunctionId, BTreeSet<FunctionId>> = BTreeMap::new();

        for call in facts.iter().flat_map(|file| file.calls.iter()) {
            stats.call_sites += 1;

            debug_assert!(
                graph.functions.contains_key(&call.caller),
                "call record at line {} references unknown caller {}",
                call.line,
                call.caller
            );
            if !graph.functions.contains_key(&call.caller) {
                continue;
            }

            let name = match &call.target {
                CallTarget::Named(name) => name,
                CallTarget::Indirect { .. } => {
                    stats.indirect_calls += 1;
                    continue;
                }
            };

            let candidates = match by_name.get(name.as_str()) {
                Some(candidates) if !self.external_names.contains(name) => candidates,
                _ => {
                    stats.external_calls += 1;
                    graph.external.insert(name.clone());
                    graph
                        .external_calls
                        .entry(call.caller.clone())
                        .or_default()
                        .insert(name.clone());
                    continue;
                }
            };

            if candidates.len() > 1 {
                graph
                    .ambiguous
                    .entry(name.clone())
                    .or_insert_with(|| candidates.clone());
            }

            for callee in candidates {
                forward
                    .entry(call.caller.clone())
                    .or_default()
                    .insert(callee.clone());
                reverse
                    .entry(callee.clone())
                    .or_default()
                    .insert(call.caller.clone());
            }
        }

        for (name, candidates) in &graph.ambiguous {
            tracing::info!(
                callee = %name,
                candidates = candidates.len(),
                "ambiguous call target, linking every definition"
            );
        }

        stats.functions = graph.functions.len();
        stats.edges = forward.values().map(BTreeSet::len).sum();
        stats.ambiguous_names = graph.ambiguous.len();
        graph.forward = forward;
        graph.reverse = reverse;
        graph.stats = stats;

        tracing::debug!(
            functions = stats.functions,
            edges = stats.edges,
            call_sites = stats.call_sites,
            external = graph.external.len(),
            "call graph built"
        );

        graph
    }
}

/// Insert a definition, keeping the earliest one for a repeated `(file, name)`.
fn insert_function(
    functions: &mut BTreeMap<FunctionId, FunctionRecord>,
    record: &FunctionRecord,
    stats: &mut GraphStats,
) {
    let id = record.id();
    match functions.get_mut(&id) {
        Some(existing) => {
            stats.duplicate_definitions += 1;
            tracing::debug!(
                function = %id,
                first = existing.start_line.min(record.start_line),
                "duplicate definition in one file folded into one node"
            );
            if record.start_line < existing.start_line {
                *existing = record.clone();
            }
        }
        None => {
            functions.insert(id, record.clone());
        }
    }
}
