//! Call graph over extracted function facts.
//!
//! The graph is an adjacency-list structure keyed by [`FunctionId`]
//! (`(file, name)`). It is built once per run by [`CallGraphBuilder`] and
//! is read-only afterwards: there are no mutating methods.
//!
//! # Resolution boundary
//!
//! Calls are resolved by callee name only. Calls through function
//! pointers, struct members or callback tables are never resolved, and
//! names with no definition in the analyzed set are recorded in
//! [`CallGraph::external_names`]. Both act as graph boundaries: they have
//! no node and are never expanded during propagation, so impact through
//! function pointers is not reported.
//!
//! Static vs external linkage is not modeled. When several files define
//! the same name, a call resolves to every definition.

pub mod calls;

pub use calls::CallGraphBuilder;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ingest::{FunctionId, FunctionRecord};

/// Traversal direction over call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Follow edges into a function (its callers)
    Upstream,
    /// Follow edges out of a function (its callees)
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
        }
    }
}

/// One resolved call edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: FunctionId,
    pub callee: FunctionId,
}

impl fmt::Display for CallEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.caller, self.callee)
    }
}

/// Counters describing one built graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Function nodes
    pub functions: usize,
    /// Distinct resolved edges
    pub edges: usize,
    /// Call records seen, including indirect ones
    pub call_sites: usize,
    /// Call records through non-identifier expressions
    pub indirect_calls: usize,
    /// Call records whose name had no definition or was filtered
    pub external_calls: usize,
    /// Callee names that resolved to more than one definition
    pub ambiguous_names: usize,
    /// Same-file redefinitions folded into an earlier node
    pub duplicate_definitions: usize,
}

/// Directed call graph keyed by `(file, name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    functions: BTreeMap<FunctionId, FunctionRecord>,
    forward: BTreeMap<FunctionId, BTreeSet<FunctionId>>,
    reverse: BTreeMap<FunctionId, BTreeSet<FunctionId>>,
    external: BTreeSet<String>,
    external_calls: BTreeMap<FunctionId, BTreeSet<String>>,
    ambiguous: BTreeMap<String, BTreeSet<FunctionId>>,
    stats: GraphStats,
}

impl CallGraph {
    /// Definition backing a node.
    pub fn function(&self, id: &FunctionId) -> Option<&FunctionRecord> {
        self.functions.get(id)
    }

    /// Whether `id` is a node.
    pub fn contains(&self, id: &FunctionId) -> bool {
        self.functions.contains_key(id)
    }

    /// All nodes in `(file, name)` order.
    pub fn nodes(&self) -> impl Iterator<Item = &FunctionId> {
        self.functions.keys()
    }

    /// All definitions in `(file, name)` order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.functions.values()
    }

    /// All resolved edges, ordered by `(caller, callee)`.
    pub fn edges(&self) -> impl Iterator<Item = CallEdge> + '_ {
        self.forward.iter().flat_map(|(caller, callees)| {
            callees.iter().map(move |callee| CallEdge {
                caller: caller.clone(),
                callee: callee.clone(),
            })
        })
    }

    /// Whether a resolved edge `caller -> callee` exists.
    pub fn has_edge(&self, caller: &FunctionId, callee: &FunctionId) -> bool {
        self.forward
            .get(caller)
            .map(|callees| callees.contains(callee))
            .unwrap_or(false)
    }

    /// Functions called by `id`.
    pub fn callees_of(&self, id: &FunctionId) -> impl Iterator<Item = &FunctionId> {
        self.forward.get(id).into_iter().flatten()
    }

    /// Functions calling `id`.
    pub fn callers_of(&self, id: &FunctionId) -> impl Iterator<Item = &FunctionId> {
        self.reverse.get(id).into_iter().flatten()
    }

    /// Neighbors of `id` in the given direction, sorted.
    pub fn neighbors(&self, id: &FunctionId, direction: Direction) -> impl Iterator<Item = &FunctionId> {
        let adjacency = match direction {
            Direction::Upstream => &self.reverse,
            Direction::Downstream => &self.forward,
        };
        adjacency.get(id).into_iter().flatten()
    }

    /// Callee names with no resolvable definition (or filtered as external).
    pub fn external_names(&self) -> &BTreeSet<String> {
        &self.external
    }

    /// Whether `name` is an external callee.
    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }

    /// External callee names invoked directly by `id`.
    pub fn external_callees_of(&self, id: &FunctionId) -> impl Iterator<Item = &String> {
        self.external_calls.get(id).into_iter().flatten()
    }

    /// Callee names resolved to several definitions, with their candidates.
    pub fn ambiguous_names(&self) -> &BTreeMap<String, BTreeSet<FunctionId>> {
        &self.ambiguous
    }

    /// Definitions sharing `name` across all files, sorted.
    pub fn functions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionId> + 'a {
        self.functions.keys().filter(move |id| id.name == name)
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    pub fn node_count(&self) -> usize {
        self.functions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.stats.edges
    }
}
