//! Impact propagation over the call graph.
//!
//! Given seed functions and a depth bound `D`, reports the callers
//! (upstream) and callees (downstream) reachable within `D` hops, each at
//! the minimal hop count at which it is first reached.

mod bfs;

pub use bfs::{propagate, propagate_each};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{CallEdge, Direction};
use crate::ingest::FunctionId;

/// Functions reached in one direction, bucketed by minimal hop count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalImpact {
    /// Hop count → functions first reached at that hop; empty buckets are omitted
    pub by_depth: BTreeMap<usize, BTreeSet<FunctionId>>,
    /// For each reached function, the frontier node whose edge discovered it
    pub via: BTreeMap<FunctionId, FunctionId>,
}

impl DirectionalImpact {
    /// Every reached function, in `(file, name)` order.
    pub fn functions(&self) -> BTreeSet<&FunctionId> {
        self.by_depth.values().flatten().collect()
    }

    /// Minimal hop count at which `id` was reached.
    pub fn depth_of(&self, id: &FunctionId) -> Option<usize> {
        self.by_depth
            .iter()
            .find(|(_, bucket)| bucket.contains(id))
            .map(|(depth, _)| *depth)
    }

    pub fn len(&self) -> usize {
        self.via.len()
    }

    pub fn is_empty(&self) -> bool {
        self.via.is_empty()
    }
}

/// Result of one propagation run.
///
/// A pure function of `(graph, seeds, depth)`: identical inputs produce
/// identical (and identically serialized) reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Directly changed functions
    pub seed_functions: BTreeSet<FunctionId>,
    /// Depth bound used
    pub depth_limit: usize,
    /// Callers of the seeds, transitively
    pub upstream: DirectionalImpact,
    /// Callees of the seeds, transitively
    pub downstream: DirectionalImpact,
    /// External callee names invoked within the downstream horizon; never expanded
    pub external_callees: BTreeSet<String>,
}

impl ImpactReport {
    /// Hop-count buckets for upstream impact.
    pub fn upstream_by_depth(&self) -> &BTreeMap<usize, BTreeSet<FunctionId>> {
        &self.upstream.by_depth
    }

    /// Hop-count buckets for downstream impact.
    pub fn downstream_by_depth(&self) -> &BTreeMap<usize, BTreeSet<FunctionId>> {
        &self.downstream.by_depth
    }

    /// Impact in one direction.
    pub fn direction(&self, direction: Direction) -> &DirectionalImpact {
        match direction {
            Direction::Upstream => &self.upstream,
            Direction::Downstream => &self.downstream,
        }
    }

    /// Seeds plus everything reached in either direction.
    pub fn blast_radius(&self) -> BTreeSet<&FunctionId> {
        self.seed_functions
            .iter()
            .chain(self.upstream.by_depth.values().flatten())
            .chain(self.downstream.by_depth.values().flatten())
            .collect()
    }

    /// Call edges linking `id` back to a seed, seed end first.
    ///
    /// Upstream paths are returned as caller → callee edges leading into
    /// the seed's side; downstream paths run from the seed outwards.
    /// Returns `None` for functions not reached in that direction and an
    /// empty path for seeds.
    pub fn path_to(&self, direction: Direction, id: &FunctionId) -> Option<Vec<CallEdge>> {
        if self.seed_functions.contains(id) {
            return Some(Vec::new());
        }
        let impact = self.direction(direction);
        impact.via.get(id)?;

        let mut edges = Vec::new();
        let mut current = id.clone();
        while let Some(previous) = impact.via.get(&current) {
            let edge = match direction {
                Direction::Downstream => CallEdge {
                    caller: previous.clone(),
                    callee: current.clone(),
                },
                Direction::Upstream => CallEdge {
                    caller: current.clone(),
                    callee: previous.clone(),
                },
            };
            edges.push(edge);
            current = previous.clone();
        }
        edges.reverse();
        Some(edges)
    }

    /// Whether nothing beyond the seeds was reached.
    pub fn is_seed_only(&self) -> bool {
        self.upstream.is_empty() && self.downstream.is_empty()
    }
}
