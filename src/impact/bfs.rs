//! Bounded BFS traversal for impact analysis

use std::collections::{BTreeMap, BTreeSet};

use super::{DirectionalImpact, ImpactReport};
use crate::config::Depth;
use crate::graph::{CallGraph, Direction};
use crate::ingest::FunctionId;

/// Compute upstream and downstream impact of `seeds` within `depth` hops.
///
/// Multi-source BFS: every seed starts at depth 0 and each function is
/// recorded once, at the smallest hop count from any seed. Seeds are
/// never reported as impacted. External callee names have no node and so
/// are never expanded.
pub fn propagate(graph: &CallGraph, seeds: &BTreeSet<FunctionId>, depth: Depth) -> ImpactReport {
    let limit = depth.get();
    for seed in seeds {
        if !graph.contains(seed) {
            tracing::warn!(function = %seed, "seed function is not a graph node");
        }
    }

    let upstream = bounded_bfs(graph, seeds, limit, Direction::Upstream);
    let downstream = bounded_bfs(graph, seeds, limit, Direction::Downstream);
    let external_callees = external_horizon(graph, seeds, &downstream, limit);

    tracing::debug!(
        seeds = seeds.len(),
        depth = limit,
        upstream = upstream.len(),
        downstream = downstream.len(),
        "impact propagated"
    );

    ImpactReport {
        seed_functions: seeds.clone(),
        depth_limit: limit,
        upstream,
        downstream,
        external_callees,
    }
}

/// Propagate each seed on its own.
///
/// Gives the per-function breakdown shown alongside the combined report.
pub fn propagate_each(
    graph: &CallGraph,
    seeds: &BTreeSet<FunctionId>,
    depth: Depth,
) -> BTreeMap<FunctionId, ImpactReport> {
    seeds
        .iter()
        .map(|seed| {
            let single: BTreeSet<FunctionId> = std::iter::once(seed.clone()).collect();
            (seed.clone(), propagate(graph, &single, depth))
        })
        .collect()
}

/// Frontier-by-frontier expansion in one direction.
///
/// `visited` is local to the call; a node that already has a depth is
/// never re-added, which bounds the loop on cyclic graphs. Frontiers and
/// neighbor lists are both sorted, so `via` always names the smallest
/// predecessor at the previous hop.
fn bounded_bfs(
    graph: &CallGraph,
    seeds: &BTreeSet<FunctionId>,
    limit: usize,
    direction: Direction,
) -> DirectionalImpact {
    let mut visited: BTreeMap<FunctionId, usize> = seeds.iter().map(|seed| (seed.clone(), 0)).collect();
    let mut impact = DirectionalImpact::default();
    let mut frontier: BTreeSet<FunctionId> = seeds.clone();

    for depth in 1..=limit {
        if frontier.is_empty() {
            break;
        }

        let mut next: BTreeSet<FunctionId> = BTreeSet::new();
        for current in &frontier {
            for neighbor in graph.neighbors(current, direction) {
                if visited.contains_key(neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone(), depth);
                impact.via.insert(neighbor.clone(), current.clone());
                next.insert(neighbor.clone());
            }
        }

        if !next.is_empty() {
            impact.by_depth.insert(depth, next.clone());
        }
        frontier = next;
    }

    impact
}

/// External names called by functions whose next hop is still within bounds.
fn external_horizon(
    graph: &CallGraph,
    seeds: &BTreeSet<FunctionId>,
    downstream: &DirectionalImpact,
    limit: usize,
) -> BTreeSet<String> {
    if limit == 0 {
        return BTreeSet::new();
    }

    let inner = downstream
        .by_depth
        .range(..limit)
        .flat_map(|(_, bucket)| bucket.iter());

    seeds
        .iter()
        .chain(inner)
        .flat_map(|id| graph.external_callees_of(id))
        .cloned()
        .collect()
}
