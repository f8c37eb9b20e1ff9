//! Property tests for graph construction and impact propagation
//!
//! Graphs are generated directly as facts (no parsing) so the properties
//! cover arbitrary shapes: cycles, self-calls, shared callees, unresolved
//! names and same-named functions in different files.

use std::collections::{BTreeMap, BTreeSet};

use blast_radius::{
    analyze, propagate, AnalysisConfig, CallGraph, CallGraphBuilder, CallRecord, ChangedRange, Depth, Direction,
    FileFacts, FunctionId, FunctionRecord, ImpactReport, SourceFile,
};
use proptest::prelude::*;

const FILES: usize = 3;

/// Function `i` lives in file `i % FILES`; with `collide`, pairs of
/// functions in different files share a name.
fn function(i: usize, collide: bool) -> FunctionRecord {
    let file = format!("src/f{}.c", i % FILES);
    let name = if collide { format!("fn_{}", i / 2) } else { format!("fn_{}", i) };
    let slot = i / FILES;
    FunctionRecord::new(file, name, slot * 10 + 1, slot * 10 + 9)
}

fn build_facts(count: usize, calls: &[(usize, usize)], externals: &[usize], collide: bool) -> Vec<FileFacts> {
    let mut facts: Vec<FileFacts> = (0..FILES).map(|f| FileFacts::new(format!("src/f{}.c", f))).collect();
    let records: Vec<FunctionRecord> = (0..count).map(|i| function(i, collide)).collect();

    for record in &records {
        facts[file_index(record)].functions.push(record.clone());
    }
    for (offset, &(caller, callee)) in calls.iter().enumerate() {
        let caller = &records[caller % count];
        let callee = &records[callee % count];
        let line = caller.start_line + 1 + offset % 7;
        facts[file_index(caller)].calls.push(CallRecord::named(caller, callee.name.clone(), line));
    }
    for &caller in externals {
        let caller = &records[caller % count];
        let line = caller.start_line + 1;
        facts[file_index(caller)].calls.push(CallRecord::named(caller, "ext_log", line));
    }
    facts
}

fn file_index(record: &FunctionRecord) -> usize {
    record
        .file
        .to_string_lossy()
        .trim_start_matches("src/f")
        .trim_end_matches(".c")
        .parse()
        .unwrap()
}

fn graph_input() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<usize>, bool)> {
    (2usize..16).prop_flat_map(|count| {
        (
            Just(count),
            prop::collection::vec((0..count, 0..count), 0..40),
            prop::collection::vec(0..count, 0..4),
            any::<bool>(),
        )
    })
}

fn seeds_from(graph: &CallGraph, picks: &[usize]) -> BTreeSet<FunctionId> {
    let nodes: Vec<&FunctionId> = graph.nodes().collect();
    picks.iter().map(|&p| nodes[p % nodes.len()].clone()).collect()
}

/// Plain BFS distances from the seeds, independent of the propagator.
fn distances(graph: &CallGraph, seeds: &BTreeSet<FunctionId>, direction: Direction) -> BTreeMap<FunctionId, usize> {
    let mut dist: BTreeMap<FunctionId, usize> = seeds.iter().map(|s| (s.clone(), 0)).collect();
    let mut queue: std::collections::VecDeque<FunctionId> = seeds.iter().cloned().collect();
    while let Some(current) = queue.pop_front() {
        let d = dist[&current];
        for next in graph.neighbors(&current, direction) {
            if !dist.contains_key(next) {
                dist.insert(next.clone(), d + 1);
                queue.push_back(next.clone());
            }
        }
    }
    dist
}

fn assert_buckets_well_formed(report: &ImpactReport, graph: &CallGraph, direction: Direction) {
    let impact = report.direction(direction);
    let expected = distances(graph, &report.seed_functions, direction);
    let mut seen = BTreeSet::new();

    for (depth, bucket) in &impact.by_depth {
        assert!(*depth >= 1 && *depth <= report.depth_limit);
        assert!(!bucket.is_empty(), "empty bucket at depth {}", depth);
        for id in bucket {
            assert!(seen.insert(id.clone()), "{} reported twice", id);
            assert!(!report.seed_functions.contains(id));
            assert_eq!(expected.get(id), Some(depth), "{} not at minimal depth", id);
            assert!(graph.contains(id));
        }
    }

    for (id, d) in &expected {
        if *d >= 1 && *d <= report.depth_limit {
            assert!(seen.contains(id), "{} reachable in {} hops but missing", id, d);
        }
    }
}

/// Small C project with shared callees, a same-named pair, a duplicated
/// path and a path supplied with two different bodies.
fn pipeline_sources() -> Vec<SourceFile> {
    let store = "int store_get(int k) {\n    return k;\n}\nint store_put(int k) {\n    return store_get(k);\n}\n";
    vec![
        SourceFile::new("store.c", store),
        SourceFile::new("store.c", store),
        SourceFile::new("api.c", "int api(int k) {\n    return store_put(k) + init();\n}\n"),
        SourceFile::new("a/init.c", "int init(void) {\n    return 0;\n}\n"),
        SourceFile::new("b/init.c", "int init(void) {\n    return store_get(1);\n}\n"),
        SourceFile::new("cli.c", "int main(void) {\n    return api(1);\n}\n"),
        SourceFile::new("cli.c", "int main(void) {\n    return api(2) + init();\n}\n"),
    ]
}

proptest! {
    #[test]
    fn prop_pipeline_ignores_source_order(
        shuffled in Just(pipeline_sources()).prop_shuffle(),
        depth in 0i64..4,
    ) {
        let changes = vec![
            ChangedRange::line("store.c", 2).unwrap(),
            ChangedRange::line("cli.c", 2).unwrap(),
        ];
        let config = AnalysisConfig::with_depth(depth);

        let baseline = analyze(&pipeline_sources(), &changes, &config).unwrap();
        let outcome = analyze(&shuffled, &changes, &config).unwrap();
        prop_assert_eq!(&outcome, &baseline);
    }

    #[test]
    fn prop_buckets_hold_minimal_depths(
        (count, calls, externals, collide) in graph_input(),
        picks in prop::collection::vec(0usize..64, 1..4),
        depth in 0usize..8,
    ) {
        let facts = build_facts(count, &calls, &externals, collide);
        let graph = CallGraphBuilder::new().build(&facts);
        let seeds = seeds_from(&graph, &picks);

        let report = propagate(&graph, &seeds, Depth::from(depth));
        assert_buckets_well_formed(&report, &graph, Direction::Upstream);
        assert_buckets_well_formed(&report, &graph, Direction::Downstream);
        prop_assert!(report.blast_radius().iter().all(|id| id.name != "ext_log"));
    }

    #[test]
    fn prop_same_input_same_report(
        (count, calls, externals, collide) in graph_input(),
        picks in prop::collection::vec(0usize..64, 1..4),
        depth in 0usize..6,
    ) {
        let facts = build_facts(count, &calls, &externals, collide);
        let graph = CallGraphBuilder::new().build(&facts);
        let seeds = seeds_from(&graph, &picks);

        let first = propagate(&graph, &seeds, Depth::from(depth));
        let second = propagate(&graph, &seeds, Depth::from(depth));
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn prop_input_order_is_irrelevant(
        (count, calls, externals, collide) in graph_input(),
        picks in prop::collection::vec(0usize..64, 1..4),
        depth in 0usize..6,
    ) {
        let facts = build_facts(count, &calls, &externals, collide);
        let mut shuffled = facts.clone();
        shuffled.reverse();
        for file in &mut shuffled {
            file.calls.reverse();
            file.functions.reverse();
        }

        let graph = CallGraphBuilder::new().build(&facts);
        let other = CallGraphBuilder::new().build(&shuffled);
        prop_assert_eq!(&graph, &other);

        let seeds = seeds_from(&graph, &picks);
        prop_assert_eq!(
            propagate(&graph, &seeds, Depth::from(depth)),
            propagate(&other, &seeds, Depth::from(depth))
        );
    }

    #[test]
    fn prop_deeper_search_never_shrinks(
        (count, calls, externals, collide) in graph_input(),
        picks in prop::collection::vec(0usize..64, 1..4),
        depth in 0usize..6,
    ) {
        let facts = build_facts(count, &calls, &externals, collide);
        let graph = CallGraphBuilder::new().build(&facts);
        let seeds = seeds_from(&graph, &picks);

        let shallow = propagate(&graph, &seeds, Depth::from(depth));
        let deep = propagate(&graph, &seeds, Depth::from(depth + 1));
        prop_assert!(shallow.blast_radius().is_subset(&deep.blast_radius()));
        for (d, bucket) in shallow.downstream_by_depth() {
            prop_assert_eq!(Some(bucket), deep.downstream_by_depth().get(d));
        }
        for (d, bucket) in shallow.upstream_by_depth() {
            prop_assert_eq!(Some(bucket), deep.upstream_by_depth().get(d));
        }
    }

    #[test]
    fn prop_graph_has_no_dangling_edges(
        (count, calls, externals, collide) in graph_input(),
    ) {
        let facts = build_facts(count, &calls, &externals, collide);
        let graph = CallGraphBuilder::new().build(&facts);

        for edge in graph.edges() {
            prop_assert!(graph.contains(&edge.caller));
            prop_assert!(graph.contains(&edge.callee));
            prop_assert!(graph.callers_of(&edge.callee).any(|c| c == &edge.caller));
        }
        prop_assert_eq!(graph.edges().count(), graph.edge_count());
    }
}

#[test]
fn test_large_cycle_terminates_at_huge_depth() {
    let count = 50;
    let calls: Vec<(usize, usize)> = (0..count).map(|i| (i, (i + 1) % count)).collect();
    let facts = build_facts(count, &calls, &[], false);
    let graph = CallGraphBuilder::new().build(&facts);
    let seeds: BTreeSet<FunctionId> = graph.nodes().take(1).cloned().collect();

    let report = propagate(&graph, &seeds, Depth::from(1_000_000));
    assert_eq!(report.downstream.len(), count - 1);
    assert_eq!(report.upstream.len(), count - 1);
    assert_eq!(report.downstream_by_depth().len(), count - 1);
}
