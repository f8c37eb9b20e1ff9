//! Analysis pipeline.
//!
//! Wires the stages together for one run:
//! sources → facts (parallel) → call graph → localization → impact.
//!
//! Per-file extraction runs on the rayon pool; results are reassembled
//! sorted by path before anything order-sensitive happens. Everything
//! after extraction is single-threaded and deterministic.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::changes::{localize, ChangeLocalization, ChangeSource, ChangedRange};
use crate::config::{AnalysisConfig, Depth};
use crate::diagnostics::{AnalysisDiagnostic, DiagnosticStage};
use crate::error::Result;
use crate::graph::{CallGraph, CallGraphBuilder, GraphStats};
use crate::impact::{propagate, propagate_each, ImpactReport};
use crate::ingest::{extract_c_file, FileFacts, FunctionId, ParseFailure};
use crate::scan::{load_sources, scan_directory, SourceFile};

/// Facts and failures from one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Facts of every parsed file, sorted by path
    pub facts: Vec<FileFacts>,
    /// Files that contributed nothing, sorted by path
    pub failures: Vec<ParseFailure>,
}

/// Extract facts from every source in parallel.
///
/// A file that fails to parse is skipped and listed in
/// [`Extraction::failures`]; the others are unaffected. The output does
/// not depend on the order of `sources`: identical copies of one path
/// count once, and a path supplied with conflicting contents is dropped
/// as a failure.
pub fn extract_all(sources: &[SourceFile], config: &AnalysisConfig) -> Extraction {
    let (unique, mut failures) = distinct_sources(sources);

    let results: Vec<std::result::Result<FileFacts, ParseFailure>> = unique
        .par_iter()
        .map(|source| extract_c_file(&source.path, &source.contents, config.strict_parse))
        .collect();

    let mut extraction = Extraction::default();
    for result in results {
        match result {
            Ok(facts) => extraction.facts.push(facts),
            Err(failure) => {
                tracing::warn!(
                    file = %failure.path.display(),
                    stage = %failure.stage,
                    reason = %failure.message,
                    "skipping unparsable file"
                );
                failures.push(failure);
            }
        }
    }

    extraction.facts.sort_by(|a, b| a.path.cmp(&b.path));
    failures.sort_by(|a, b| a.path.cmp(&b.path));
    extraction.failures = failures;

    tracing::debug!(
        files = sources.len(),
        parsed = extraction.facts.len(),
        failed = extraction.failures.len(),
        "extraction finished"
    );
    extraction
}

/// One source per path, sorted by path.
///
/// Copies with identical contents collapse into one. A path whose copies
/// disagree is left out entirely and reported, since picking either copy
/// would depend on input order.
fn distinct_sources(sources: &[SourceFile]) -> (Vec<&SourceFile>, Vec<ParseFailure>) {
    let mut by_path: BTreeMap<&Path, Vec<&SourceFile>> = BTreeMap::new();
    for source in sources {
        by_path.entry(source.path.as_path()).or_default().push(source);
    }

    let mut unique = Vec::with_capacity(by_path.len());
    let mut failures = Vec::new();
    for (path, copies) in by_path {
        let first = copies[0];
        if copies.iter().all(|copy| copy.contents == first.contents) {
            unique.push(first);
            continue;
        }
        tracing::warn!(
            file = %path.display(),
            copies = copies.len(),
            "path supplied with conflicting contents"
        );
        failures.push(ParseFailure::new(
            path,
            DiagnosticStage::Read,
            format!("path supplied {} times with different contents", copies.len()),
        ));
    }

    (unique, failures)
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Combined impact of every directly changed function
    pub impact: ImpactReport,
    /// Per-file mapping of changed ranges onto definitions
    pub localization: ChangeLocalization,
    /// Impact of each changed function on its own
    pub per_function: BTreeMap<FunctionId, ImpactReport>,
    /// Counters for the call graph
    pub stats: GraphStats,
    /// Failures and notes, in `sort_key` order
    pub diagnostics: Vec<AnalysisDiagnostic>,
    /// Facts of every parsed file, for tracing results back to source
    pub facts: Vec<FileFacts>,
    /// The graph the impact was computed over
    pub graph: CallGraph,
}

impl AnalysisReport {
    /// Directly changed functions.
    pub fn seeds(&self) -> &BTreeSet<FunctionId> {
        &self.impact.seed_functions
    }

    /// Diagnostics for files that contributed no facts.
    pub fn failures(&self) -> impl Iterator<Item = &AnalysisDiagnostic> {
        self.diagnostics.iter().filter(|d| d.is_failure())
    }
}

/// Outcome of [`analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// No valid change touched an analyzable file; nothing was parsed
    NoRelevantChanges {
        /// Notes about the ignored ranges
        diagnostics: Vec<AnalysisDiagnostic>,
    },
    /// Impact was computed (possibly with an empty seed set)
    Impact(Box<AnalysisReport>),
}

impl AnalysisOutcome {
    /// The report, if impact was computed.
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Impact(report) => Some(report.as_ref()),
            AnalysisOutcome::NoRelevantChanges { .. } => None,
        }
    }

    pub fn is_no_relevant_changes(&self) -> bool {
        matches!(self, AnalysisOutcome::NoRelevantChanges { .. })
    }
}

/// Run the whole pipeline over in-memory sources.
///
/// # Behavior
/// 1. Validate the configuration (negative depth fails here, before any work)
/// 2. Drop malformed ranges and ranges in non-analyzable files
/// 3. Without remaining ranges, return [`AnalysisOutcome::NoRelevantChanges`]
/// 4. Extract facts, build the graph, localize, propagate
///
/// # Errors
/// Only configuration errors; per-file problems end up in
/// [`AnalysisReport::diagnostics`].
pub fn analyze(
    sources: &[SourceFile],
    changes: &[ChangedRange],
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome> {
    let depth = config.validate()?;
    let (relevant, diagnostics) = relevant_changes(changes, config);
    if relevant.is_empty() {
        return Ok(no_relevant_changes(diagnostics));
    }
    Ok(run(sources, &relevant, depth, config, diagnostics))
}

/// Scan `root`, read its sources and analyze the ranges from `changes`.
///
/// # Errors
/// Configuration errors, errors raised by the change source, and
/// [`crate::Error::Walk`] when `root` cannot be scanned.
pub fn analyze_directory(
    root: &Path,
    changes: &dyn ChangeSource,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome> {
    let depth = config.validate()?;
    let ranges = changes.changed_ranges()?;
    let (relevant, mut diagnostics) = relevant_changes(&ranges, config);
    if relevant.is_empty() {
        return Ok(no_relevant_changes(diagnostics));
    }

    let paths = scan_directory(root, config)?;
    let (sources, read_failures) = load_sources(root, &paths);
    diagnostics.extend(read_failures);

    Ok(run(&sources, &relevant, depth, config, diagnostics))
}

/// Split `changes` into usable ranges and notes about the rest.
fn relevant_changes(
    changes: &[ChangedRange],
    config: &AnalysisConfig,
) -> (Vec<ChangedRange>, Vec<AnalysisDiagnostic>) {
    let mut relevant = Vec::new();
    let mut diagnostics = Vec::new();

    for range in changes {
        if !range.is_valid() {
            tracing::warn!(
                file = %range.file.display(),
                start = range.start_line,
                end = range.end_line,
                "ignoring malformed changed range"
            );
            diagnostics.push(AnalysisDiagnostic::InvalidRange {
                path: range.file.display().to_string(),
                start_line: range.start_line,
                end_line: range.end_line,
            });
        } else if config.is_analyzable(&range.file) {
            relevant.push(range.clone());
        }
    }

    (relevant, diagnostics)
}

fn no_relevant_changes(mut diagnostics: Vec<AnalysisDiagnostic>) -> AnalysisOutcome {
    tracing::info!("no relevant changes");
    diagnostics.sort();
    AnalysisOutcome::NoRelevantChanges { diagnostics }
}

fn run(
    sources: &[SourceFile],
    changes: &[ChangedRange],
    depth: Depth,
    config: &AnalysisConfig,
    mut diagnostics: Vec<AnalysisDiagnostic>,
) -> AnalysisOutcome {
    let extraction = extract_all(sources, config);
    diagnostics.extend(extraction.failures.iter().map(ParseFailure::to_diagnostic));

    let graph = CallGraphBuilder::new()
        .with_external_names(config.external_names.iter().cloned())
        .build(&extraction.facts);
    for (callee, candidates) in graph.ambiguous_names() {
        diagnostics.push(AnalysisDiagnostic::AmbiguousCall {
            callee: callee.clone(),
            candidates: candidates.iter().map(|id| id.file.display().to_string()).collect(),
        });
    }

    let localization = localize(&extraction.facts, changes);
    for (path, ranges) in &localization.unanalyzed {
        diagnostics.push(AnalysisDiagnostic::UnanalyzedFile {
            path: path.display().to_string(),
            range_count: ranges.len(),
        });
    }
    for range in localization.unmapped() {
        diagnostics.push(AnalysisDiagnostic::UnmappedRange {
            path: range.file.display().to_string(),
            start_line: range.start_line,
            end_line: range.end_line,
        });
    }
    diagnostics.sort();

    let seeds = localization.seeds();
    let impact = propagate(&graph, &seeds, depth);
    let per_function = propagate_each(&graph, &seeds, depth);

    tracing::info!(
        seeds = seeds.len(),
        upstream = impact.upstream.len(),
        downstream = impact.downstream.len(),
        diagnostics = diagnostics.len(),
        "analysis complete"
    );

    AnalysisOutcome::Impact(Box::new(AnalysisReport {
        impact,
        localization,
        per_function,
        stats: graph.stats(),
        diagnostics,
        facts: extraction.facts,
        graph,
    }))
}
