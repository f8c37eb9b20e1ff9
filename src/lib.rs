//! blast-radius: deterministic change impact analysis for C code
//!
//! Given the sources of a C project and a set of changed line ranges,
//! blast-radius finds the functions that were directly changed and the
//! functions that may be affected through the call graph: callers
//! (upstream) and callees (downstream) within a bounded number of hops.
//!
//! The pipeline is four small stages, each usable on its own:
//!
//! 1. [`ingest`]: syntax tree → [`FunctionRecord`] / [`CallRecord`] facts
//! 2. [`graph`]: facts → [`CallGraph`]
//! 3. [`changes`]: changed ranges + facts → seed functions
//! 4. [`impact`]: graph + seeds + depth → [`ImpactReport`]
//!
//! [`indexer::analyze`] runs all of them and collects diagnostics.
//!
//! # Position Conventions
//!
//! - **Line positions**: 1-indexed and inclusive on both ends, for
//!   function spans, call sites and changed ranges alike
//! - **Paths**: kept exactly as supplied; directory scans produce paths
//!   relative to the scanned root so they match diff paths
//!
//! # Determinism
//!
//! Every collection in a report is ordered by `(file, name)` and every
//! output is a pure function of its inputs. File order, parallelism and
//! repeated runs do not change the result.
//!
//! # Example
//!
//! ```rust
//! use blast_radius::{analyze, AnalysisConfig, ChangedRange, SourceFile};
//!
//! let sources = vec![SourceFile::new(
//!     "auth.c",
//!     "int check(int x) { return x > 0; }\nint login(int x) {\n    return check(x);\n}\n",
//! )];
//! let changes = vec![ChangedRange::line("auth.c", 1).unwrap()];
//!
//! let outcome = analyze(&sources, &changes, &AnalysisConfig::default()).unwrap();
//! let report = outcome.report().unwrap();
//! assert_eq!(report.impact.upstream.len(), 1);
//! ```

pub mod changes;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod impact;
pub mod indexer;
pub mod ingest;
pub mod scan;

pub use changes::{localize, localize_file, ChangeLocalization, ChangeSource, ChangedRange, FileLocalization, UnifiedDiff};
pub use config::{AnalysisConfig, Depth, DEFAULT_EXTENSIONS, DEFAULT_STDLIB_FILTER};
pub use diagnostics::{AnalysisDiagnostic, DiagnosticStage};
pub use error::{Error, Result};
pub use graph::{CallEdge, CallGraph, CallGraphBuilder, Direction, GraphStats};
pub use impact::{propagate, propagate_each, DirectionalImpact, ImpactReport};
pub use indexer::{analyze, analyze_directory, extract_all, AnalysisOutcome, AnalysisReport, Extraction};
pub use ingest::{
    extract_c_file, extract_facts, CParser, CallRecord, CallTarget, FileFacts, FunctionId, FunctionRecord,
    ParseFailure, SyntaxNode,
};
pub use scan::{load_sources, scan_directory, SourceFile};
