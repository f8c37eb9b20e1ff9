//! Structured diagnostics for an analysis run.
//!
//! Provides deterministic, sortable diagnostic types for per-file failures
//! and informational outcomes (unmapped changes, ambiguous call targets).
//! None of these abort a run.

pub mod analysis_diagnostics;

pub use analysis_diagnostics::{AnalysisDiagnostic, DiagnosticStage};
