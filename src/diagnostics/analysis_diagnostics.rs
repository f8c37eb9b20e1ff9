//! Analysis diagnostics for skipped files and informational outcomes.
//!
//! - Structured types for per-file failures and notes
//! - Deterministic ordering via sort_key()
//! - Human-readable one-line formatting

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Stage of per-file processing where a failure occurred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagnosticStage {
    /// Failed to read file from filesystem
    Read,
    /// Parser produced no syntax tree
    Parse,
    /// Syntax tree contains error nodes (strict mode only)
    Syntax,
}

impl DiagnosticStage {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Read => 0,
            DiagnosticStage::Parse => 1,
            DiagnosticStage::Syntax => 2,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Read => "reading file",
            DiagnosticStage::Parse => "parsing source",
            DiagnosticStage::Syntax => "checking syntax",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for DiagnosticStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A diagnostic produced while analyzing a change.
///
/// Failures (`ParseFailed`) mean a file contributed no facts. Everything
/// else is informational and reflects a legitimate outcome of the input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnalysisDiagnostic {
    /// File was skipped because it could not be read or parsed
    ParseFailed {
        /// Path relative to the analysis root
        path: String,
        /// Stage where processing stopped
        stage: DiagnosticStage,
        /// Error message
        message: String,
    },
    /// Changed range supplied with `start > end` or a zero line number
    InvalidRange {
        /// File named by the range
        path: String,
        /// Supplied first line
        start_line: usize,
        /// Supplied last line
        end_line: usize,
    },
    /// Changed ranges refer to a file that is not part of the analyzed set
    UnanalyzedFile {
        /// File named by the ranges
        path: String,
        /// Number of ranges that could not be localized
        range_count: usize,
    },
    /// Changed lines with no owning function (includes, globals, comments)
    UnmappedRange {
        /// File containing the range
        path: String,
        /// First changed line
        start_line: usize,
        /// Last changed line
        end_line: usize,
    },
    /// A callee name matched several definitions; all were linked
    AmbiguousCall {
        /// Callee identifier
        callee: String,
        /// Files defining a function with that name, sorted
        candidates: Vec<String>,
    },
}

impl AnalysisDiagnostic {
    /// File path (or callee name for ambiguity notes) this diagnostic is about.
    pub fn subject(&self) -> &str {
        match self {
            AnalysisDiagnostic::ParseFailed { path, .. } => path,
            AnalysisDiagnostic::InvalidRange { path, .. } => path,
            AnalysisDiagnostic::UnanalyzedFile { path, .. } => path,
            AnalysisDiagnostic::UnmappedRange { path, .. } => path,
            AnalysisDiagnostic::AmbiguousCall { callee, .. } => callee,
        }
    }

    /// Whether this diagnostic reports a file that contributed no facts.
    pub fn is_failure(&self) -> bool {
        matches!(self, AnalysisDiagnostic::ParseFailed { .. })
    }

    /// Stable sort key for deterministic ordering.
    ///
    /// Primary: variant (failures first, ambiguity notes last)
    /// Secondary: subject string (lexicographic)
    /// Tertiary: first line or stage key
    pub fn sort_key(&self) -> (u8, &str, usize) {
        match self {
            AnalysisDiagnostic::ParseFailed { path, stage, .. } => {
                (0, path, usize::from(stage.sort_key()))
            }
            AnalysisDiagnostic::InvalidRange { path, start_line, .. } => (1, path, *start_line),
            AnalysisDiagnostic::UnanalyzedFile { path, .. } => (2, path, 0),
            AnalysisDiagnostic::UnmappedRange { path, start_line, .. } => (3, path, *start_line),
            AnalysisDiagnostic::AmbiguousCall { callee, .. } => (4, callee, 0),
        }
    }

    /// Create a ParseFailed diagnostic.
    pub fn parse_failed(path: String, stage: DiagnosticStage, message: String) -> Self {
        AnalysisDiagnostic::ParseFailed {
            path,
            stage,
            message,
        }
    }

    /// Format as a single line.
    ///
    /// Examples:
    /// - "ERROR src/bad.c: parsing source: no syntax tree produced"
    /// - "NOTE src/auth.c: lines 1-3 changed outside any function"
    pub fn format_line(&self) -> String {
        match self {
            AnalysisDiagnostic::ParseFailed {
                path,
                stage,
                message,
            } => format!("ERROR {}: {}: {}", path, stage, message),
            AnalysisDiagnostic::InvalidRange {
                path,
                start_line,
                end_line,
            } => format!("WARN {}: ignored invalid range {}-{}", path, start_line, end_line),
            AnalysisDiagnostic::UnanalyzedFile { path, range_count } => {
                format!("WARN {}: {} changed range(s) in a file that was not analyzed", path, range_count)
            }
            AnalysisDiagnostic::UnmappedRange {
                path,
                start_line,
                end_line,
            } => format!(
                "NOTE {}: lines {}-{} changed outside any function",
                path, start_line, end_line
            ),
            AnalysisDiagnostic::AmbiguousCall { callee, candidates } => format!(
                "NOTE {}: call resolved to {} definitions ({})",
                callee,
                candidates.len(),
                candidates.join(", ")
            ),
        }
    }
}

impl fmt::Display for AnalysisDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_line())
    }
}

impl PartialOrd for AnalysisDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnalysisDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.format_line().cmp(&other.format_line()))
    }
}
