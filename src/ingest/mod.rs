//! Syntax fact extraction.
//!
//! Turns one file's concrete syntax tree into flat [`FunctionRecord`] and
//! [`CallRecord`] facts. Extraction is written against the [`SyntaxNode`]
//! trait so any parser that exposes node kind, line span and children can
//! be plugged in; [`c`] provides the tree-sitter-c implementation.
//!
//! Node kinds follow the tree-sitter-c vocabulary (`function_definition`,
//! `call_expression`, `identifier`, ...) and field names follow its
//! grammar (`declarator`, `body`, `function`).
//!
//! # Guarantees
//! - Pure function: same (path, tree) → same facts
//! - No filesystem access
//! - Facts come out in source order

pub mod c;
pub mod pool;

pub use c::{extract_c_file, CParser, CTree};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::diagnostics::{AnalysisDiagnostic, DiagnosticStage};

/// Read-only view of a concrete syntax tree node.
///
/// Lines are 1-indexed and inclusive.
pub trait SyntaxNode: Sized {
    /// Grammar kind of this node, e.g. `function_definition`
    fn kind(&self) -> &str;
    /// First line covered by the node
    fn start_line(&self) -> usize;
    /// Last line covered by the node
    fn end_line(&self) -> usize;
    /// Direct children in source order
    fn children(&self) -> Vec<Self>;
    /// Child stored under a grammar field name
    fn child_by_field(&self, field: &str) -> Option<Self>;
    /// Source text covered by the node, if it is valid UTF-8
    fn text(&self) -> Option<String>;
}

/// Identity of a function node in the call graph.
///
/// Ordering is lexicographic by `(file, name)`, which is the order every
/// report uses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId {
    /// File defining the function
    pub file: PathBuf,
    /// Function identifier
    pub name: String,
}

impl FunctionId {
    pub fn new(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.name)
    }
}

/// One function definition in one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Function identifier
    pub name: String,
    /// File containing the definition
    pub file: PathBuf,
    /// First line of the definition (1-indexed)
    pub start_line: usize,
    /// Last line of the definition (1-indexed, inclusive)
    pub end_line: usize,
}

impl FunctionRecord {
    pub fn new(
        file: impl Into<PathBuf>,
        name: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        debug_assert!(start_line <= end_line, "function span must not be inverted");
        Self {
            name: name.into(),
            file: file.into(),
            start_line,
            end_line,
        }
    }

    /// Graph identity of this definition.
    pub fn id(&self) -> FunctionId {
        FunctionId::new(self.file.clone(), self.name.clone())
    }

    /// Whether `line` falls inside the definition.
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Whether the definition shares at least one line with `[start, end]`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        !(end < self.start_line || start > self.end_line)
    }
}

/// What a call expression invokes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CallTarget {
    /// Callee written as a bare identifier
    Named(String),
    /// Callee is any other expression (`(*fp)(x)`, `ops->run(x)`, `table[i](x)`).
    ///
    /// Function pointers are not resolved; these calls count as call sites
    /// but never become graph edges.
    Indirect {
        /// Source text of the callee expression
        expression: String,
    },
}

impl CallTarget {
    /// Identifier text for named calls.
    pub fn name(&self) -> Option<&str> {
        match self {
            CallTarget::Named(name) => Some(name),
            CallTarget::Indirect { .. } => None,
        }
    }
}

/// One call expression inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallRecord {
    /// Owning function
    pub caller: FunctionId,
    /// First line of the owning definition, disambiguating same-file duplicates
    pub caller_start_line: usize,
    /// Invoked callee
    pub target: CallTarget,
    /// Line of the call expression
    pub line: usize,
}

impl CallRecord {
    /// Named call made from `caller`.
    pub fn named(caller: &FunctionRecord, callee: impl Into<String>, line: usize) -> Self {
        Self::new(caller, CallTarget::Named(callee.into()), line)
    }

    pub fn new(caller: &FunctionRecord, target: CallTarget, line: usize) -> Self {
        debug_assert!(
            caller.contains_line(line),
            "call at line {} outside caller {} ({}-{})",
            line,
            caller.name,
            caller.start_line,
            caller.end_line
        );
        Self {
            caller: caller.id(),
            caller_start_line: caller.start_line,
            target,
            line,
        }
    }
}

/// All facts extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    /// File the facts were extracted from
    pub path: PathBuf,
    /// Function definitions, in source order
    pub functions: Vec<FunctionRecord>,
    /// Call sites, in source order
    pub calls: Vec<CallRecord>,
}

impl FileFacts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Call sites belonging to one definition, in source order.
    pub fn calls_in<'a>(
        &'a self,
        function: &'a FunctionRecord,
    ) -> impl Iterator<Item = &'a CallRecord> + 'a {
        self.calls.iter().filter(move |call| {
            call.caller.name == function.name && call.caller_start_line == function.start_line
        })
    }
}

/// A file that contributed no facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// File that failed
    pub path: PathBuf,
    /// Where processing stopped
    pub stage: DiagnosticStage,
    /// Reason
    pub message: String,
}

impl ParseFailure {
    pub fn new(path: impl Into<PathBuf>, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stage,
            message: message.into(),
        }
    }

    /// Convert into a report diagnostic.
    pub fn to_diagnostic(&self) -> AnalysisDiagnostic {
        AnalysisDiagnostic::parse_failed(
            self.path.display().to_string(),
            self.stage.clone(),
            self.message.clone(),
        )
    }
}

/// Extract function and call facts from a parsed file.
///
/// # Arguments
/// * `file_path` - Path recorded on every fact (not accessed)
/// * `root` - Root node of the file's syntax tree
pub fn extract_facts<N: SyntaxNode>(file_path: &Path, root: &N) -> FileFacts {
    let mut facts = FileFacts::new(file_path);
    walk_definitions(root, file_path, &mut facts);
    facts
}

/// Walk the tree looking for function definitions.
///
/// Uses an explicit work stack: expression chains such as `a + b + ...`
/// nest one level per operator and can be far deeper than a thread stack.
fn walk_definitions<N: SyntaxNode>(root: &N, file_path: &Path, facts: &mut FileFacts) {
    if visit_definition(root, file_path, facts) {
        return;
    }

    let mut stack: Vec<N> = root.children().into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if visit_definition(&node, file_path, facts) {
            continue;
        }
        // Reversed so children pop in source order
        stack.extend(node.children().into_iter().rev());
    }
}

/// Record `node` if it is a function definition.
///
/// Returns true for any `function_definition`, even one without a usable
/// name: C has no nested definitions, so nothing below it is walked.
fn visit_definition<N: SyntaxNode>(node: &N, file_path: &Path, facts: &mut FileFacts) -> bool {
    if node.kind() != "function_definition" {
        return false;
    }
    if let Some(function) = function_record(node, file_path) {
        if let Some(body) = node.child_by_field("body") {
            walk_calls(&body, &function, &mut facts.calls);
        }
        facts.functions.push(function);
    }
    true
}

/// Build a record for a definition with both a declarator and a body.
fn function_record<N: SyntaxNode>(node: &N, file_path: &Path) -> Option<FunctionRecord> {
    let declarator = node.child_by_field("declarator")?;
    node.child_by_field("body")?;

    let name = match declarator_name(&declarator) {
        Some(name) => name,
        None => {
            tracing::debug!(
                file = %file_path.display(),
                line = node.start_line(),
                "function definition without a resolvable name"
            );
            return None;
        }
    };

    Some(FunctionRecord::new(
        file_path,
        name,
        node.start_line(),
        node.end_line().max(node.start_line()),
    ))
}

/// Find the defined identifier inside a (possibly wrapped) declarator.
///
/// Handles `f(void)`, `*f(void)`, `(f)(void)` and `(*f(void))(int)`.
fn declarator_name<N: SyntaxNode>(declarator: &N) -> Option<String> {
    let mut inner = match declarator.kind() {
        "identifier" => return declarator.text(),
        kind if is_wrapping_declarator(kind) => inner_declarator(declarator)?,
        _ => return None,
    };
    loop {
        inner = match inner.kind() {
            "identifier" => return inner.text(),
            kind if is_wrapping_declarator(kind) => inner_declarator(&inner)?,
            _ => return None,
        };
    }
}

fn is_wrapping_declarator(kind: &str) -> bool {
    matches!(
        kind,
        "function_declarator" | "pointer_declarator" | "attributed_declarator" | "parenthesized_declarator"
    )
}

/// Next declarator layer; `parenthesized_declarator` has no field for it.
fn inner_declarator<N: SyntaxNode>(declarator: &N) -> Option<N> {
    declarator.child_by_field("declarator").or_else(|| {
        declarator
            .children()
            .into_iter()
            .find(|child| child.kind() == "identifier" || child.kind().ends_with("declarator"))
    })
}

/// Collect every call expression below `body`, outermost first.
fn walk_calls<N: SyntaxNode>(body: &N, caller: &FunctionRecord, calls: &mut Vec<CallRecord>) {
    record_call(body, caller, calls);

    let mut stack: Vec<N> = body.children().into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        record_call(&node, caller, calls);
        stack.extend(node.children().into_iter().rev());
    }
}

fn record_call<N: SyntaxNode>(node: &N, caller: &FunctionRecord, calls: &mut Vec<CallRecord>) {
    if node.kind() != "call_expression" {
        return;
    }
    if let Some(callee) = node.child_by_field("function") {
        let target = match (callee.kind(), callee.text()) {
            ("identifier", Some(name)) => CallTarget::Named(name),
            (_, text) => CallTarget::Indirect {
                expression: text.unwrap_or_default(),
            },
        };
        calls.push(CallRecord::new(caller, target, node.start_line()));
    }
}
