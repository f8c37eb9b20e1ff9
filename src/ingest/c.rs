//! C fact extraction using tree-sitter-c.
//!
//! Adapts tree-sitter nodes to [`SyntaxNode`] and runs the generic
//! extractor over them.

use std::path::Path;

use crate::diagnostics::DiagnosticStage;
use crate::error::{Error, Result};
use crate::ingest::{extract_facts, pool, FileFacts, ParseFailure, SyntaxNode};

/// A tree-sitter node paired with the source it was parsed from.
#[derive(Clone, Copy)]
pub struct CNode<'t> {
    node: tree_sitter::Node<'t>,
    source: &'t [u8],
}

impl<'t> CNode<'t> {
    /// Underlying tree-sitter node.
    pub fn raw(&self) -> tree_sitter::Node<'t> {
        self.node
    }
}

impl<'t> SyntaxNode for CNode<'t> {
    fn kind(&self) -> &str {
        self.node.kind()
    }

    fn start_line(&self) -> usize {
        self.node.start_position().row + 1 // tree-sitter is 0-indexed
    }

    fn end_line(&self) -> usize {
        self.node.end_position().row + 1
    }

    fn children(&self) -> Vec<Self> {
        let mut cursor = self.node.walk();
        self.node
            .children(&mut cursor)
            .map(|node| CNode {
                node,
                source: self.source,
            })
            .collect()
    }

    fn child_by_field(&self, field: &str) -> Option<Self> {
        self.node.child_by_field_name(field).map(|node| CNode {
            node,
            source: self.source,
        })
    }

    fn text(&self) -> Option<String> {
        self.node
            .utf8_text(self.source)
            .ok()
            .map(|text| text.to_string())
    }
}

/// A parsed C file.
pub struct CTree<'s> {
    tree: tree_sitter::Tree,
    source: &'s [u8],
}

impl<'s> CTree<'s> {
    /// Root node of the translation unit.
    pub fn root(&self) -> CNode<'_> {
        CNode {
            node: self.tree.root_node(),
            source: self.source,
        }
    }

    /// Whether the parser had to recover from syntax errors.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

/// Parser that extracts function and call facts from C source code.
///
/// Pure function: Input (path, contents) → Output FileFacts
/// No filesystem access. No global state. No caching.
pub struct CParser {
    parser: tree_sitter::Parser,
}

impl CParser {
    /// Create a new parser for C source code.
    pub fn new() -> Result<Self> {
        let parser = pool::new_c_parser().map_err(|e| Error::ParserInit(format!("{:#}", e)))?;
        Ok(Self { parser })
    }

    /// Parse C source into a syntax tree.
    pub fn parse<'s>(&mut self, file_path: &Path, source: &'s [u8]) -> std::result::Result<CTree<'s>, ParseFailure> {
        match self.parser.parse(source, None) {
            Some(tree) => Ok(CTree { tree, source }),
            None => Err(no_tree(file_path)),
        }
    }

    /// Parse and extract facts in one step.
    ///
    /// # Arguments
    /// * `file_path` - Path to the file (for context only, not accessed)
    /// * `source` - Source code content as bytes
    /// * `strict` - Reject trees that contain syntax errors
    pub fn extract(
        &mut self,
        file_path: &Path,
        source: &[u8],
        strict: bool,
    ) -> std::result::Result<FileFacts, ParseFailure> {
        let tree = self.parse(file_path, source)?;
        facts_from_tree(file_path, &tree, strict)
    }
}

/// Extract facts from C source using this thread's pooled parser.
///
/// Used by the parallel extraction pipeline; equivalent to
/// [`CParser::extract`].
pub fn extract_c_file(
    file_path: &Path,
    source: &[u8],
    strict: bool,
) -> std::result::Result<FileFacts, ParseFailure> {
    let tree = pool::with_c_parser(|parser| parser.parse(source, None))
        .map_err(|e| ParseFailure::new(file_path, DiagnosticStage::Parse, format!("{:#}", e)))?
        .ok_or_else(|| no_tree(file_path))?;
    let tree = CTree { tree, source };
    facts_from_tree(file_path, &tree, strict)
}

fn facts_from_tree(
    file_path: &Path,
    tree: &CTree<'_>,
    strict: bool,
) -> std::result::Result<FileFacts, ParseFailure> {
    if tree.has_errors() {
        if strict {
            return Err(ParseFailure::new(
                file_path,
                DiagnosticStage::Syntax,
                "syntax tree contains error nodes",
            ));
        }
        tracing::debug!(
            file = %file_path.display(),
            "syntax errors recovered, extracting partial facts"
        );
    }
    Ok(extract_facts(file_path, &tree.root()))
}

fn no_tree(file_path: &Path) -> ParseFailure {
    ParseFailure::new(file_path, DiagnosticStage::Parse, "parser produced no syntax tree")
}
