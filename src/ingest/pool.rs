//! Thread-local parser pool for reusing tree-sitter Parser instances.
//!
//! Creating a `tree_sitter::Parser` and loading the C grammar for every
//! file is wasted work when rayon workers extract thousands of files.
//! Each worker thread keeps one lazily-initialized C parser instead.
//!
//! - Thread-local storage: no locks, no sharing between workers
//! - Lazy initialization: parser created on first use per thread
//!
//! # Usage
//!
//! ```rust
//! use blast_radius::ingest::pool::with_c_parser;
//!
//! let source = b"int main(void) { return 0; }";
//! let tree = with_c_parser(|parser| parser.parse(source, None)).unwrap();
//! assert!(tree.is_some());
//! ```

use anyhow::{anyhow, Context, Result};
use std::cell::RefCell;

thread_local! {
    static C_PARSER: RefCell<Option<tree_sitter::Parser>> = RefCell::new(None);
}

/// Build a parser with the C grammar loaded.
pub fn new_c_parser() -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_c::language())
        .context("loading tree-sitter-c grammar")?;
    Ok(parser)
}

/// Execute a function with this thread's C parser.
///
/// # Errors
/// Returns an error only if the grammar cannot be loaded (ABI mismatch
/// between tree-sitter and tree-sitter-c).
pub fn with_c_parser<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    C_PARSER.with(|parser_cell| {
        let mut parser_ref = parser_cell.borrow_mut();
        if parser_ref.is_none() {
            *parser_ref = Some(new_c_parser()?);
        }
        match parser_ref.as_mut() {
            Some(parser) => Ok(f(parser)),
            None => Err(anyhow!("C parser missing after initialization")),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_reused_within_thread() {
        let first = with_c_parser(|parser| parser.parse(b"int a(void) { return 1; }", None))
            .unwrap()
            .unwrap();
        let second = with_c_parser(|parser| parser.parse(b"int b(void) { return 2; }", None))
            .unwrap()
            .unwrap();

        assert_eq!(first.root_node().kind(), "translation_unit");
        assert_eq!(second.root_node().kind(), "translation_unit");
    }

    #[test]
    fn test_parsers_on_worker_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let source = format!("int f{}(void) {{ return {}; }}", i, i);
                    with_c_parser(|parser| parser.parse(source.as_bytes(), None).is_some()).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
