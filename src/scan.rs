//! Directory scanning and source loading.
//!
//! Collects analyzable C sources under a root directory. Paths are kept
//! relative to the root so they line up with the paths a diff reports.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::diagnostics::{AnalysisDiagnostic, DiagnosticStage};
use crate::error::{Error, Result};

/// One source file handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the analysis root
    pub path: PathBuf,
    /// Raw file contents
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Find every analyzable file below `root`.
///
/// # Returns
/// Paths relative to `root`, sorted
///
/// # Guarantees
/// - Only files with a configured extension are returned
/// - Hidden directories (`.git`, `.cache`, ...) are not entered
/// - Unreadable entries below the root are skipped
///
/// # Errors
/// [`Error::Walk`] when `root` is not a readable directory.
pub fn scan_directory(root: &Path, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::Walk {
            root: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files: Vec<PathBuf> = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::Walk {
                    root: root.to_path_buf(),
                    message: e.to_string(),
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !config.is_analyzable(entry.path()) {
            continue;
        }

        match entry.path().strip_prefix(root) {
            Ok(relative) => files.push(relative.to_path_buf()),
            Err(_) => files.push(entry.path().to_path_buf()),
        }
    }

    files.sort();
    tracing::debug!(root = %root.display(), files = files.len(), "scanned directory");
    Ok(files)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Read `paths` (relative to `root`) into memory.
///
/// Files that cannot be read are reported as `ParseFailed` diagnostics
/// with stage `Read` and left out of the returned sources.
pub fn load_sources(root: &Path, paths: &[PathBuf]) -> (Vec<SourceFile>, Vec<AnalysisDiagnostic>) {
    let mut sources = Vec::with_capacity(paths.len());
    let mut diagnostics = Vec::new();

    for path in paths {
        match std::fs::read(root.join(path)) {
            Ok(contents) => sources.push(SourceFile::new(path.clone(), contents)),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot read source file");
                diagnostics.push(AnalysisDiagnostic::parse_failed(
                    path.display().to_string(),
                    DiagnosticStage::Read,
                    e.to_string(),
                ));
            }
        }
    }

    (sources, diagnostics)
}
