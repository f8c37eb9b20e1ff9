//! Change localization.
//!
//! Maps externally supplied changed line ranges onto the function
//! definitions of the same file by interval overlap. No graph traversal
//! happens here.
//!
//! Where ranges come from is up to the caller: anything implementing
//! [`ChangeSource`] works, and [`diff::UnifiedDiff`] reads the ranges out
//! of unified diff text.

pub mod diff;

pub use diff::UnifiedDiff;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingest::{FileFacts, FunctionId, FunctionRecord};

/// One contiguous changed line interval in one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangedRange {
    /// File the change belongs to
    pub file: PathBuf,
    /// First changed line (1-indexed)
    pub start_line: usize,
    /// Last changed line (1-indexed, inclusive)
    pub end_line: usize,
}

impl ChangedRange {
    /// Create a validated range.
    ///
    /// # Errors
    /// [`Error::InvalidRange`] when `start_line` is 0 or after `end_line`.
    pub fn new(file: impl Into<PathBuf>, start_line: usize, end_line: usize) -> Result<Self> {
        let file = file.into();
        if start_line == 0 || start_line > end_line {
            return Err(Error::InvalidRange {
                file,
                start: start_line,
                end: end_line,
            });
        }
        Ok(Self {
            file,
            start_line,
            end_line,
        })
    }

    /// A single changed line.
    pub fn line(file: impl Into<PathBuf>, line: usize) -> Result<Self> {
        Self::new(file, line, line)
    }

    /// Whether the range is well formed.
    pub fn is_valid(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line
    }

    /// Whether `function` shares at least one line with this range.
    pub fn overlaps(&self, function: &FunctionRecord) -> bool {
        function.overlaps(self.start_line, self.end_line)
    }
}

/// Supplier of changed ranges (a commit, a working-tree diff, a list).
///
/// An empty result means "no relevant changes".
pub trait ChangeSource {
    fn changed_ranges(&self) -> Result<Vec<ChangedRange>>;
}

impl ChangeSource for [ChangedRange] {
    fn changed_ranges(&self) -> Result<Vec<ChangedRange>> {
        Ok(self.to_vec())
    }
}

impl ChangeSource for Vec<ChangedRange> {
    fn changed_ranges(&self) -> Result<Vec<ChangedRange>> {
        Ok(self.clone())
    }
}

/// Localization result for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocalization {
    /// File the ranges belong to
    pub file: PathBuf,
    /// Directly impacted definitions, in source order, without repeats
    pub impacted: Vec<FunctionRecord>,
    /// Ranges overlapping no definition, in input order
    pub unmapped: Vec<ChangedRange>,
}

/// Map one file's changed ranges onto that file's definitions.
///
/// A definition is impacted when any range shares at least one line with
/// it. A range spanning a boundary impacts every definition it touches. A
/// range touching none is kept in `unmapped`.
pub fn localize_file(file: &Path, functions: &[FunctionRecord], ranges: &[ChangedRange]) -> FileLocalization {
    let mut impacted: BTreeSet<&FunctionRecord> = BTreeSet::new();
    let mut unmapped = Vec::new();

    for range in ranges {
        debug_assert_eq!(range.file, file, "range localized against another file");
        let mut owned = false;
        for function in functions.iter().filter(|f| range.overlaps(f)) {
            impacted.insert(function);
            owned = true;
        }
        if !owned {
            unmapped.push(range.clone());
        }
    }

    let mut impacted: Vec<FunctionRecord> = impacted.into_iter().cloned().collect();
    impacted.sort_by(|a, b| (a.start_line, &a.name).cmp(&(b.start_line, &b.name)));

    FileLocalization {
        file: file.to_path_buf(),
        impacted,
        unmapped,
    }
}

/// Localization result for a whole change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLocalization {
    /// Per analyzed file that had changes, keyed by path
    pub files: BTreeMap<PathBuf, FileLocalization>,
    /// Ranges naming files with no extracted facts (not analyzed or unparsable)
    pub unanalyzed: BTreeMap<PathBuf, Vec<ChangedRange>>,
}

impl ChangeLocalization {
    /// Seed set for impact propagation.
    pub fn seeds(&self) -> BTreeSet<FunctionId> {
        self.files
            .values()
            .flat_map(|file| file.impacted.iter().map(FunctionRecord::id))
            .collect()
    }

    /// All ranges that overlapped no definition, sorted by file.
    pub fn unmapped(&self) -> impl Iterator<Item = &ChangedRange> {
        self.files.values().flat_map(|file| file.unmapped.iter())
    }

    /// Whether no definition was touched.
    pub fn is_empty(&self) -> bool {
        self.files.values().all(|file| file.impacted.is_empty())
    }
}

/// Map every changed range onto the facts of its file.
pub fn localize<'a, I>(facts: I, ranges: &[ChangedRange]) -> ChangeLocalization
where
    I: IntoIterator<Item = &'a FileFacts>,
{
    let by_path: BTreeMap<&Path, &FileFacts> = facts
        .into_iter()
        .map(|file| (file.path.as_path(), file))
        .collect();

    let mut grouped: BTreeMap<&Path, Vec<ChangedRange>> = BTreeMap::new();
    for range in ranges {
        grouped.entry(range.file.as_path()).or_default().push(range.clone());
    }

    let mut result = ChangeLocalization::default();
    for (path, file_ranges) in grouped {
        match by_path.get(path) {
            Some(file) => {
                let localized = localize_file(path, &file.functions, &file_ranges);
                for range in &localized.unmapped {
                    tracing::info!(
                        file = %path.display(),
                        start = range.start_line,
                        end = range.end_line,
                        "changed lines with no owning function"
                    );
                }
                result.files.insert(path.to_path_buf(), localized);
            }
            None => {
                tracing::warn!(
                    file = %path.display(),
                    ranges = file_ranges.len(),
                    "changed file was not analyzed"
                );
                result.unanalyzed.insert(path.to_path_buf(), file_ranges);
            }
        }
    }

    result
}
