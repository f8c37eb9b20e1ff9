//! Unified diff change source.
//!
//! Extracts changed line ranges from unified diff text such as `git show`
//! or `git diff` output. Lines are numbered in the new version of each
//! file:
//! - an added line is recorded at its own position
//! - a removed line is recorded at the position where it used to be
//! - consecutive changed lines merge into one range
//!
//! Deleted files (`+++ /dev/null`) and binary files produce no ranges.
//! Renamed files use the new path. Every other file is reported as is;
//! the analysis pipeline drops paths outside `AnalysisConfig::extensions`.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use super::{ChangeSource, ChangedRange};
use crate::error::Result;

/// Compiled once, reused across all parses
fn hunk_header() -> &'static Regex {
    static HUNK_RE: OnceLock<Regex> = OnceLock::new();
    HUNK_RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hardcoded hunk regex")
    })
}

/// Unified diff text used as a [`ChangeSource`].
#[derive(Debug, Clone)]
pub struct UnifiedDiff {
    text: String,
    extensions: Option<Vec<String>>,
}

impl UnifiedDiff {
    /// Wrap diff text; ranges are reported for every non-deleted file.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            extensions: None,
        }
    }

    /// Restrict to files with these extensions (without the dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Parse the diff into merged ranges, sorted by file then line.
    pub fn ranges(&self) -> Vec<ChangedRange> {
        let lines = changed_lines(&self.text);
        let mut ranges = Vec::new();

        for (file, lines) in lines {
            if !self.is_analyzable(&file) {
                continue;
            }
            ranges.extend(merge_lines(&file, &lines));
        }

        ranges
    }

    fn is_analyzable(&self, file: &str) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        match file.rsplit_once('.') {
            Some((_, ext)) => extensions.iter().any(|allowed| allowed == ext),
            None => false,
        }
    }
}

impl ChangeSource for UnifiedDiff {
    fn changed_ranges(&self) -> Result<Vec<ChangedRange>> {
        Ok(self.ranges())
    }
}

/// Position inside the hunk currently being read.
struct Hunk {
    new_line: usize,
    old_remaining: usize,
    new_remaining: usize,
}

impl Hunk {
    fn is_done(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }
}

/// Changed new-side line numbers per file.
fn changed_lines(text: &str) -> BTreeMap<String, BTreeSet<usize>> {
    let text = text.replace("\r\n", "\n");
    let mut result: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
    let mut current_file: Option<String> = None;
    let mut hunk: Option<Hunk> = None;

    for line in text.lines() {
        if let Some(active) = hunk.as_mut() {
            if !active.is_done() {
                let changed = advance_hunk(active, line);
                if let (Some(file), Some(changed)) = (&current_file, changed) {
                    result.entry(file.clone()).or_default().insert(changed);
                }
                continue;
            }
            hunk = None;
        }

        if line.starts_with("diff --git ") || line.starts_with("Binary files ") {
            current_file = None;
        } else if let Some(path) = line.strip_prefix("+++ ") {
            current_file = new_side_path(path);
        } else if let Some(caps) = hunk_header().captures(line) {
            let count = |index: usize| {
                caps.get(index)
                    .and_then(|m| m.as_str().parse::<usize>().ok())
                    .unwrap_or(1)
            };
            let new_start = caps[3].parse::<usize>().unwrap_or(1);
            hunk = Some(Hunk {
                new_line: new_start.max(1),
                old_remaining: count(2),
                new_remaining: count(4),
            });
        }
    }

    result
}

/// Consume one hunk body line, returning the changed new-side line if any.
fn advance_hunk(hunk: &mut Hunk, line: &str) -> Option<usize> {
    match line.as_bytes().first() {
        Some(b'+') => {
            let changed = hunk.new_line;
            hunk.new_line = hunk.new_line.saturating_add(1);
            hunk.new_remaining = hunk.new_remaining.saturating_sub(1);
            Some(changed)
        }
        Some(b'-') => {
            hunk.old_remaining = hunk.old_remaining.saturating_sub(1);
            Some(hunk.new_line)
        }
        // "\ No newline at end of file"
        Some(b'\\') => None,
        // Context line; some tools strip the leading space of blank lines
        _ => {
            hunk.new_line = hunk.new_line.saturating_add(1);
            hunk.old_remaining = hunk.old_remaining.saturating_sub(1);
            hunk.new_remaining = hunk.new_remaining.saturating_sub(1);
            None
        }
    }
}

/// Path on a `+++` line, without the `b/` prefix or trailing timestamp.
fn new_side_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == "/dev/null" {
        return None;
    }
    let path = path.strip_prefix("b/").unwrap_or(path);
    Some(path.to_string())
}

/// Group sorted line numbers into maximal consecutive ranges.
fn merge_lines(file: &str, lines: &BTreeSet<usize>) -> Vec<ChangedRange> {
    let mut ranges = Vec::new();
    let mut current: Option<(usize, usize)> = None;

    for &line in lines {
        current = match current {
            Some((start, end)) if end.checked_add(1) == Some(line) => Some((start, line)),
            Some((start, end)) => {
                ranges.push(ChangedRange {
                    file: PathBuf::from(file),
                    start_line: start,
                    end_line: end,
                });
                Some((line, line))
            }
            None => Some((line, line)),
        };
    }
    if let Some((start, end)) = current {
        ranges.push(ChangedRange {
            file: PathBuf::from(file),
            start_line: start,
            end_line: end,
        });
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ranges: &[ChangedRange]) -> Vec<(String, usize, usize)> {
        ranges
            .iter()
            .map(|r| (r.file.display().to_string(), r.start_line, r.end_line))
            .collect()
    }

    #[test]
    fn test_added_lines_grouped() {
        let diff = "\
diff --git a/src/auth.c b/src/auth.c
index 1111111..2222222 100644
--- a/src/auth.c
+++ b/src/auth.c
@@ -5,4 +5,6 @@ int login_user(const char *name)
 {
+    log_attempt(name);
+    audit(name);
     int conn = connect_db();
     if (conn < 0) {
";
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(spans(&ranges), vec![("src/auth.c".to_string(), 6, 7)]);
    }

    #[test]
    fn test_modified_line_and_deletion_positions() {
        let diff = "\
--- a/net.c
+++ b/net.c
@@ -10,5 +10,4 @@
 int handle_request(int fd)
-    int rc = read_req(fd);
+    int rc = read_request(fd);
-    trace(rc);
     return login_user(rc);
 }
";
        let ranges = UnifiedDiff::new(diff).ranges();
        // 11: removed + added at the same position, 12: removed trace line
        assert_eq!(spans(&ranges), vec![("net.c".to_string(), 11, 12)]);
    }

    #[test]
    fn test_multiple_hunks_and_files_sorted() {
        let diff = "\
diff --git a/b.c b/b.c
--- a/b.c
+++ b/b.c
@@ -1,2 +1,2 @@
-int x;
+int y;
 int z;
@@ -20,1 +20,2 @@
 void f(void) {}
+void g(void) {}
diff --git a/a.h b/a.h
--- a/a.h
+++ b/a.h
@@ -3 +3 @@
-#define A 1
+#define A 2
";
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(
            spans(&ranges),
            vec![
                ("a.h".to_string(), 3, 3),
                ("b.c".to_string(), 1, 1),
                ("b.c".to_string(), 21, 21),
            ]
        );
    }

    #[test]
    fn test_deleted_and_binary_files_skipped() {
        let diff = "\
diff --git a/old.c b/old.c
deleted file mode 100644
--- a/old.c
+++ /dev/null
@@ -1,3 +0,0 @@
-int old(void) {
-    return 0;
-}
diff --git a/logo.png b/logo.png
Binary files a/logo.png and b/logo.png differ
";
        assert!(UnifiedDiff::new(diff).ranges().is_empty());
    }

    #[test]
    fn test_non_c_files_reported_unless_restricted() {
        let diff = "\
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-# Title
+# New title
";
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(spans(&ranges), vec![("README.md".to_string(), 1, 1)]);
        assert!(UnifiedDiff::new(diff).with_extensions(["c", "h"]).ranges().is_empty());
    }

    #[test]
    fn test_rename_uses_new_path() {
        let diff = "\
diff --git a/src/old_name.c b/src/new_name.c
similarity index 90%
rename from src/old_name.c
rename to src/new_name.c
--- a/src/old_name.c
+++ b/src/new_name.c
@@ -2,2 +2,2 @@
 int f(void) {
-    return 1;
+    return 2;
";
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(spans(&ranges), vec![("src/new_name.c".to_string(), 3, 3)]);
    }

    #[test]
    fn test_header_lines_of_next_file_not_counted() {
        let diff = "\
--- a/a.c
+++ b/a.c
@@ -1,1 +1,2 @@
 int a;
+int b;
--- a/c.c
+++ b/c.c
@@ -4,1 +4,1 @@
-int c;
+int d;
";
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(
            spans(&ranges),
            vec![("a.c".to_string(), 2, 2), ("c.c".to_string(), 4, 4)]
        );
    }

    #[test]
    fn test_custom_extensions() {
        let diff = "\
--- a/lib.cc
+++ b/lib.cc
@@ -1 +1 @@
-int a;
+int b;
";
        assert!(UnifiedDiff::new(diff).with_extensions(["c", "h"]).ranges().is_empty());
        let ranges = UnifiedDiff::new(diff).with_extensions(["cc"]).ranges();
        assert_eq!(spans(&ranges), vec![("lib.cc".to_string(), 1, 1)]);
    }

    #[test]
    fn test_hunk_near_largest_line_number() {
        let diff = format!(
            "--- a/big.c\n+++ b/big.c\n@@ -1,1 +{},3 @@\n+int a;\n+int b;\n int c;\n",
            usize::MAX - 1
        );
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(spans(&ranges), vec![("big.c".to_string(), usize::MAX - 1, usize::MAX)]);

        let diff = format!("--- a/big.c\n+++ b/big.c\n@@ -1 +{} @@\n-int a;\n+int b;\n", usize::MAX);
        let ranges = UnifiedDiff::new(diff).ranges();
        assert_eq!(spans(&ranges), vec![("big.c".to_string(), usize::MAX, usize::MAX)]);
    }

    #[test]
    fn test_empty_diff() {
        assert!(UnifiedDiff::new("").changed_ranges().unwrap().is_empty());
    }
}
