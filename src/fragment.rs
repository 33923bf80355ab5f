//! Change fragments: one file's raw diff body.
//!
//! Fragments are produced by whatever inspects the repository. This module only
//! holds the value type, the added/removed line counting rule shared by every
//! consumer, and a splitter for `git diff` output used by the CLI.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const DIFF_HEADER_PREFIX: &str = "diff --git ";

/// `a/X b/Y`, where either side may be C-quoted (`"b/caf\303\251.rs"`)
static DIFF_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:"a/(?:[^"\\]|\\.)*"|a/.*?) (?:"b/((?:[^"\\]|\\.)*)"|b/(.*))$"#)
        .expect("valid diff header regex")
});

/// One file's change text (a unified-diff-like body)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFragment {
    pub path: String,
    pub text: String,
}

impl ChangeFragment {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Count added/removed lines in this fragment
    pub fn line_stats(&self) -> LineStats {
        let mut stats = LineStats::default();
        for line in self.text.lines() {
            match classify_line(line) {
                Some(ChangeKind::Added) => stats.added += 1,
                Some(ChangeKind::Removed) => stats.removed += 1,
                None => {}
            }
        }
        stats
    }
}

/// Direction of a changed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
}

impl ChangeKind {
    /// Marker used when rendering the change back as a diff line
    pub fn marker(&self) -> char {
        match self {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        }
    }
}

/// Added/removed line totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStats {
    pub added: usize,
    pub removed: usize,
}

impl std::ops::AddAssign for LineStats {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.removed += other.removed;
    }
}

/// Sum line stats across fragments
pub fn total_line_stats(fragments: &[ChangeFragment]) -> LineStats {
    let mut total = LineStats::default();
    for fragment in fragments {
        total += fragment.line_stats();
    }
    total
}

/// Classify a raw diff line. `+++`/`---` file headers are not changes.
pub fn classify_line(line: &str) -> Option<ChangeKind> {
    if line.starts_with('+') && !line.starts_with("+++") {
        Some(ChangeKind::Added)
    } else if line.starts_with('-') && !line.starts_with("---") {
        Some(ChangeKind::Removed)
    } else {
        None
    }
}

/// Post-image path of a `diff --git` header, given the text after the prefix.
///
/// Headers that do not parse keep their raw text as the path.
fn header_path(header: &str) -> String {
    match DIFF_HEADER_RE.captures(header) {
        Some(captures) => match (captures.get(1), captures.get(2)) {
            (Some(quoted), _) => unquote_path(quoted.as_str()),
            (None, Some(plain)) => plain.as_str().to_string(),
            (None, None) => header.to_string(),
        },
        None => header.trim().to_string(),
    }
}

/// Undo git's C-style path quoting. Octal escapes are raw bytes of a UTF-8 path.
fn unquote_path(quoted: &str) -> String {
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut input = quoted.bytes().peekable();

    while let Some(byte) = input.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match input.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(digit @ b'0'..=b'7') => {
                let mut value = u32::from(digit - b'0');
                for _ in 0..2 {
                    match input.peek().copied() {
                        Some(next @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(next - b'0');
                            input.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Split `git diff` output into one fragment per file.
///
/// Text before the first `diff --git` header is ignored. Every header line opens
/// a new fragment; its path is the post-image path (`b/...`), unquoted.
pub fn split_unified_diff(diff_content: &str) -> Vec<ChangeFragment> {
    let mut fragments = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in diff_content.lines() {
        if let Some(header) = line.strip_prefix(DIFF_HEADER_PREFIX) {
            if let Some((path, body)) = current.take() {
                fragments.push(ChangeFragment::new(path, body.join("\n")));
            }
            current = Some((header_path(header), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((path, body)) = current {
        fragments.push(ChangeFragment::new(path, body.join("\n")));
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_stats_skip_headers() {
        let fragment = ChangeFragment::new(
            "src/a.rs",
            "--- a/src/a.rs\n+++ b/src/a.rs\n@@ -1,2 +1,3 @@\n context\n+added one\n+added two\n-removed",
        );
        assert_eq!(fragment.line_stats(), LineStats { added: 2, removed: 1 });
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("+x"), Some(ChangeKind::Added));
        assert_eq!(classify_line("-x"), Some(ChangeKind::Removed));
        assert_eq!(classify_line("+++ b/x"), None);
        assert_eq!(classify_line("--- a/x"), None);
        assert_eq!(classify_line(" context"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn test_total_line_stats() {
        let fragments = vec![
            ChangeFragment::new("a", "+1\n+2"),
            ChangeFragment::new("b", "-1\n+3"),
        ];
        assert_eq!(total_line_stats(&fragments), LineStats { added: 3, removed: 1 });
        assert_eq!(total_line_stats(&[]), LineStats::default());
    }

    #[test]
    fn test_split_unified_diff() {
        let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
index 123..456 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1 +1,2 @@
+pub mod config;
diff --git a/README.md b/docs/README.md
similarity index 90%
rename from README.md
rename to docs/README.md
";
        let fragments = split_unified_diff(diff);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].path, "src/lib.rs");
        assert!(fragments[0].text.contains("+pub mod config;"));
        assert_eq!(fragments[0].line_stats(), LineStats { added: 1, removed: 0 });
        assert_eq!(fragments[1].path, "docs/README.md");
    }

    #[test]
    fn test_split_ignores_preamble() {
        assert!(split_unified_diff("not a diff\n+stray").is_empty());
    }

    #[test]
    fn test_split_quoted_paths() {
        let diff = r#"diff --git a/src/a.rs b/src/a.rs
--- a/src/a.rs
+++ b/src/a.rs
+one
diff --git "a/src/caf\303\251.rs" "b/src/caf\303\251.rs"
--- "a/src/caf\303\251.rs"
+++ "b/src/caf\303\251.rs"
+two
+three
diff --git a/docs/old name.md "b/docs/tab\there.md"
-gone
"#;
        let fragments = split_unified_diff(diff);
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].line_stats(), LineStats { added: 1, removed: 0 });
        assert_eq!(fragments[1].path, "src/café.rs");
        assert_eq!(fragments[1].line_stats(), LineStats { added: 2, removed: 0 });
        assert_eq!(fragments[2].path, "docs/tab\there.md");
        assert_eq!(fragments[2].line_stats(), LineStats { added: 0, removed: 1 });
    }

    #[test]
    fn test_unparsed_header_still_starts_fragment() {
        let fragments = split_unified_diff("diff --git a/x.rs b/x.rs\n+1\ndiff --git weird\n+2\n");
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].line_stats(), LineStats { added: 1, removed: 0 });
        assert_eq!(fragments[1].path, "weird");
    }

    #[test]
    fn test_unquote_path() {
        assert_eq!(unquote_path(r"src/caf\303\251.rs"), "src/café.rs");
        assert_eq!(unquote_path(r#"a \"b\" \\ c"#), "a \"b\" \\ c");
        assert_eq!(unquote_path("plain"), "plain");
    }
}
