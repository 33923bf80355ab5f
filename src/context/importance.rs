//! Line importance scoring and key change extraction.
//!
//! Scores range 0-5. Rules are checked in order and the first match wins:
//!
//! | score | rule                                                         |
//! |-------|--------------------------------------------------------------|
//! | 5     | definition keyword at line start (`function`, `class`, `fn`) |
//! | 4     | import/export/module inclusion at line start                 |
//! | 4     | upper-snake-case constant assignment                         |
//! | 4     | URL, `/api/`, `endpoint` or `route` anywhere                 |
//! | 4     | manifest key (`"name"`, `"version"`, ...)                    |
//! | 1     | comment marker at line start                                 |
//! | 0     | blank                                                        |
//! | 2     | anything else                                                |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::budget::CascadeSettings;
use crate::fragment::{classify_line, ChangeFragment, ChangeKind};

static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:function|class|def|interface|type|enum|fn|struct|trait|impl|func)\s+\w",
    )
    .expect("valid definition regex")
});
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:import|export|from|require|use|mod|#include)\s").expect("valid import regex")
});
static CONSTANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?i:pub\s+)?(?i:const|let|var|final|static)\s+[A-Z_][A-Z0-9_]*|[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+)\s*(?::[^=]*)?=",
    )
    .expect("valid constant regex")
});
static ENDPOINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(https?://|/api/|endpoint|route)").expect("valid endpoint regex"));
static MANIFEST_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"(name|version|dependencies|scripts)"\s*:"#).expect("valid manifest regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(//|#|/\*|\*)").expect("valid comment regex"));

/// Highest importance score
pub const MAX_IMPORTANCE: u8 = 5;

/// Score a single changed line (without its `+`/`-` marker).
///
/// `kind` is part of the contract but added and removed lines are scored the
/// same way.
pub fn score_line(line: &str, _kind: ChangeKind) -> u8 {
    if DEFINITION_RE.is_match(line) {
        5
    } else if IMPORT_RE.is_match(line)
        || CONSTANT_RE.is_match(line)
        || ENDPOINT_RE.is_match(line)
        || MANIFEST_KEY_RE.is_match(line)
    {
        4
    } else if COMMENT_RE.is_match(line) {
        1
    } else if line.trim().is_empty() {
        0
    } else {
        2
    }
}

/// A changed line worth surfacing in a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChange {
    pub kind: ChangeKind,
    pub content: String,
    pub importance: u8,
}

/// Picks the most informative changed lines out of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChangeExtractor {
    /// Lines scoring below this are dropped
    pub threshold: u8,
    /// At most this many changes are returned
    pub limit: usize,
}

impl Default for KeyChangeExtractor {
    fn default() -> Self {
        Self::from_settings(&CascadeSettings::default())
    }
}

impl KeyChangeExtractor {
    pub fn new(threshold: u8, limit: usize) -> Self {
        Self { threshold, limit }
    }

    pub fn from_settings(settings: &CascadeSettings) -> Self {
        Self::new(settings.importance_threshold, settings.max_key_changes)
    }

    /// Extract key changes, highest importance first.
    ///
    /// Ties keep their original line order.
    pub fn extract(&self, fragment: &ChangeFragment) -> Vec<KeyChange> {
        let mut changes: Vec<KeyChange> = fragment
            .text
            .lines()
            .filter_map(|line| {
                let kind = classify_line(line)?;
                let content = line[1..].trim();
                let importance = score_line(content, kind);
                (importance >= self.threshold).then(|| KeyChange {
                    kind,
                    content: content.to_string(),
                    importance,
                })
            })
            .collect();

        // sort_by is stable
        changes.sort_by(|a, b| b.importance.cmp(&a.importance));
        changes.truncate(self.limit);
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(line: &str) -> u8 {
        score_line(line, ChangeKind::Added)
    }

    #[test]
    fn test_definitions_score_highest() {
        assert_eq!(score("function foo() {}"), 5);
        assert_eq!(score("class Widget extends Base {"), 5);
        assert_eq!(score("def handler(event):"), 5);
        assert_eq!(score("pub fn count_tokens(text: &str) -> u32 {"), 5);
        assert_eq!(score("pub(crate) struct Cache {"), 5);
        assert_eq!(score("interface Props {"), 5);
        assert_eq!(score("enum Level {"), 5);
    }

    #[test]
    fn test_imports_and_constants() {
        assert_eq!(score("import { foo } from './foo';"), 4);
        assert_eq!(score("export default App;"), 4);
        assert_eq!(score("use std::sync::Arc;"), 4);
        assert_eq!(score("#include <stdio.h>"), 4);
        assert_eq!(score("const MAX_RETRIES = 3;"), 4);
        assert_eq!(score("pub const DEFAULT_LIMIT: u32 = 10;"), 4);
        assert_eq!(score("TIMEOUT_SECS = 30"), 4);
    }

    #[test]
    fn test_lowercase_binding_is_regular_code() {
        assert_eq!(score("const x = 1;"), 2);
        assert_eq!(score("let value = compute();"), 2);
        assert_eq!(score("if (a == b) {"), 2);
    }

    #[test]
    fn test_endpoints_and_manifest_keys() {
        assert_eq!(score("fetch('https://example.com/v1')"), 4);
        assert_eq!(score("app.get('/api/users', list)"), 4);
        assert_eq!(score("registerRoute(handler)"), 4);
        assert_eq!(score(r#""version": "1.2.0","#), 4);
        assert_eq!(score(r#""dependencies": {"#), 4);
        assert_eq!(score(r#""description": "x","#), 2);
    }

    #[test]
    fn test_comments_and_blank() {
        assert_eq!(score("// explain"), 1);
        assert_eq!(score("# python comment"), 1);
        assert_eq!(score("/* block"), 1);
        assert_eq!(score("* continued"), 1);
        assert_eq!(score(""), 0);
        assert_eq!(score("   "), 0);
    }

    #[test]
    fn test_kind_does_not_change_score() {
        for line in ["class A {", "import x", "x += 1", "// c", ""] {
            assert_eq!(score_line(line, ChangeKind::Added), score_line(line, ChangeKind::Removed));
        }
    }

    #[test]
    fn test_extract_filters_and_strips_markers() {
        let fragment = ChangeFragment::new(
            "src/a.ts",
            "+++ b/src/a.ts\n+function foo() {}\n-const x = 1;\n+   // comment\n-import bar from 'bar';",
        );
        let changes = KeyChangeExtractor::default().extract(&fragment);
        assert_eq!(
            changes,
            vec![
                KeyChange { kind: ChangeKind::Added, content: "function foo() {}".into(), importance: 5 },
                KeyChange { kind: ChangeKind::Removed, content: "import bar from 'bar';".into(), importance: 4 },
            ]
        );
    }

    #[test]
    fn test_extract_caps_and_keeps_tie_order() {
        let text = (0..8)
            .map(|i| format!("+import mod{i} from 'mod{i}';"))
            .chain(std::iter::once("+class Late {}".to_string()))
            .collect::<Vec<_>>()
            .join("\n");
        let fragment = ChangeFragment::new("src/index.ts", text);
        let changes = KeyChangeExtractor::default().extract(&fragment);

        assert_eq!(changes.len(), 5);
        assert_eq!(changes[0].content, "class Late {}");
        let rest: Vec<_> = changes[1..].iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            rest,
            vec![
                "import mod0 from 'mod0';",
                "import mod1 from 'mod1';",
                "import mod2 from 'mod2';",
                "import mod3 from 'mod3';",
            ]
        );
        assert_eq!(changes, KeyChangeExtractor::default().extract(&fragment));
    }

    #[test]
    fn test_extract_custom_threshold_and_limit() {
        let fragment = ChangeFragment::new("a.py", "+x = 1\n+y = 2\n+z = 3");
        assert!(KeyChangeExtractor::default().extract(&fragment).is_empty());
        let loose = KeyChangeExtractor::new(2, 2);
        assert_eq!(loose.extract(&fragment).len(), 2);
    }
}
