//! File Classification
//!
//! Buckets changed paths into coarse categories for the summary tiers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::fragment::ChangeFragment;

// Evaluated in this order; the first match wins.
static TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(test|spec)\.(js|jsx|ts|tsx|py|go|rs|java|php)$").expect("valid test regex")
});
static DOCS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(md|txt|rst|adoc)$").expect("valid docs regex"));
static CONFIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(^|/)(package\.json|package-lock\.json|yarn\.lock|pnpm-lock\.yaml|cargo\.toml|cargo\.lock|go\.mod|go\.sum|requirements\.txt|setup\.py|pyproject\.toml|gemfile|gemfile\.lock|composer\.json|dockerfile|\.env(\..+)?|[^/]*\.config\.[^/]+|[^/]*\.(yaml|yml|toml|ini))$",
    )
    .expect("valid config regex")
});
static CORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(js|jsx|ts|tsx|py|go|rs|java|php|cpp|c|h|cs|rb|swift|kt)$").expect("valid core regex")
});

/// File category for summary tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Core,
    Config,
    Test,
    Docs,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 5] = [
        FileCategory::Core,
        FileCategory::Config,
        FileCategory::Test,
        FileCategory::Docs,
        FileCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Core => "core",
            FileCategory::Config => "config",
            FileCategory::Test => "test",
            FileCategory::Docs => "docs",
            FileCategory::Other => "other",
        }
    }

    /// Noun used in the minimal summary ("3 core files")
    pub fn display_name(&self) -> &'static str {
        match self {
            FileCategory::Core => "core",
            FileCategory::Config => "config",
            FileCategory::Test => "test",
            FileCategory::Docs => "documentation",
            FileCategory::Other => "other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a path. Matching is case-insensitive.
pub fn categorize(path: &str) -> FileCategory {
    let lower = path.to_lowercase().replace('\\', "/");

    if TEST_RE.is_match(&lower) {
        FileCategory::Test
    } else if DOCS_RE.is_match(&lower) {
        FileCategory::Docs
    } else if CONFIG_RE.is_match(&lower) {
        FileCategory::Config
    } else if CORE_RE.is_match(&lower) {
        FileCategory::Core
    } else {
        FileCategory::Other
    }
}

/// Number of fragments per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub core: usize,
    pub config: usize,
    pub test: usize,
    pub docs: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn from_fragments(fragments: &[ChangeFragment]) -> Self {
        let mut counts = Self::default();
        for fragment in fragments {
            counts.add(categorize(&fragment.path));
        }
        counts
    }

    pub fn add(&mut self, category: FileCategory) {
        match category {
            FileCategory::Core => self.core += 1,
            FileCategory::Config => self.config += 1,
            FileCategory::Test => self.test += 1,
            FileCategory::Docs => self.docs += 1,
            FileCategory::Other => self.other += 1,
        }
    }

    pub fn get(&self, category: FileCategory) -> usize {
        match category {
            FileCategory::Core => self.core,
            FileCategory::Config => self.config,
            FileCategory::Test => self.test,
            FileCategory::Docs => self.docs,
            FileCategory::Other => self.other,
        }
    }

    pub fn total(&self) -> usize {
        self.core + self.config + self.test + self.docs + self.other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_beats_core() {
        assert_eq!(categorize("auth.test.ts"), FileCategory::Test);
        assert_eq!(categorize("src/api/user.spec.js"), FileCategory::Test);
        assert_eq!(categorize("src/auth.ts"), FileCategory::Core);
    }

    #[test]
    fn test_docs() {
        assert_eq!(categorize("README.md"), FileCategory::Docs);
        assert_eq!(categorize("docs/guide.rst"), FileCategory::Docs);
        assert_eq!(categorize("NOTES.TXT"), FileCategory::Docs);
        // Docs is checked before Config
        assert_eq!(categorize("requirements.txt"), FileCategory::Docs);
    }

    #[test]
    fn test_config() {
        for path in [
            "package.json",
            "Cargo.toml",
            "Cargo.lock",
            "Dockerfile",
            "deploy/Dockerfile",
            ".env",
            ".env.local",
            "webpack.config.js",
            "ci/pipeline.yml",
            "k8s/app.yaml",
            "setup.cfg.ini",
        ] {
            assert_eq!(categorize(path), FileCategory::Config, "{path}");
        }
    }

    #[test]
    fn test_core_and_other() {
        assert_eq!(categorize("src/main.rs"), FileCategory::Core);
        assert_eq!(categorize("lib/widget.KT"), FileCategory::Core);
        assert_eq!(categorize("assets/logo.png"), FileCategory::Other);
        assert_eq!(categorize("Makefile"), FileCategory::Other);
        // not a dotenv file, just a name ending in "env"
        assert_eq!(categorize("scripts/setenv"), FileCategory::Other);
    }

    #[test]
    fn test_category_counts() {
        let fragments = vec![
            ChangeFragment::new("a.test.ts", ""),
            ChangeFragment::new("b.rs", ""),
            ChangeFragment::new("c.rs", ""),
            ChangeFragment::new("README.md", ""),
        ];
        let counts = CategoryCounts::from_fragments(&fragments);
        assert_eq!(counts.test, 1);
        assert_eq!(counts.core, 2);
        assert_eq!(counts.docs, 1);
        assert_eq!(counts.get(FileCategory::Config), 0);
        assert_eq!(counts.total(), fragments.len());
    }
}
