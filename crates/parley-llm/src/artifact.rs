//! Inline detection of structured content ("artifacts") in generated text.

use once_cell::sync::Lazy;
use regex::RegexSet;

/// Code fences plus declaration/import signatures of common languages
static ARTIFACT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?is)```",
        r"(?is)function\s+\w+\s*\(",
        r"(?is)class\s+\w+\s*[:(]",
        r"(?is)def\s+\w+\s*\(",
        r"(?is)const\s+\w+\s*=",
        r"(?is)let\s+\w+\s*=",
        r"(?is)var\s+\w+\s*=",
        r"(?is)#include\s*<",
        r"(?is)import\s+\w+",
        r"(?is)from\s+\w+\s+import",
    ])
    .expect("Invalid artifact pattern set")
});

/// True when `text` looks like it contains code. Pure and stateless; never
/// inspects anything beyond the given text.
pub fn detect_artifact(text: &str) -> bool {
    ARTIFACT_PATTERNS.is_match(text)
}
