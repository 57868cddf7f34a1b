//! Lexical extraction of technical-debt comments from contract source.
//!
//! Comments are pulled out of the raw text with regexes (line comments
//! first, then block comments), lowercased, and matched against a fixed
//! debt vocabulary with word-boundary patterns. Matching is purely lexical;
//! no parsing of the surrounding language happens here.

use crate::config::ScanConfig;
use crate::schemas::DebtComment;
use regex::Regex;
use std::sync::LazyLock;

/// Debt marker vocabulary, matched case-insensitively as whole words.
pub const DEBT_KEYWORDS: &[&str] = &[
    "todo:",
    "todo",
    "fix",
    "fix:",
    "fixme",
    "fixme:",
    "legacy",
    "deprecated",
    "refactor",
    "temporary",
    "temp",
    "hack",
    "workaround",
    "work around",
    "wip",
    "work in progress",
    "enhancement",
    "improvement",
];

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("Invalid regex pattern"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("Invalid regex pattern"));

static FUNCTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*function\s+[^\n{]*").expect("Invalid regex pattern"));

/// Keyword table compiled once: a boundary is required wherever the keyword
/// edge is a word character, so `temp` cannot fire inside `template` while
/// `todo:` still anchors on its colon.
static KEYWORD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DEBT_KEYWORDS
        .iter()
        .map(|keyword| {
            let mut pattern = String::new();
            if keyword.starts_with(|c: char| c.is_alphanumeric()) {
                pattern.push_str(r"\b");
            }
            pattern.push_str(&regex::escape(keyword));
            if keyword.ends_with(|c: char| c.is_alphanumeric()) {
                pattern.push_str(r"\b");
            }
            (*keyword, Regex::new(&pattern).expect("Invalid keyword pattern"))
        })
        .collect()
});

/// Scanner over normalized source text.
///
/// By default every distinct matched keyword yields its own [`DebtComment`]
/// (a two-marker comment counts twice); `collapse_duplicates` reduces that
/// to one emission per comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtScanner {
    collapse_duplicates: bool,
    with_context: bool,
}

struct KeywordMatch {
    keyword: &'static str,
    start: usize,
    end: usize,
}

impl DebtScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            collapse_duplicates: config.collapse_duplicates,
            with_context: config.with_context,
        }
    }

    /// Extract every debt-bearing comment from `source`.
    ///
    /// Pure function of the input: identical source always produces the
    /// identical ordered sequence. Line comments are scanned in document
    /// order, then block comments, matching how the dataset was originally
    /// mined.
    pub fn scan(&self, source: &str) -> Vec<DebtComment> {
        let mut comments = Vec::new();

        for m in LINE_COMMENT.find_iter(source) {
            self.scan_comment(source, m.as_str(), m.end(), &mut comments);
        }
        for m in BLOCK_COMMENT.find_iter(source) {
            self.scan_comment(source, m.as_str(), m.end(), &mut comments);
        }

        comments
    }

    fn scan_comment(
        &self,
        source: &str,
        raw: &str,
        comment_end: usize,
        out: &mut Vec<DebtComment>,
    ) {
        let lowered = raw.to_lowercase();
        let matches = match_keywords(&lowered);
        if matches.is_empty() {
            return;
        }

        let context = if self.with_context {
            following_function(source, comment_end)
        } else {
            None
        };

        let take = if self.collapse_duplicates { 1 } else { matches.len() };
        for m in matches.into_iter().take(take) {
            out.push(DebtComment {
                raw: raw.to_string(),
                text: lowered.clone(),
                keyword: m.keyword.to_string(),
                context: context.clone(),
            });
        }
    }
}

/// Match the vocabulary against one lowercased comment.
///
/// Each keyword contributes at most its first match. Two reductions keep
/// the counts honest:
/// - a match whose span sits inside another keyword's span is dropped in
///   favor of the longer one (`todo` inside `todo:`);
/// - a colon-suffixed marker (`todo:`, `fix:`, `fixme:`) claims the rest of
///   the comment as its payload, so matches starting after the earliest
///   marker are dropped: `// todo: fix this` is one `todo:` hit, not a
///   `todo:` plus a `fix`.
///
/// Survivors are returned in match-position order.
fn match_keywords(lowered: &str) -> Vec<KeywordMatch> {
    let mut matches: Vec<KeywordMatch> = Vec::new();
    for (keyword, pattern) in KEYWORD_PATTERNS.iter() {
        if let Some(m) = pattern.find(lowered) {
            matches.push(KeywordMatch {
                keyword,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    let contained: Vec<bool> = matches
        .iter()
        .map(|m| {
            matches.iter().any(|other| {
                (other.end - other.start) > (m.end - m.start)
                    && other.start <= m.start
                    && m.end <= other.end
            })
        })
        .collect();
    let mut survivors: Vec<KeywordMatch> = matches
        .into_iter()
        .zip(contained)
        .filter_map(|(m, dropped)| (!dropped).then_some(m))
        .collect();

    if let Some(payload_start) = survivors
        .iter()
        .filter(|m| m.keyword.ends_with(':'))
        .map(|m| m.end)
        .min()
    {
        survivors.retain(|m| m.start < payload_start);
    }

    survivors.sort_by_key(|m| m.start);
    survivors
}

/// First `function` header after the comment, for code-level attribution.
fn following_function(source: &str, comment_end: usize) -> Option<String> {
    FUNCTION_HEADER
        .find(&source[comment_end..])
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_claims_its_payload() {
        let comments = DebtScanner::new().scan("// TODO: fix this\nfunction f() {}");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].keyword, "todo:");
        assert_eq!(comments[0].text, "// todo: fix this");
    }

    #[test]
    fn test_two_markers_emit_twice() {
        let comments = DebtScanner::new().scan("// hack workaround");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].keyword, "hack");
        assert_eq!(comments[1].keyword, "workaround");
        assert_eq!(comments[0].raw, comments[1].raw);
    }

    #[test]
    fn test_no_comments_yields_empty() {
        let comments = DebtScanner::new().scan("function f() { uint256 todo = 1; }");
        assert!(comments.is_empty());
    }

    #[test]
    fn test_block_comment_spanning_lines() {
        let source = "/* this is\n a temporary bridge\n */\ncontract A {}";
        let comments = DebtScanner::new().scan(source);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].keyword, "temporary");
    }

    #[test]
    fn test_word_boundaries_reject_substrings() {
        // "temp" inside "template" and "fix" inside "prefixed" are not debt.
        let comments = DebtScanner::new().scan("// the template is prefixed");
        assert!(comments.is_empty());
    }

    #[test]
    fn test_line_comments_precede_block_comments() {
        let source = "/* legacy shim */\n// deprecated entry point\n";
        let comments = DebtScanner::new().scan(source);
        let keywords: Vec<&str> = comments.iter().map(|c| c.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["deprecated", "legacy"]);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let source = "// refactor me\n/* wip: hack around the old temp path */\n";
        let scanner = DebtScanner::new();
        assert_eq!(scanner.scan(source), scanner.scan(source));
    }

    #[test]
    fn test_collapse_duplicates_flag() {
        let scanner = DebtScanner::from_config(&ScanConfig {
            collapse_duplicates: true,
            with_context: false,
        });
        let comments = scanner.scan("// hack workaround");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].keyword, "hack");
    }

    #[test]
    fn test_context_capture() {
        let scanner = DebtScanner::from_config(&ScanConfig {
            collapse_duplicates: false,
            with_context: true,
        });
        let source = "// TODO: tighten bounds\nfunction withdraw(uint256 amount) public {\n}";
        let comments = scanner.scan(source);
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].context.as_deref(),
            Some("function withdraw(uint256 amount) public")
        );
    }

    #[test]
    fn test_multiword_keyword() {
        let comments = DebtScanner::new().scan("// work in progress, do not audit");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].keyword, "work in progress");
    }
}
