//! Tracking eligibility: scheme check plus the user's exclusion list.

use regex::{Regex, RegexBuilder};
use tracing::warn;
use url::Url;

use crate::domain::entities::ExclusionEntry;
use crate::utils::tracking_url::parse_http;

/// Part of the URL a wildcard pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchSubject {
    /// Pattern contains `://`: the whole URL.
    FullUrl,
    /// Pattern contains `/`: the URL without `scheme://`.
    WithoutScheme,
    /// Anything else: the host only.
    Host,
}

impl MatchSubject {
    fn for_pattern(pattern: &str) -> Self {
        if pattern.contains("://") {
            Self::FullUrl
        } else if pattern.contains('/') {
            Self::WithoutScheme
        } else {
            Self::Host
        }
    }

    fn extract<'a>(&self, url: &'a Url) -> &'a str {
        let full = url.as_str();
        match self {
            Self::FullUrl => full,
            Self::WithoutScheme => full
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or(full),
            Self::Host => url.host_str().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
enum Rule {
    Wildcard { regex: Regex, subject: MatchSubject },
    Contains { needles: Vec<String> },
}

impl Rule {
    fn matches(&self, url: &Url) -> bool {
        match self {
            Rule::Wildcard { regex, subject } => regex.is_match(subject.extract(url)),
            Rule::Contains { needles } => needles.iter().any(|n| url.as_str().contains(n.as_str())),
        }
    }
}

/// Compiles a `*`/`?` glob into an anchored, case-insensitive regex.
///
/// `*` matches any run of characters (including none), `?` exactly one
/// character, and every other character matches itself literally.
///
/// # Errors
///
/// Returns the regex error if the compiled expression exceeds size limits.
pub fn compile_wildcard(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expression = String::with_capacity(pattern.len() * 2 + 2);
    expression.push('^');

    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                expression.push_str(&regex::escape(&literal));
                literal.clear();
                expression.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    expression.push_str(&regex::escape(&literal));
    expression.push('$');

    RegexBuilder::new(&expression).case_insensitive(true).build()
}

/// Decides whether a URL is eligible for tracking.
///
/// Built once from the exclusion list and shared immutably; rebuilt when the
/// list is reloaded. Evaluation is pure and infallible.
///
/// # Matching
///
/// - Non-HTTP(S) and malformed URLs are never eligible.
/// - Wildcard entries match against the full URL when the pattern contains
///   `://`, against the URL without scheme when it contains `/`, and against
///   the host otherwise. The whole subject must match.
/// - Plain entries match when the URL contains the entry's `url_hint` or
///   `pattern` (empty strings are ignored).
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    rules: Vec<Rule>,
}

impl PatternFilter {
    /// Compiles the exclusion list. Entries that cannot be compiled, or that
    /// carry no usable text, are skipped with a warning.
    pub fn new(entries: &[ExclusionEntry]) -> Self {
        let rules = entries
            .iter()
            .filter_map(|entry| {
                if entry.is_wildcard() {
                    match compile_wildcard(&entry.pattern) {
                        Ok(regex) => Some(Rule::Wildcard {
                            regex,
                            subject: MatchSubject::for_pattern(&entry.pattern),
                        }),
                        Err(e) => {
                            warn!(
                                pattern = %entry.pattern,
                                error = %e,
                                "Skipping invalid exclusion pattern"
                            );
                            None
                        }
                    }
                } else {
                    let needles: Vec<String> = [&entry.url_hint, &entry.pattern]
                        .into_iter()
                        .filter(|s| !s.trim().is_empty())
                        .cloned()
                        .collect();
                    (!needles.is_empty()).then_some(Rule::Contains { needles })
                }
            })
            .collect();

        Self { rules }
    }

    /// `true` if the URL may be tracked.
    pub fn is_eligible(&self, url: &str) -> bool {
        match parse_http(url) {
            Ok(parsed) => !self.rules.iter().any(|rule| rule.matches(&parsed)),
            Err(_) => false,
        }
    }

    /// Number of active rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
