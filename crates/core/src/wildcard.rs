//! Client-side wildcard matching
//!
//! The remote query language only filters on exact names, so any name
//! pattern containing `*` or `?` is matched here after the listing comes
//! back. Every other character is literal.

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Whether the pattern needs client-side filtering
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Compiled, anchored, case-sensitive name predicate
#[derive(Debug, Clone)]
pub struct Wildcard {
    /// `None` matches every name
    pattern: Option<Pattern>,
}

impl Wildcard {
    /// Compile a `*`/`?` pattern
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.chars().all(|c| c == '*') && !pattern.is_empty() {
            return Ok(Self::any());
        }

        let mut escaped = String::with_capacity(pattern.len());
        let mut previous = None;
        for c in pattern.chars() {
            match c {
                // glob only accepts `**` as a whole path component
                '*' if previous == Some('*') => {}
                '*' | '?' => escaped.push(c),
                _ => escaped.push_str(&Pattern::escape(c.encode_utf8(&mut [0; 4]))),
            }
            previous = Some(c);
        }

        let compiled = Pattern::new(&escaped)
            .map_err(|e| Error::BadSpec(format!("bad wildcard '{pattern}': {e}")))?;
        Ok(Self {
            pattern: Some(compiled),
        })
    }

    /// A matcher that accepts every name
    pub fn any() -> Self {
        Self { pattern: None }
    }

    pub fn is_any(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.matches_with(name, MATCH_OPTIONS),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 4] = ["drylab.pdf", "example.pdf", "flyer.pdf", "somatosensory.pdf"];

    fn count(pattern: &str) -> usize {
        let wildcard = Wildcard::new(pattern).unwrap();
        NAMES.iter().filter(|n| wildcard.matches(n)).count()
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("*.pdf"));
        assert!(has_wildcards("e?a"));
        assert!(!has_wildcards("flyer.pdf"));
        assert!(!has_wildcards("[a].pdf"));
    }

    #[test]
    fn test_match_counts() {
        let cases = [
            ("f*", 1),
            ("soma*.*", 1),
            ("*.pdf", 4),
            ("*.*", 4),
            ("*ple.pdf", 1),
            ("e?a*", 1),
            ("*y*", 3),
        ];
        for (pattern, expected) in cases {
            assert_eq!(count(pattern), expected, "{pattern}");
        }
    }

    #[test]
    fn test_star_matches_everything() {
        let wildcard = Wildcard::new("*").unwrap();
        assert!(wildcard.is_any());
        assert!(wildcard.matches(""));
        assert!(wildcard.matches(".hidden"));
        assert!(Wildcard::new("**").unwrap().is_any());
    }

    #[test]
    fn test_anchored_and_case_sensitive() {
        let wildcard = Wildcard::new("*.pdf").unwrap();
        assert!(wildcard.matches("a.pdf"));
        assert!(!wildcard.matches("a.pdf.bak"));
        assert!(!wildcard.matches("A.PDF"));

        let wildcard = Wildcard::new("f*").unwrap();
        assert!(wildcard.matches("flyer.pdf"));
        assert!(!wildcard.matches("leaflet"));
    }

    #[test]
    fn test_question_mark_is_single_char() {
        let wildcard = Wildcard::new("a?c").unwrap();
        assert!(wildcard.matches("abc"));
        assert!(!wildcard.matches("ac"));
        assert!(!wildcard.matches("abbc"));
    }

    #[test]
    fn test_other_metacharacters_are_literal() {
        let wildcard = Wildcard::new("[draft]*").unwrap();
        assert!(wildcard.matches("[draft] notes"));
        assert!(!wildcard.matches("d notes"));

        let wildcard = Wildcard::new("a+b(1)*").unwrap();
        assert!(wildcard.matches("a+b(1).txt"));
        assert!(!wildcard.matches("aab1.txt"));
    }

    #[test]
    fn test_collapsed_stars() {
        let wildcard = Wildcard::new("a**b").unwrap();
        assert!(wildcard.matches("ab"));
        assert!(wildcard.matches("axyzb"));
    }
}
