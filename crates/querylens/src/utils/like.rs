use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// A SQL `LIKE` pattern (`%` any run, `_` one char) compiled to a regex.
#[derive(Debug, Clone)]
pub struct LikePattern {
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Self::build(pattern, false)
    }

    /// Matches the way `UPPER(column) LIKE '%PATTERN%'` does.
    pub fn case_insensitive(pattern: &str) -> Result<Self> {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(&translate_like(pattern))
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .with_context(|| format!("invalid LIKE pattern: {pattern}"))?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// `NULL LIKE x` never matches.
    #[must_use]
    pub fn matches_opt(&self, value: Option<&str>) -> bool {
        value.is_some_and(|value| self.is_match(value))
    }
}

fn translate_like(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();
    translated.push('^');

    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                translated.push_str(&regex::escape(&literal));
                literal.clear();
                translated.push_str(if ch == '%' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    translated.push_str(&regex::escape(&literal));
    translated.push('$');
    translated
}
