//! Filter engine — live text filtering over both views.
//!
//! Filtering never removes entries; it only flips their `visible` flag. A
//! pattern that fails to compile must not leave the view blank, so on error
//! the previously active matcher is kept but disabled, every entry becomes
//! visible, and the error is retained for display next to the input.
//!
//! `regex::Regex` keeps no match position between calls, so one compiled
//! matcher is shared by every evaluation.

pub mod debounce;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::LogEntry;

/// How raw filter text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    /// Raw text is a regular expression.
    #[default]
    Regex,
    /// Raw text is matched literally.
    Literal,
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regex => write!(f, "regex"),
            Self::Literal => write!(f, "literal"),
        }
    }
}

/// A filter pattern that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter pattern '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FilterEngine {
    mode: FilterMode,
    case_insensitive: bool,
    matcher: Option<Regex>,
    raw: Option<String>,
    error: Option<PatternError>,
}

impl FilterEngine {
    pub fn new(mode: FilterMode, case_insensitive: bool) -> Self {
        Self {
            mode,
            case_insensitive,
            matcher: None,
            raw: None,
            error: None,
        }
    }

    /// Compile `raw` and make it the active filter.
    ///
    /// Empty input clears the filter. On failure the
    /// last valid matcher is retained but disabled until a valid pattern or
    /// an empty one is set.
    pub fn set_pattern(&mut self, raw: &str) -> Result<(), PatternError> {
        if raw.is_empty() {
            self.matcher = None;
            self.raw = None;
            self.error = None;
            return Ok(());
        }

        let source = match self.mode {
            FilterMode::Regex => raw.to_string(),
            FilterMode::Literal => regex::escape(raw),
        };

        match RegexBuilder::new(&source)
            .case_insensitive(self.case_insensitive)
            .build()
        {
            Ok(matcher) => {
                self.matcher = Some(matcher);
                self.raw = Some(raw.to_string());
                self.error = None;
                Ok(())
            }
            Err(e) => {
                let error = PatternError {
                    pattern: raw.to_string(),
                    message: e.to_string(),
                };
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// The matcher currently applied, or `None` when the filter is empty or
    /// disabled by a compile error.
    pub fn active(&self) -> Option<&Regex> {
        if self.error.is_some() {
            return None;
        }
        self.matcher.as_ref()
    }

    /// The last successfully compiled pattern, even while disabled.
    pub fn pattern(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn error(&self) -> Option<&PatternError> {
        self.error.as_ref()
    }

    pub fn is_visible(&self, text: &str) -> bool {
        self.active().is_none_or(|matcher| matcher.is_match(text))
    }

    /// Set `entry.visible` from the active filter.
    ///
    /// Error sections are matched against their whole accumulated text, so
    /// a match in a late stack frame reveals the entire section.
    pub fn apply(&self, entry: &mut LogEntry) {
        entry.visible = self.is_visible(&entry.text);
    }

    pub fn apply_to<'a>(&self, entries: impl IntoIterator<Item = &'a mut LogEntry>) {
        for entry in entries {
            self.apply(entry);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LineClassifier;

    fn entries(lines: &[&str]) -> Vec<LogEntry> {
        let mut classifier = LineClassifier::default();
        lines.iter().map(|l| classifier.classify(l)).collect()
    }

    #[test]
    fn no_pattern_shows_everything() {
        let engine = FilterEngine::default();
        assert!(engine.is_visible("anything"));
        assert!(engine.active().is_none());
    }

    #[test]
    fn regex_pattern_hides_non_matching() {
        let mut engine = FilterEngine::default();
        engine.set_pattern("fo+").unwrap();
        let mut list = entries(&["foo", "bar"]);
        engine.apply_to(list.iter_mut());
        assert!(list[0].visible);
        assert!(!list[1].visible);
    }

    #[test]
    fn empty_pattern_clears() {
        let mut engine = FilterEngine::default();
        engine.set_pattern("foo").unwrap();
        engine.set_pattern("").unwrap();
        assert!(engine.is_visible("bar"));
        assert_eq!(engine.pattern(), None);
    }

    #[test]
    fn invalid_pattern_keeps_previous_but_disables_it() {
        let mut engine = FilterEngine::default();
        engine.set_pattern("foo").unwrap();
        let err = engine.set_pattern("(unbalanced").unwrap_err();
        assert_eq!(err.pattern, "(unbalanced");
        assert!(engine.is_visible("bar"));
        assert_eq!(engine.pattern(), Some("foo"));
        assert!(engine.error().is_some());

        engine.set_pattern("bar").unwrap();
        assert!(engine.error().is_none());
        assert!(!engine.is_visible("foo"));
    }

    #[test]
    fn whitespace_is_a_pattern_not_a_clear() {
        let mut engine = FilterEngine::default();
        engine.set_pattern(" ").unwrap();
        assert_eq!(engine.pattern(), Some(" "));
        assert!(engine.is_visible("two words"));
        assert!(!engine.is_visible("nospace"));
    }

    #[test]
    fn literal_mode_escapes_metacharacters() {
        let mut engine = FilterEngine::new(FilterMode::Literal, false);
        engine.set_pattern("a.b(").unwrap();
        assert!(engine.is_visible("x a.b( y"));
        assert!(!engine.is_visible("axb("));
    }

    #[test]
    fn case_insensitive_matching() {
        let mut engine = FilterEngine::new(FilterMode::Regex, true);
        engine.set_pattern("error").unwrap();
        assert!(engine.is_visible("*ERROR* boom"));
    }

    #[test]
    fn section_matches_on_accumulated_text() {
        let mut classifier = LineClassifier::default();
        let mut head = classifier.classify("2024 *ERROR* boom");
        let mut engine = FilterEngine::default();
        engine.set_pattern("NullPointer").unwrap();
        engine.apply(&mut head);
        assert!(!head.visible);

        head.append_line("\tat java.lang.NullPointerException");
        engine.apply(&mut head);
        assert!(head.visible);
    }
}
