//! Error-focus projection — the "errors only" alternate view.
//!
//! Keeps its own copy of every error section seen during the session. The
//! copies share ids with the scrollback entries they were taken from, so the
//! view can link back into the main store, but their lifetime is
//! independent: scrollback eviction never removes an error from here.

use crate::classifier::{EntryId, LogEntry};

#[derive(Debug, Default)]
pub struct ErrorFocus {
    sections: Vec<LogEntry>,
    active: bool,
}

impl ErrorFocus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened error section.
    pub fn on_error_opened(&mut self, section: &LogEntry) {
        self.sections.push(section.clone());
    }

    /// Fold a continuation line into section `id`.
    ///
    /// Continuations only ever target the most recent section, so that one
    /// is checked first. Returns whether a section was updated.
    pub fn on_error_updated(&mut self, id: EntryId, line: &str) -> bool {
        let Some(section) = self.sections.iter_mut().rev().find(|s| s.id == id) else {
            return false;
        };
        section.append_line(line);
        true
    }

    /// Switch between the main view and this one. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sections(&self) -> &[LogEntry] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [LogEntry] {
        &mut self.sections
    }

    pub fn get(&self, id: EntryId) -> Option<&LogEntry> {
        self.sections
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|idx| &self.sections[idx])
    }

    /// Number of error sections seen.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Drop every section. The active flag is left as is.
    pub fn clear(&mut self) {
        self.sections.clear();
    }
}
