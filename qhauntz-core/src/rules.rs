//! The rules reference and its search box.

/// Built-in Qhauntz rules reference (markdown).
pub const QHAUNTZ_RULES: &str = include_str!("rules.md");

/// Shown in place of the document when a search finds nothing.
pub const NO_MATCHING_RULES: &str = "No matching rules found.";

/// Filter `document` by `term`.
///
/// A blank term or a case-insensitive hit anywhere returns the whole
/// document, not just the matching section. A miss returns
/// [`NO_MATCHING_RULES`].
pub fn filter_rules<'a>(document: &'a str, term: &str) -> &'a str {
    if term.trim().is_empty() {
        return document;
    }
    if document.to_lowercase().contains(&term.to_lowercase()) {
        document
    } else {
        NO_MATCHING_RULES
    }
}

/// A rules document plus the current search term.
#[derive(Debug, Clone)]
pub struct RulesViewer {
    document: String,
    search: String,
}

impl RulesViewer {
    /// Viewer over the built-in rules.
    pub fn new() -> Self {
        Self::with_document(QHAUNTZ_RULES)
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            search: String::new(),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// What the viewer shows for the current search term.
    pub fn filtered(&self) -> &str {
        filter_rules(&self.document, &self.search)
    }
}

impl Default for RulesViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Combat\n\nRoll **Attack** against Defend.\n";

    #[test]
    fn test_empty_term_returns_document() {
        assert_eq!(filter_rules(DOC, ""), DOC);
        assert_eq!(filter_rules(DOC, "   \t"), DOC);
    }

    #[test]
    fn test_hit_returns_whole_document() {
        assert_eq!(filter_rules(DOC, "attack"), DOC);
        assert_eq!(filter_rules(DOC, "DEFEND"), DOC);
        // Markup is part of the searched text
        assert_eq!(filter_rules(DOC, "**attack**"), DOC);
    }

    #[test]
    fn test_miss_returns_sentinel() {
        assert_eq!(filter_rules(DOC, "teleport"), NO_MATCHING_RULES);
        assert_eq!(filter_rules(DOC, "No matching rules found."), NO_MATCHING_RULES);
    }

    #[test]
    fn test_surrounding_spaces_are_part_of_the_term() {
        assert_eq!(filter_rules(DOC, "Roll "), DOC);
        assert_eq!(filter_rules(DOC, " Combat  "), NO_MATCHING_RULES);
    }

    #[test]
    fn test_viewer_tracks_search() {
        let mut viewer = RulesViewer::with_document(DOC);
        assert_eq!(viewer.filtered(), DOC);

        viewer.set_search("shift");
        assert_eq!(viewer.search(), "shift");
        assert_eq!(viewer.filtered(), NO_MATCHING_RULES);

        viewer.set_search("");
        assert_eq!(viewer.filtered(), DOC);
    }

    #[test]
    fn test_builtin_rules_cover_core_terms() {
        let viewer = RulesViewer::new();
        assert_eq!(viewer.document(), QHAUNTZ_RULES);
        for term in ["aether", "Skill Pyramid", "Fyemyn", "consequences", "4dF"] {
            assert_eq!(filter_rules(QHAUNTZ_RULES, term), QHAUNTZ_RULES, "{term}");
        }
    }
}
