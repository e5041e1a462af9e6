//! Track exclusion filter
//!
//! Drops tracks whose name or URI contains an excluded substring, and strips
//! tags whose name contains an excluded substring from the survivors.

use crate::models::Track;

/// How an empty pattern (e.g. an unset option or a trailing comma) behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPattern {
    /// Empty patterns are disabled rules and never match
    #[default]
    Ignore,
    /// Empty patterns use plain substring semantics and match everything
    MatchAll,
}

/// Substring patterns applied to each track
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    name: Vec<String>,
    uri: Vec<String>,
    tag: Vec<String>,
    empty: EmptyPattern,
}

impl ExclusionRules {
    pub fn new(name: Vec<String>, uri: Vec<String>, tag: Vec<String>, empty: EmptyPattern) -> Self {
        Self {
            name,
            uri,
            tag,
            empty,
        }
    }

    /// Build rules from comma-separated option values. Patterns are kept verbatim.
    pub fn from_csv(name: &str, uri: &str, tag: &str, empty: EmptyPattern) -> Self {
        Self::new(split_csv(name), split_csv(uri), split_csv(tag), empty)
    }

    /// Name patterns are checked first, then URI patterns
    pub fn should_exclude(&self, track: &Track) -> bool {
        self.matches(&track.name, &self.name) || self.matches(&track.uri, &self.uri)
    }

    /// Remove every tag whose name contains a tag pattern
    pub fn strip_tags(&self, mut track: Track) -> Track {
        track.tags = track
            .tags
            .into_iter()
            .filter(|t| !self.matches(&t.name, &self.tag))
            .collect();
        track
    }

    fn matches(&self, field: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| {
            if p.is_empty() {
                self.empty == EmptyPattern::MatchAll
            } else {
                field.contains(p.as_str())
            }
        })
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sports() -> Track {
        Track::new("Sports1", "http://up.example/live/10/20/300.ts")
            .with_tag("tvg-id", "s1")
            .with_tag("group-title", "Sports")
    }

    #[test]
    fn test_exclude_by_name() {
        let rules = ExclusionRules::from_csv("News,Sport", "", "", EmptyPattern::Ignore);
        assert!(rules.should_exclude(&sports()));
    }

    #[test]
    fn test_exclude_by_uri() {
        let rules = ExclusionRules::from_csv("", "/live/10/", "", EmptyPattern::Ignore);
        assert!(rules.should_exclude(&sports()));
    }

    #[test]
    fn test_no_match_survives() {
        let rules = ExclusionRules::from_csv("Movies", "/vod/", "", EmptyPattern::Ignore);
        assert!(!rules.should_exclude(&sports()));
    }

    #[test]
    fn test_decision_is_stable() {
        let rules = ExclusionRules::from_csv("Sport", "", "", EmptyPattern::Ignore);
        let track = sports();
        assert_eq!(rules.should_exclude(&track), rules.should_exclude(&track));
    }

    #[test]
    fn test_unset_options_ignore_empty_pattern() {
        let rules = ExclusionRules::from_csv("", "", "", EmptyPattern::Ignore);
        let track = rules.strip_tags(sports());

        assert!(!rules.should_exclude(&sports()));
        assert_eq!(track.tags.len(), 2);
    }

    #[test]
    fn test_trailing_comma_ignored() {
        let rules = ExclusionRules::from_csv("Movies,", "", "", EmptyPattern::Ignore);
        assert!(!rules.should_exclude(&sports()));
    }

    #[test]
    fn test_empty_pattern_match_all() {
        let rules = ExclusionRules::from_csv("", "", "", EmptyPattern::MatchAll);
        assert!(rules.should_exclude(&sports()));
        assert!(rules.strip_tags(sports()).tags.is_empty());
    }

    #[test]
    fn test_strip_tags_preserves_order() {
        let track = Track::new("A", "http://a/1.ts")
            .with_tag("tvg-id", "a")
            .with_tag("tvg-logo", "http://logo")
            .with_tag("tvg-name", "A")
            .with_tag("group-title", "News");
        let rules = ExclusionRules::from_csv("", "", "tvg-logo,tvg-name", EmptyPattern::Ignore);

        let stripped = rules.strip_tags(track);
        let names: Vec<_> = stripped.tags.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names, vec!["tvg-id", "group-title"]);
    }

    #[test]
    fn test_strip_adjacent_matching_tags() {
        let track = Track::new("A", "http://a/1.ts")
            .with_tag("tvg-logo", "x")
            .with_tag("tvg-logo-small", "y")
            .with_tag("group-title", "News");
        let rules = ExclusionRules::from_csv("", "", "logo", EmptyPattern::Ignore);

        let stripped = rules.strip_tags(track);
        assert_eq!(stripped.tags.len(), 1);
        assert_eq!(stripped.tags[0].name, "group-title");
    }

    #[test]
    fn test_tag_rule_does_not_exclude() {
        let rules = ExclusionRules::from_csv("", "", "group", EmptyPattern::Ignore);
        let track = sports();

        assert!(!rules.should_exclude(&track));
        assert_eq!(rules.strip_tags(track).tags.len(), 1);
    }
}
