//! Tag classification: raw OSM tags in, routing attributes out.
//!
//! The graph builder never interprets raw OSM tags itself. It hands every
//! element's tags to a [`TagClassifier`] and reads back an enumerated set of
//! output keys (`road_class`, `use`, `auto_forward`, `speed`, ...). An empty
//! output map rejects the element. The shipped implementation is a compiled
//! rule table ([`RuleClassifier`]); embedders can substitute their own.

pub mod rules;

pub use rules::RuleClassifier;

use std::collections::BTreeMap;

/// Which kind of OSM element is being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Way,
}

/// Tag maps are ordered so classifier output is deterministic to iterate.
pub type Tags = BTreeMap<String, String>;

/// A pure, deterministic tag transform. Implementations must not carry
/// state between calls; the same input always yields the same output.
pub trait TagClassifier: Send + Sync {
    /// Transform raw tags into routing attribute keys. Returning an empty
    /// map rejects the element.
    fn classify(&self, kind: ElementKind, tags: &Tags) -> Tags;
}

/// Helper for reading classifier output maps.
pub struct ClassifiedTags<'a>(pub &'a Tags);

impl<'a> ClassifiedTags<'a> {
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v == "true")
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_u8(&self, key: &str) -> Option<u8> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_tags_accessors() {
        let mut tags = Tags::new();
        tags.insert("oneway".to_string(), "true".to_string());
        tags.insert("speed".to_string(), "50.5".to_string());
        tags.insert("lanes".to_string(), "2".to_string());
        let view = ClassifiedTags(&tags);
        assert_eq!(view.get_bool("oneway"), Some(true));
        assert_eq!(view.get_f32("speed"), Some(50.5));
        assert_eq!(view.get_u8("lanes"), Some(2));
        assert_eq!(view.get("missing"), None);
    }
}
