//! Observation model
//!
//! An observation set maps trait names to what the user asserted about them.
//! Keys compare case-insensitively; the spelling the user clicked is kept for
//! display and for the remote request. Insertion order is preserved so the
//! set replays in the order the user built it.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::UiDirective;

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Canonical case-insensitive form of a trait name.
///
/// Trims, collapses inner whitespace and lowercases, so `" Glassy "`,
/// `"glassy"` and `"GLASSY"` are the same trait.
pub fn canonical_trait(name: &str) -> String {
    RE_WHITESPACE
        .replace_all(name.trim(), " ")
        .to_lowercase()
}

/// Value the user gave for a trait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    /// Trait asserted (`true`) or dismissed (`false`)
    Flag(bool),
    /// Free-form value
    Text(String),
}

/// One asserted trait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Directive that was active when the trait was given
    pub source: UiDirective,
    /// What was asserted
    pub value: ObservationValue,
}

impl Observation {
    /// Trait selected from an option list
    pub fn selected(source: UiDirective) -> Self {
        Self {
            source,
            value: ObservationValue::Flag(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: String,
    label: String,
    observation: Observation,
}

/// Ordered, case-insensitive trait → observation map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    entries: Vec<Entry>,
}

impl ObservationSet {
    /// Create empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of traits (the offline "evidence count")
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a trait. A replaced trait keeps its position.
    pub fn insert(&mut self, label: impl Into<String>, observation: Observation) -> Option<Observation> {
        let label = label.into();
        let key = canonical_trait(&label);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.label = label;
            return Some(std::mem::replace(&mut entry.observation, observation));
        }
        self.entries.push(Entry {
            key,
            label,
            observation,
        });
        None
    }

    /// Retract a trait, as if it had never been given
    pub fn remove(&mut self, name: &str) -> Option<Observation> {
        let key = canonical_trait(name);
        let idx = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(idx).observation)
    }

    /// Is the trait present (case-insensitive)?
    pub fn contains(&self, name: &str) -> bool {
        let key = canonical_trait(name);
        self.entries.iter().any(|e| e.key == key)
    }

    /// Look up a trait (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Observation> {
        let key = canonical_trait(name);
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.observation)
    }

    /// Iterate `(label, observation)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Observation)> {
        self.entries.iter().map(|e| (e.label.as_str(), &e.observation))
    }

    /// Trait labels as the user spelled them, in insertion order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Canonical keys, in insertion order
    pub fn canonical_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }
}

impl Serialize for ObservationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.label, &entry.observation)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ObservationSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = ObservationSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of trait name to observation")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut set = ObservationSet::new();
                while let Some((label, observation)) = access.next_entry::<String, Observation>()? {
                    set.insert(label, observation);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(SetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn obs() -> Observation {
        Observation::selected(UiDirective::Observation)
    }

    #[test]
    fn test_canonical_trait_normalizes() {
        assert_eq!(canonical_trait("  Glassy "), "glassy");
        assert_eq!(canonical_trait("White   Streak"), "white streak");
        assert_eq!(canonical_trait("HARD (>5.5)"), "hard (>5.5)");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut set = ObservationSet::new();
        set.insert("Glassy", obs());
        assert!(set.contains("glassy"));
        assert!(set.contains("GLASSY"));

        // Same trait, different spelling: replaced, not duplicated
        let previous = set.insert("glassy", Observation::selected(UiDirective::PhysicalTest));
        assert!(previous.is_some());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("Glassy").unwrap().source, UiDirective::PhysicalTest);
    }

    #[test]
    fn test_retract_restores_prior_contents() {
        let mut set = ObservationSet::new();
        set.insert("Red", obs());
        set.insert("Dull", obs());
        let before = set.clone();

        set.insert("Earthy", obs());
        set.remove("earthy");

        assert_eq!(set, before);
    }

    #[test]
    fn test_remove_missing_trait() {
        let mut set = ObservationSet::new();
        assert!(set.remove("Cubic").is_none());
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut set = ObservationSet::new();
        set.insert("Yellow", obs());
        set.insert("Metallic", Observation::selected(UiDirective::PhysicalTest));

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"{"Yellow":{"source":"observation","value":true},"Metallic":{"source":"physical_test","value":true}}"#
        );

        let back: ObservationSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labels().collect::<Vec<_>>(), vec!["Yellow", "Metallic"]);
    }

    #[test]
    fn test_text_value_deserializes() {
        let set: ObservationSet =
            serde_json::from_str(r#"{"Streak":{"source":"physical_test","value":"red-brown"}}"#).unwrap();
        assert_eq!(
            set.get("streak").unwrap().value,
            ObservationValue::Text("red-brown".to_string())
        );
    }
}
