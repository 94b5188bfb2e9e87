//! Configuration type filtering
//!
//! Selects which typed entries of an environment contribute properties.
//! Matching entries do not combine: every match replaces the previous one
//! wholesale, so only the last matching entry's properties survive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::document::ConfigEntry;
use crate::properties::PropertySet;

/// A comma-separated list of allowed configuration types (e.g. "database,cache")
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AllowList {
    tokens: Vec<String>,
}

impl AllowList {
    /// Split a comma-separated list; surrounding whitespace and empty tokens are dropped
    pub fn parse(raw: &str) -> Self {
        Self {
            tokens: raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn contains(&self, config_type: &str) -> bool {
        self.tokens.iter().any(|t| t == config_type)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromStr for AllowList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for AllowList {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for AllowList {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<AllowList> for String {
    fn from(list: AllowList) -> Self {
        list.to_string()
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(","))
    }
}

/// Pick the properties of the last entry whose type any allow-list accepts
///
/// Returns `None` when there are no allow-lists or nothing matches, meaning
/// the entries contribute nothing.
pub fn merge_entries(entries: &[ConfigEntry], allow_lists: &[AllowList]) -> Option<PropertySet> {
    let mut merged = None;

    for entry in entries {
        if allow_lists.iter().any(|list| list.contains(entry.config_type())) {
            log::trace!(
                "Configuration type '{}' matched in environment '{}'",
                entry.config_type(),
                entry.environment()
            );
            merged = Some(entry.properties().clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(config_type: &str, pairs: &[(&str, &str)]) -> ConfigEntry {
        ConfigEntry::new(
            config_type,
            "dev",
            pairs.iter().map(|(k, v)| (*k, *v)).collect(),
        )
    }

    #[test]
    fn test_allow_list_parse() {
        let list = AllowList::parse(" database , cache,,web ");
        assert_eq!(list.tokens(), &["database", "cache", "web"]);
        assert_eq!(list.to_string(), "database,cache,web");
        assert!(AllowList::parse(" , ").is_empty());
    }

    #[test]
    fn test_last_match_replaces_wholesale() {
        let entries = vec![
            entry("A", &[("a", "1"), ("shared", "from-a")]),
            entry("B", &[("b", "2"), ("shared", "from-b")]),
        ];
        let merged = merge_entries(&entries, &[AllowList::parse("A,B")]).unwrap();

        assert_eq!(merged, entries[1].properties().clone());
        assert!(!merged.contains_key("a"));
    }

    #[test]
    fn test_only_allowed_types_match() {
        let entries = vec![
            entry("A", &[("a", "1")]),
            entry("B", &[("b", "2")]),
            entry("C", &[("c", "3")]),
        ];
        let merged = merge_entries(&entries, &[AllowList::parse("A")]).unwrap();

        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_tokens_from_several_lists() {
        let entries = vec![entry("A", &[("a", "1")]), entry("B", &[("b", "2")])];
        let lists = [AllowList::parse("B"), AllowList::parse("A")];
        let merged = merge_entries(&entries, &lists).unwrap();

        // Entry order decides, not allow-list order
        assert_eq!(merged.get("b"), Some("2"));
    }

    #[test]
    fn test_no_allow_lists_contributes_nothing() {
        let entries = vec![entry("A", &[("a", "1")])];
        assert_eq!(merge_entries(&entries, &[]), None);
    }

    #[test]
    fn test_no_match_contributes_nothing() {
        let entries = vec![entry("A", &[("a", "1")])];
        assert_eq!(merge_entries(&entries, &[AllowList::parse("Z")]), None);
    }

    #[test]
    fn test_allow_list_serde_as_string() {
        let list: AllowList = serde_json::from_str("\"database, cache\"").unwrap();
        assert!(list.contains("cache"));
        assert_eq!(serde_json::to_string(&list).unwrap(), "\"database,cache\"");
    }
}
