//! Seed configuration documents.
//!
//! Seeds reach a server as a JSON document with three hex-encoded lists:
//!
//! ```json
//! { "old": ["..."], "current": ["..."], "new": ["..."] }
//! ```
//!
//! Missing lists are treated as empty. Every server in a fleet should be
//! pushed the same document; nothing else is needed for them to accept each
//! other's tickets.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TicketKeyError;
use crate::seeds::SeedCategory;

/// The three seed lists of one configuration push, hex-encoded.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketSeeds {
    pub old: Vec<String>,
    pub current: Vec<String>,
    pub new: Vec<String>,
}

impl TicketSeeds {
    /// Hex-encode raw seed lists.
    pub fn from_raw<S: AsRef<[u8]>>(old: &[S], current: &[S], new: &[S]) -> Self {
        let encode = |list: &[S]| -> Vec<String> { list.iter().map(hex::encode).collect() };
        Self {
            old: encode(old),
            current: encode(current),
            new: encode(new),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TicketKeyError> {
        serde_json::from_str(json).map_err(|e| TicketKeyError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TicketKeyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, TicketKeyError> {
        serde_json::to_string_pretty(self).map_err(|e| TicketKeyError::InvalidConfig(e.to_string()))
    }

    pub fn list(&self, category: SeedCategory) -> &[String] {
        match category {
            SeedCategory::Old => &self.old,
            SeedCategory::Current => &self.current,
            SeedCategory::New => &self.new,
        }
    }

    /// Decode one list to raw seed bytes.
    pub fn decode(&self, category: SeedCategory) -> Result<Vec<Vec<u8>>, TicketKeyError> {
        self.list(category)
            .iter()
            .enumerate()
            .map(|(index, seed)| {
                hex::decode(seed.trim())
                    .map_err(|_| TicketKeyError::InvalidSeedEncoding { category, index })
            })
            .collect()
    }

    /// `true` when no list holds any seed.
    pub fn is_empty(&self) -> bool {
        self.old.is_empty() && self.current.is_empty() && self.new.is_empty()
    }

    /// Whether moving from `self` to `next` follows the staged procedure:
    /// introduce as NEW, promote to CURRENT, retire to OLD.
    ///
    /// Every OLD seed in `next` must be OLD or CURRENT here, and every
    /// CURRENT seed in `next` must be CURRENT or NEW here. Moving away from
    /// an empty configuration is always valid.
    pub fn is_valid_rotation(&self, next: &TicketSeeds) -> bool {
        let sets = |seeds: &TicketSeeds| {
            SeedCategory::ALL.map(|c| {
                seeds
                    .list(c)
                    .iter()
                    .map(|s| s.trim().to_ascii_lowercase())
                    .collect::<HashSet<_>>()
            })
        };
        is_staged_rotation(&sets(self), &sets(next))
    }
}

impl fmt::Debug for TicketSeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Seeds are secrets; only their counts are shown.
        f.debug_struct("TicketSeeds")
            .field("old", &self.old.len())
            .field("current", &self.current.len())
            .field("new", &self.new.len())
            .finish()
    }
}

/// Rotation-order check over per-category sets indexed old, current, new.
pub(crate) fn is_staged_rotation<T: Eq + Hash>(prev: &[HashSet<T>; 3], next: &[HashSet<T>; 3]) -> bool {
    let [prev_old, prev_current, prev_new] = prev;
    let [next_old, next_current, _] = next;

    if prev.iter().all(HashSet::is_empty) {
        return true;
    }

    next_old.iter().all(|s| prev_old.contains(s) || prev_current.contains(s))
        && next_current.iter().all(|s| prev_current.contains(s) || prev_new.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(old: &[&str], current: &[&str], new: &[&str]) -> TicketSeeds {
        let own = |l: &[&str]| -> Vec<String> { l.iter().map(|s| s.to_string()).collect() };
        TicketSeeds {
            old: own(old),
            current: own(current),
            new: own(new),
        }
    }

    #[test]
    fn test_parse_with_missing_lists() {
        let parsed = TicketSeeds::from_json_str(r#"{"current": ["aabb"]}"#).unwrap();
        assert_eq!(parsed, seeds(&[], &["aabb"], &[]));
        assert_eq!(parsed.decode(SeedCategory::Current).unwrap(), vec![vec![0xaa, 0xbb]]);
    }

    #[test]
    fn test_json_round_trip() {
        let original = TicketSeeds::from_raw(&[b"a".to_vec()], &[b"b".to_vec()], &[]);
        let json = original.to_json_string().unwrap();
        assert_eq!(TicketSeeds::from_json_str(&json).unwrap(), original);
    }

    #[test]
    fn test_bad_hex_names_category_and_index() {
        let parsed = seeds(&["00", "zz"], &["01"], &[]);
        match parsed.decode(SeedCategory::Old) {
            Err(TicketKeyError::InvalidSeedEncoding { category, index }) => {
                assert_eq!(category, SeedCategory::Old);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            TicketSeeds::from_json_str("{not json"),
            Err(TicketKeyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_staged_rotation() {
        let day0 = seeds(&[], &["aa"], &["bb"]);
        let day1 = seeds(&["aa"], &["bb"], &["cc"]);
        let unstaged = seeds(&["aa"], &["cc"], &[]);
        let resurrected = seeds(&["zz"], &["bb"], &[]);

        assert!(TicketSeeds::default().is_valid_rotation(&day0));
        assert!(day0.is_valid_rotation(&day1));
        assert!(day0.is_valid_rotation(&day0));
        assert!(!day0.is_valid_rotation(&unstaged));
        assert!(!day0.is_valid_rotation(&resurrected));
    }

    #[test]
    fn test_debug_hides_seeds() {
        let shown = format!("{:?}", seeds(&[], &["deadbeef"], &[]));
        assert!(!shown.contains("deadbeef"));
    }
}
