//! Name-indexed key sources.
//!
//! Every known source is reachable by name for decryption. CURRENT sources
//! are additionally listed, in insertion order, as eligible for encryption.
//! Anything in the active list is always also in the name map.

use std::collections::HashMap;

use tracing::warn;

use crate::keys::{KeyName, KeySource};
use crate::seeds::SeedCategory;

#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: HashMap<KeyName, KeySource>,
    active: Vec<KeyName>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `source` under its name; CURRENT sources also become the
    /// preferred encryption key.
    ///
    /// Two sources can share a name when the same seed is configured under
    /// more than one category. The entry keeps whichever category ranks
    /// highest (CURRENT, then NEW, then OLD), so a ticket is never flagged
    /// for renewal because of a duplicate listing. A genuine name clash
    /// between different keys keeps the higher-ranked source and logs.
    pub fn register_source(&mut self, source: KeySource) {
        let name = source.name();
        let category = source.category();

        if let Some(existing) = self.keys.get(&name) {
            if !existing.same_key(&source) {
                warn!(key_name = %name, "ticket key name collision between distinct seeds");
            }
            if category.precedence() < existing.category().precedence() {
                return;
            }
        }

        self.keys.insert(name, source);
        if category == SeedCategory::Current {
            self.active.retain(|n| *n != name);
            self.active.push(name);
        }
    }

    /// Exact-match lookup for the decrypt path.
    pub fn lookup_by_name(&self, name: &KeyName) -> Option<&KeySource> {
        self.keys.get(name)
    }

    /// The most recently registered CURRENT source, or `None` when no
    /// source may encrypt.
    pub fn select_for_encryption(&self) -> Option<&KeySource> {
        self.active.last().and_then(|name| self.keys.get(name))
    }

    /// Sources eligible for encryption, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &KeySource> {
        self.active.iter().filter_map(|name| self.keys.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeySource> {
        self.keys.values()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}
