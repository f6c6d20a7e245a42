//! Configured seeds and their lifecycle categories.
//!
//! A seed is the externally supplied secret every base key is derived from.
//! The store is rebuilt from scratch on every configuration update and never
//! patched in place.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, DIGEST_LEN};

/// Where a seed sits in the rotation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedCategory {
    /// Retired; still decrypts tickets issued before the last rotation.
    Old,
    /// In service; encrypts new tickets.
    Current,
    /// Staged for the next rotation; decrypts tickets from servers that
    /// have already rotated.
    New,
}

impl SeedCategory {
    /// All categories in configuration order.
    pub const ALL: [SeedCategory; 3] = [Self::Old, Self::Current, Self::New];

    /// Preference when duplicate seeds collapse into one key: a key that
    /// is current anywhere is current.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Current => 2,
            Self::New => 1,
            Self::Old => 0,
        }
    }
}

impl fmt::Display for SeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::Current => write!(f, "current"),
            Self::New => write!(f, "new"),
        }
    }
}

/// SHA-256 of a seed's bytes; the seed's stable identity across rotations.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedDigest([u8; DIGEST_LEN]);

impl SeedDigest {
    pub fn of(seed: &[u8]) -> Self {
        Self(crypto::sha256(&[seed]))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Debug for SeedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The digest identifies a seed; a prefix is enough for logs.
        write!(f, "SeedDigest({}..)", hex::encode(&self.0[..4]))
    }
}

/// One configured seed.
pub struct Seed {
    bytes: Zeroizing<Vec<u8>>,
    category: SeedCategory,
    digest: SeedDigest,
}

impl Seed {
    pub fn new(bytes: Vec<u8>, category: SeedCategory) -> Self {
        let digest = SeedDigest::of(&bytes);
        Self {
            bytes: Zeroizing::new(bytes),
            category,
            digest,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn category(&self) -> SeedCategory {
        self.category
    }

    pub fn digest(&self) -> &SeedDigest {
        &self.digest
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("category", &self.category)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

/// The seeds of one configuration generation, in ingestion order.
///
/// Identical bytes under two categories are kept as two entries; nothing is
/// deduplicated here.
#[derive(Debug, Default)]
pub struct SeedStore {
    seeds: Vec<Seed>,
}

impl SeedStore {
    pub fn new() -> Self {
        Self { seeds: Vec::new() }
    }

    /// Add a seed under `category` and return the stored entry.
    pub fn ingest(&mut self, bytes: &[u8], category: SeedCategory) -> &Seed {
        let index = self.seeds.len();
        self.seeds.push(Seed::new(bytes.to_vec(), category));
        &self.seeds[index]
    }

    pub fn all(&self) -> impl Iterator<Item = &Seed> {
        self.seeds.iter()
    }

    pub fn by_category(&self, category: SeedCategory) -> impl Iterator<Item = &Seed> {
        self.seeds.iter().filter(move |s| s.category == category)
    }

    /// Copy out the raw seed bytes of one category, in ingestion order.
    pub fn raw(&self, category: SeedCategory) -> Vec<Vec<u8>> {
        self.by_category(category).map(|s| s.bytes().to_vec()).collect()
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_pure_function_of_bytes() {
        let a = Seed::new(b"seedA".to_vec(), SeedCategory::Old);
        let b = Seed::new(b"seedA".to_vec(), SeedCategory::New);
        let c = Seed::new(b"seedB".to_vec(), SeedCategory::Old);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut store = SeedStore::new();
        store.ingest(b"same", SeedCategory::Current);
        store.ingest(b"same", SeedCategory::New);

        assert_eq!(store.len(), 2);
        assert_eq!(store.by_category(SeedCategory::Current).count(), 1);
        assert_eq!(store.by_category(SeedCategory::New).count(), 1);
        assert_eq!(store.raw(SeedCategory::New), vec![b"same".to_vec()]);
    }

    #[test]
    fn test_raw_preserves_order() {
        let mut store = SeedStore::new();
        store.ingest(b"one", SeedCategory::Old);
        store.ingest(b"two", SeedCategory::Current);
        store.ingest(b"three", SeedCategory::Old);

        assert_eq!(store.raw(SeedCategory::Old), vec![b"one".to_vec(), b"three".to_vec()]);
        assert!(store.raw(SeedCategory::New).is_empty());
    }
}
