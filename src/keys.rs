//! Key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Deriving base keys, key names and per-ticket keys from seeds by hash
//!    chaining.
//! 2. Holding derived key material in types that are zeroised on drop and
//!    never print their bytes.
//!
//! ## Derivation structure
//!
//! ```text
//! base key   = SHA256^n(seed)
//! key name   = SHA256(SHA256(seed) || n_le32)[..4]
//! ticket key = SHA256(base key || salt)  ->  [ hmac (16) ][ cipher (16) ]
//! ```
//!
//! `n` is the hash count, fixed at [`HASH_COUNT`]. The key name is hashed
//! from the seed identity rather than the base key, so publishing it in
//! every ticket reveals nothing about the key. Every step is a pure
//! function of its inputs: servers that share a seed derive identical keys
//! without exchanging anything.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, CIPHER_KEY_LEN, DIGEST_LEN, HMAC_KEY_LEN};
use crate::error::TicketKeyError;
use crate::seeds::{Seed, SeedCategory, SeedDigest};
use crate::ticket::SALT_LEN;

/// Number of hash-chain rounds applied to a seed to reach its base key.
pub const HASH_COUNT: u32 = 1;

/// Width of a base key name as it appears in the ticket name field.
pub const KEY_NAME_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Key name
// ---------------------------------------------------------------------------

/// The public identifier of a base key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyName([u8; KEY_NAME_LEN]);

impl KeyName {
    pub fn from_bytes(bytes: [u8; KEY_NAME_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_NAME_LEN] {
        &self.0
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyName({})", self)
    }
}

/// Name the key derived from `seed_digest` with `hash_count` rounds.
pub fn make_key_name(seed_digest: &SeedDigest, hash_count: u32) -> KeyName {
    let digest = crypto::sha256(&[&seed_digest.as_bytes()[..], &hash_count.to_le_bytes()[..]]);
    let mut name = [0u8; KEY_NAME_LEN];
    name.copy_from_slice(&digest[..KEY_NAME_LEN]);
    KeyName(name)
}

// ---------------------------------------------------------------------------
// Key source
// ---------------------------------------------------------------------------

/// A base key derived from one seed.
///
/// - Not `Clone`. One source per ingested seed, replaced wholesale on
///   rotation and never mutated.
/// - Key bytes are zeroised on drop and never exposed outside the crate.
pub struct KeySource {
    hash_count: u32,
    name: KeyName,
    category: SeedCategory,
    seed_digest: SeedDigest,
    key: Zeroizing<[u8; DIGEST_LEN]>,
}

impl KeySource {
    /// Derive the base key for `seed` after `hash_count` chain rounds.
    pub fn derive(seed: &Seed, hash_count: u32) -> Self {
        Self {
            hash_count,
            name: make_key_name(seed.digest(), hash_count),
            category: seed.category(),
            seed_digest: *seed.digest(),
            key: crypto::hash_nth(seed.bytes(), hash_count),
        }
    }

    pub fn name(&self) -> KeyName {
        self.name
    }

    pub fn category(&self) -> SeedCategory {
        self.category
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Identity of the seed this key was derived from.
    pub fn seed_digest(&self) -> &SeedDigest {
        &self.seed_digest
    }

    /// `true` if both sources hold the same base key bytes.
    pub fn same_key(&self, other: &KeySource) -> bool {
        self.key[..] == other.key[..]
    }

    /// Derive the unique keys for the ticket carrying `salt`.
    pub fn ticket_keys(&self, salt: &[u8; SALT_LEN]) -> Result<TicketKeys, TicketKeyError> {
        derive_ticket_keys(&self.key[..], salt)
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySource")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("hash_count", &self.hash_count)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Per-ticket keys
// ---------------------------------------------------------------------------

/// The HMAC and cipher keys for a single ticket.
///
/// Computed on demand for each ticket operation and dropped straight after
/// the caller's contexts are initialised. Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TicketKeys {
    hmac: [u8; HMAC_KEY_LEN],
    cipher: [u8; CIPHER_KEY_LEN],
}

impl TicketKeys {
    pub fn hmac_key(&self) -> &[u8; HMAC_KEY_LEN] {
        &self.hmac
    }

    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_LEN] {
        &self.cipher
    }
}

impl PartialEq for TicketKeys {
    fn eq(&self, other: &Self) -> bool {
        self.hmac == other.hmac && self.cipher == other.cipher
    }
}

impl fmt::Debug for TicketKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TicketKeys(..)")
    }
}

/// Hash `base_key` and `salt` together and split the digest into the HMAC
/// half followed by the cipher half. A digest that cannot be split exactly
/// is reported rather than padded or truncated.
pub(crate) fn derive_ticket_keys(base_key: &[u8], salt: &[u8]) -> Result<TicketKeys, TicketKeyError> {
    let material = Zeroizing::new(crypto::sha256(&[base_key, salt]));
    let hmac: [u8; HMAC_KEY_LEN] = material[..HMAC_KEY_LEN]
        .try_into()
        .map_err(|_| TicketKeyError::KeyDerivationFailure)?;
    let cipher: [u8; CIPHER_KEY_LEN] = material[HMAC_KEY_LEN..]
        .try_into()
        .map_err(|_| TicketKeyError::KeyDerivationFailure)?;

    Ok(TicketKeys { hmac, cipher })
}
