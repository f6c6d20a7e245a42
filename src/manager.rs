//! The ticket key manager.
//!
//! Ties the seed store, key registry and stats collaborator together behind
//! the two boundaries a TLS server sees:
//! 1. Configuration: replace the three seed lists wholesale.
//! 2. Ticket callbacks: issue a ticket under the active key, or resume one
//!    under whichever known key its name points to.
//!
//! A manager belongs to one TLS context and one thread. It does no locking
//! of its own; embedders that share one across threads must serialise every
//! call, callbacks included.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::config::{self, TicketSeeds};
use crate::crypto::{self, IV_LEN};
use crate::error::TicketKeyError;
use crate::keys::{KeySource, HASH_COUNT};
use crate::registry::KeyRegistry;
use crate::seeds::{SeedCategory, SeedDigest, SeedStore};
use crate::stats::{NoopStats, RotationRecord, TicketEvent, TicketEventKind, TicketStats};
use crate::ticket::{CipherDirection, TicketContext, TicketHandler, TicketName, TicketOutcome, SALT_LEN};

/// Raw seed lists as returned by [`TicketKeyManager::get_tls_ticket_key_seeds`],
/// ordered old, current, new.
pub type SeedLists = (Vec<Vec<u8>>, Vec<Vec<u8>>, Vec<Vec<u8>>);

/// Derives, selects and looks up TLS session ticket keys from configured
/// seeds.
///
/// Starts unconfigured, declining every ticket. The first accepted seed
/// configuration makes it configured; later ones replace the whole key set
/// in one step. A rejected configuration changes nothing.
pub struct TicketKeyManager {
    seeds: SeedStore,
    registry: KeyRegistry,
    stats: Box<dyn TicketStats>,
}

impl Default for TicketKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TicketKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketKeyManager")
            .field("seeds", &self.seeds.len())
            .field("keys", &self.registry.len())
            .field("active", &self.registry.active_len())
            .finish()
    }
}

impl TicketKeyManager {
    /// An unconfigured manager with no stats sink.
    pub fn new() -> Self {
        Self {
            seeds: SeedStore::new(),
            registry: KeyRegistry::new(),
            stats: Box::new(NoopStats),
        }
    }

    /// A manager configured from a seed document.
    pub fn from_seeds(seeds: &TicketSeeds) -> Result<Self, TicketKeyError> {
        let mut manager = Self::new();
        manager.set_seeds(seeds)?;
        Ok(manager)
    }

    /// Replace the stats collaborator. Events already emitted are not
    /// replayed.
    pub fn set_stats(&mut self, stats: Box<dyn TicketStats>) {
        self.stats = stats;
    }

    /// `true` once a configuration with at least one CURRENT seed has been
    /// accepted.
    pub fn is_configured(&self) -> bool {
        self.registry.active_len() > 0
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn seed_store(&self) -> &SeedStore {
        &self.seeds
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Install three seed lists, reporting only whether they were accepted.
    ///
    /// `false` means there was no CURRENT seed; the previous configuration
    /// stays in force and the caller should behave as if no manager were
    /// installed until a valid one arrives.
    pub fn set_tls_ticket_key_seeds<S: AsRef<[u8]>>(
        &mut self,
        old: &[S],
        current: &[S],
        new: &[S],
    ) -> bool {
        self.try_set_seeds(old, current, new).is_ok()
    }

    /// Install three seed lists and return a summary of what changed.
    ///
    /// The replacement store and registry are built in full before either
    /// is swapped in; a rejected configuration leaves state untouched and
    /// emits no rotation event.
    pub fn try_set_seeds<S: AsRef<[u8]>>(
        &mut self,
        old: &[S],
        current: &[S],
        new: &[S],
    ) -> Result<RotationRecord, TicketKeyError> {
        if current.is_empty() {
            warn!(
                old = old.len(),
                new = new.len(),
                "rejecting ticket seed configuration without current seeds"
            );
            return Err(TicketKeyError::NoCurrentSeeds);
        }

        let mut store = SeedStore::new();
        let mut registry = KeyRegistry::new();
        for (list, category) in [
            (old, SeedCategory::Old),
            (current, SeedCategory::Current),
            (new, SeedCategory::New),
        ] {
            for seed in list {
                let seed = store.ingest(seed.as_ref(), category);
                registry.register_source(KeySource::derive(seed, HASH_COUNT));
            }
        }

        let valid = config::is_staged_rotation(&digest_sets(&self.seeds), &digest_sets(&store));
        let record = RotationRecord::between(&self.seeds, &store, valid);

        self.seeds = store;
        self.registry = registry;

        info!(
            old = record.old.total,
            current = record.current.total,
            new = record.new.total,
            keys = self.registry.len(),
            valid_rotation = record.valid_rotation,
            "ticket seeds rotated"
        );
        self.stats.record_rotation(record.clone());
        Ok(record)
    }

    /// Install a hex-encoded seed document.
    ///
    /// Any undecodable seed rejects the whole document before state changes.
    pub fn set_seeds(&mut self, seeds: &TicketSeeds) -> Result<RotationRecord, TicketKeyError> {
        let old = seeds.decode(SeedCategory::Old)?;
        let current = seeds.decode(SeedCategory::Current)?;
        let new = seeds.decode(SeedCategory::New)?;
        self.try_set_seeds(&old, &current, &new)
    }

    /// The raw seeds currently held, partitioned by category.
    pub fn get_tls_ticket_key_seeds(&self) -> SeedLists {
        (
            self.seeds.raw(SeedCategory::Old),
            self.seeds.raw(SeedCategory::Current),
            self.seeds.raw(SeedCategory::New),
        )
    }

    /// The seeds currently held as a hex-encoded document.
    pub fn seeds(&self) -> TicketSeeds {
        let (old, current, new) = self.get_tls_ticket_key_seeds();
        TicketSeeds::from_raw(&old, &current, &new)
    }

    // -----------------------------------------------------------------------
    // Ticket operations
    // -----------------------------------------------------------------------

    fn issue(
        source: &KeySource,
        name: &mut TicketName,
        iv: &mut [u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> Result<(), TicketKeyError> {
        let mut salt = [0u8; SALT_LEN];
        crypto::fill_random(&mut salt)?;
        let keys = source.ticket_keys(&salt)?;

        let mut fresh_iv = [0u8; IV_LEN];
        crypto::fill_random(&mut fresh_iv)?;

        ctx.init_hmac(keys.hmac_key())?;
        ctx.init_cipher(keys.cipher_key(), &fresh_iv, CipherDirection::Encrypt)?;

        // Only touch the caller's buffers once everything has succeeded.
        *name = TicketName::compose(&source.name(), &salt);
        *iv = fresh_iv;
        Ok(())
    }

    fn resume(
        source: &KeySource,
        name: &TicketName,
        iv: &[u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> Result<(), TicketKeyError> {
        let keys = source.ticket_keys(&name.salt())?;
        ctx.init_hmac(keys.hmac_key())?;
        ctx.init_cipher(keys.cipher_key(), iv, CipherDirection::Decrypt)
    }
}

impl TicketHandler for TicketKeyManager {
    fn encrypt_ticket(
        &mut self,
        name: &mut TicketName,
        iv: &mut [u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> TicketOutcome {
        let Some(source) = self.registry.select_for_encryption() else {
            debug!("no active ticket key, deferring to default ticket handling");
            return TicketOutcome::NotHandled;
        };
        let key_name = source.name();
        let category = source.category();

        if let Err(e) = Self::issue(source, name, iv, ctx) {
            error!(key_name = %key_name, error = %e, "ticket encryption setup failed");
            return TicketOutcome::Fatal;
        }

        debug!(key_name = %key_name, "issued session ticket");
        self.stats.record_ticket(TicketEvent {
            kind: TicketEventKind::Issued,
            category: Some(category),
        });
        TicketOutcome::Handled
    }

    fn decrypt_ticket(
        &mut self,
        name: &TicketName,
        iv: &[u8; IV_LEN],
        ctx: &mut dyn TicketContext,
    ) -> TicketOutcome {
        let key_name = name.key_name();
        let Some(source) = self.registry.lookup_by_name(&key_name) else {
            debug!(key_name = %key_name, "session ticket names an unknown key");
            self.stats.record_ticket(TicketEvent {
                kind: TicketEventKind::Missed,
                category: None,
            });
            return TicketOutcome::NotHandled;
        };
        let category = source.category();

        if let Err(e) = Self::resume(source, name, iv, ctx) {
            error!(key_name = %key_name, error = %e, "ticket decryption setup failed");
            return TicketOutcome::Fatal;
        }

        self.stats.record_ticket(TicketEvent {
            kind: TicketEventKind::Resumed,
            category: Some(category),
        });

        if category == SeedCategory::Current {
            debug!(key_name = %key_name, "resumed session ticket");
            TicketOutcome::Handled
        } else {
            debug!(key_name = %key_name, category = %category, "resumed session ticket, renewal due");
            TicketOutcome::Renew
        }
    }
}

fn digest_sets(store: &SeedStore) -> [HashSet<SeedDigest>; 3] {
    SeedCategory::ALL.map(|c| store.by_category(c).map(|s| *s.digest()).collect())
}
