//! Ticket and rotation statistics.
//!
//! The manager reports every ticket it issues or resumes, and every seed
//! rotation, to a [`TicketStats`] collaborator. Reporting is fire-and-forget:
//! nothing a sink does can fail a ticket operation or a rotation.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::seeds::{SeedCategory, SeedDigest, SeedStore};

/// A receiver of ticket and rotation events. Implement this to forward
/// counters to a metrics system, a file, or a test harness.
pub trait TicketStats: Send {
    /// Called for every ticket issued, resumed, or missed.
    fn record_ticket(&mut self, event: TicketEvent);

    /// Called once per accepted seed configuration.
    fn record_rotation(&mut self, record: RotationRecord);
}

/// The default collaborator: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl TicketStats for NoopStats {
    fn record_ticket(&mut self, _event: TicketEvent) {}
    fn record_rotation(&mut self, _record: RotationRecord) {}
}

/// Lets an embedder keep a handle on a sink it has given to a manager.
impl<T: TicketStats> TicketStats for Arc<Mutex<T>> {
    fn record_ticket(&mut self, event: TicketEvent) {
        if let Ok(mut inner) = self.lock() {
            inner.record_ticket(event);
        }
    }

    fn record_rotation(&mut self, record: RotationRecord) {
        if let Ok(mut inner) = self.lock() {
            inner.record_rotation(record);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketEventKind {
    /// A new ticket was encrypted.
    Issued,
    /// A ticket was matched to a known key.
    Resumed,
    /// A ticket named a key this manager does not hold.
    Missed,
}

/// One ticket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEvent {
    pub kind: TicketEventKind,
    /// Category of the key used; `None` on a miss.
    pub category: Option<SeedCategory>,
}

/// How one seed category changed in a rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChange {
    /// Seeds present now that were not in this category before.
    pub added: usize,
    /// Seeds in this category before that are gone now.
    pub removed: usize,
    /// Seeds in this category after the rotation.
    pub total: usize,
}

impl CategoryChange {
    fn between(prev: &SeedStore, next: &SeedStore, category: SeedCategory) -> Self {
        let before: HashSet<SeedDigest> = prev.by_category(category).map(|s| *s.digest()).collect();
        let after: HashSet<SeedDigest> = next.by_category(category).map(|s| *s.digest()).collect();
        Self {
            added: after.difference(&before).count(),
            removed: before.difference(&after).count(),
            total: next.by_category(category).count(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// A summary of one accepted seed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRecord {
    pub old: CategoryChange,
    pub current: CategoryChange,
    pub new: CategoryChange,
    /// Whether the update followed the staged OLD <- CURRENT <- NEW order.
    pub valid_rotation: bool,
    pub timestamp: DateTime<Utc>,
}

impl RotationRecord {
    pub(crate) fn between(prev: &SeedStore, next: &SeedStore, valid_rotation: bool) -> Self {
        Self {
            old: CategoryChange::between(prev, next, SeedCategory::Old),
            current: CategoryChange::between(prev, next, SeedCategory::Current),
            new: CategoryChange::between(prev, next, SeedCategory::New),
            valid_rotation,
            timestamp: Utc::now(),
        }
    }

    pub fn change(&self, category: SeedCategory) -> &CategoryChange {
        match category {
            SeedCategory::Old => &self.old,
            SeedCategory::Current => &self.current,
            SeedCategory::New => &self.new,
        }
    }

    /// `true` if the configuration was re-applied without any change.
    pub fn is_noop(&self) -> bool {
        SeedCategory::ALL.iter().all(|c| self.change(*c).is_unchanged())
    }
}

// ---------------------------------------------------------------------------
// Built-in collector: in-memory counters
// ---------------------------------------------------------------------------

/// Running totals kept by [`StatsLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounters {
    pub issued: u64,
    pub resumed: u64,
    /// Resumptions under an OLD or NEW key, i.e. tickets due for renewal.
    pub resumed_stale: u64,
    pub missed: u64,
    pub rotations: u64,
    pub invalid_rotations: u64,
}

/// Counts events in memory and forwards each one to any attached sinks.
#[derive(Default)]
pub struct StatsLog {
    counters: TicketCounters,
    last_rotation: Option<RotationRecord>,
    forward_sinks: Vec<Box<dyn TicketStats>>,
}

impl std::fmt::Debug for StatsLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsLog")
            .field("counters", &self.counters)
            .field("last_rotation", &self.last_rotation)
            .field("forward_sinks", &self.forward_sinks.len())
            .finish()
    }
}

impl StatsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to receive a copy of every event.
    pub fn add_forward_sink(&mut self, sink: Box<dyn TicketStats>) {
        self.forward_sinks.push(sink);
    }

    pub fn counters(&self) -> TicketCounters {
        self.counters
    }

    pub fn last_rotation(&self) -> Option<&RotationRecord> {
        self.last_rotation.as_ref()
    }
}

impl TicketStats for StatsLog {
    fn record_ticket(&mut self, event: TicketEvent) {
        match event.kind {
            TicketEventKind::Issued => self.counters.issued += 1,
            TicketEventKind::Resumed => {
                self.counters.resumed += 1;
                if event.category != Some(SeedCategory::Current) {
                    self.counters.resumed_stale += 1;
                }
            }
            TicketEventKind::Missed => self.counters.missed += 1,
        }
        for sink in self.forward_sinks.iter_mut() {
            sink.record_ticket(event);
        }
    }

    fn record_rotation(&mut self, record: RotationRecord) {
        self.counters.rotations += 1;
        if !record.valid_rotation {
            self.counters.invalid_rotations += 1;
        }
        for sink in self.forward_sinks.iter_mut() {
            sink.record_rotation(record.clone());
        }
        self.last_rotation = Some(record);
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum StatsLine<'a> {
    Ticket(&'a TicketEvent),
    Rotation(&'a RotationRecord),
}

/// Writes every event as one JSON line to a file.
/// Creates the file if it doesn't exist; appends if it does.
pub struct FileStatsSink {
    file: std::fs::File,
}

impl FileStatsSink {
    /// Open or create a file for append-only event logging.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    fn write_line(&mut self, line: StatsLine<'_>) {
        if let Ok(json) = serde_json::to_string(&line) {
            let _ = writeln!(self.file, "{json}");
            let _ = self.file.flush();
        }
    }
}

impl TicketStats for FileStatsSink {
    fn record_ticket(&mut self, event: TicketEvent) {
        self.write_line(StatsLine::Ticket(&event));
    }

    fn record_rotation(&mut self, record: RotationRecord) {
        self.write_line(StatsLine::Rotation(&record));
    }
}
