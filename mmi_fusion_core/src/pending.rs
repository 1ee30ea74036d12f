use crate::catalog::ModalityId;
use crate::evidence::{Evidence, EvidenceId};
use crate::time::Timestamp;

/// Result of offering one evidence copy to a `PendingSet`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Same id already pending.
    Duplicate,
    /// Same id was already consumed by a fusion of this action.
    AlreadyConsumed,
    /// Not alive at the evaluation instant.
    Stale,
}

/// Alive evidence for one action, plus tombstones of consumed ids.
///
/// A tombstone lives until the consumed evidence would have expired anyway,
/// so memory stays bounded by the validity windows.
#[derive(Clone, Debug, Default)]
pub struct PendingSet {
    entries: Vec<Evidence>,
    consumed: Vec<(EvidenceId, Timestamp)>,
}

impl PendingSet {
    pub fn insert(&mut self, ev: Evidence, now: Timestamp) -> InsertOutcome {
        if self.consumed.iter().any(|(id, _)| *id == ev.id) {
            return InsertOutcome::AlreadyConsumed;
        }
        if self.entries.iter().any(|e| e.id == ev.id) {
            return InsertOutcome::Duplicate;
        }
        if !ev.is_alive_at(now) {
            return InsertOutcome::Stale;
        }
        self.entries.push(ev);
        InsertOutcome::Inserted
    }

    /// Drop expired entries and lapsed tombstones. Returns expired entry count.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired_at(now));
        self.consumed.retain(|(_, until)| now < *until);
        before - self.entries.len()
    }

    pub fn alive(&self, now: Timestamp) -> impl Iterator<Item = &Evidence> {
        self.entries.iter().filter(move |e| e.is_alive_at(now))
    }

    /// Most recent alive entry for `modality` (latest arrival, then highest id).
    pub fn latest_alive(&self, modality: &ModalityId, now: Timestamp) -> Option<&Evidence> {
        self.alive(now)
            .filter(|e| &e.modality_id == modality)
            .max_by_key(|e| (e.arrival, e.id))
    }

    /// Remove `consumed` and `discarded` entries; tombstone the consumed ids.
    pub fn remove_fused(&mut self, consumed: &[EvidenceId], discarded: &[EvidenceId]) {
        for e in self.entries.iter().filter(|e| consumed.contains(&e.id)) {
            self.consumed.push((e.id, e.expiry));
        }
        self.entries
            .retain(|e| !consumed.contains(&e.id) && !discarded.contains(&e.id));
    }

    /// Earliest entry expiry, if anything is pending.
    pub fn next_expiry(&self) -> Option<Timestamp> {
        self.entries.iter().map(|e| e.expiry).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nothing pending and no live tombstones; safe to drop the whole set.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.consumed.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.consumed.clear();
    }
}
