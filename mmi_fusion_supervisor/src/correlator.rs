//! Sharded fusion correlator.
//!
//! Owns every action's `PendingSet`, shards them by action id, and runs the
//! core ingest step (purge, insert, evaluate, consume) under the shard lock.
//! The timeout sweep takes the same locks, so an entry can never be judged
//! alive by a rule while it is being expired.
//!
//! No IO. Threads are the caller's; the only task spawned by this crate is the
//! `TimeoutScheduler`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use mmi_fusion_core::{
    ingest_into, ActionId, CorrelatorCfg, EmittedOutput, Evidence, FusionCatalogs, IngestOutcome,
    PendingSet, RejectedEvent, Timestamp,
};

use crate::adapter::{build_evidence_batch, EvidenceBuilder, RawEvent};
use crate::clock::Clock;

/// Counter snapshot for logging/monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorStats {
    /// Raw events offered through `submit`/`ingest_events`.
    pub submitted: u64,
    /// Raw events naming no known modality.
    pub rejected_unknown: u64,
    /// Evidence copies dropped as duplicate, already consumed, stale or unroutable.
    pub ignored: u64,
    /// Outputs fired.
    pub emitted: u64,
    /// Evidence copies removed by the timeout sweep.
    pub expired: u64,
}

/// Result of one timeout sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub at: Timestamp,
    /// Evidence entries removed.
    pub expired: usize,
    /// Actions whose pending set emptied out and was released.
    pub released: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected_unknown: AtomicU64,
    ignored: AtomicU64,
    emitted: AtomicU64,
    expired: AtomicU64,
}

#[derive(Debug, Default)]
struct Shard {
    pending: HashMap<ActionId, PendingSet>,
}

/// Deterministic FNV-1a hash (stable across runs).
fn fnv1a_u64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn shard_index(action_id: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    (fnv1a_u64(action_id) % shard_count as u64) as usize
}

/// The fusion correlator. One pending set per output action, `shards` locks.
///
/// - `shards == 1` serializes all actions behind one lock, which is plenty for
///   interactive gesture rates.
/// - More shards let unrelated actions ingest concurrently; a single action is
///   always serialized.
#[derive(Debug)]
pub struct FusionCorrelator {
    catalogs: Arc<FusionCatalogs>,
    clock: Arc<dyn Clock>,
    shards: usize,
    state_shards: Vec<Mutex<Shard>>,
    counters: Counters,
}

impl FusionCorrelator {
    pub fn new(catalogs: Arc<FusionCatalogs>, cfg: &CorrelatorCfg, clock: Arc<dyn Clock>) -> Self {
        let shards = cfg.shards.max(1);
        let state_shards = (0..shards).map(|_| Mutex::new(Shard::default())).collect();

        Self {
            catalogs,
            clock,
            shards,
            state_shards,
            counters: Counters::default(),
        }
    }

    pub fn catalogs(&self) -> &Arc<FusionCatalogs> {
        &self.catalogs
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    // Poisoned shards are reused as-is.
    fn lock_shard(&self, idx: usize) -> MutexGuard<'_, Shard> {
        self.state_shards[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn shard_for(&self, action_id: &str) -> MutexGuard<'_, Shard> {
        self.lock_shard(shard_index(action_id, self.shards))
    }

    /// Offer one evidence copy to its action at the clock's current instant.
    pub fn ingest(&self, evidence: Evidence) -> Option<EmittedOutput> {
        self.ingest_at(evidence, self.clock.now())
    }

    /// Offer one evidence copy to its action, evaluating at `now`.
    ///
    /// The evaluation instant never precedes the evidence's own arrival, so a
    /// recognizer stamping slightly ahead of this clock is not dropped.
    pub fn ingest_at(&self, evidence: Evidence, now: Timestamp) -> Option<EmittedOutput> {
        let now = now.max(evidence.arrival);

        let Some(output) = self.catalogs.outputs().resolve(evidence.action_id.as_str()) else {
            warn!(action = %evidence.action_id, modality = %evidence.modality_id, "evidence for unknown action dropped");
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if !output.rule.references(&evidence.modality_id) {
            warn!(action = %evidence.action_id, modality = %evidence.modality_id, "evidence for unrelated modality dropped");
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let evidence_id = evidence.id;
        let outcome = {
            let mut guard = self.shard_for(output.id.as_str());
            let set = guard.pending.entry(output.id.clone()).or_default();
            ingest_into(output, set, evidence, now)
        };

        match outcome {
            IngestOutcome::Fired(out) => {
                info!(action = %out.action_id, label = %out.wire_label, at = %out.emitted_at, consumed = out.consumed.len(), "fusion fired");
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                Some(out)
            }
            IngestOutcome::Pending => {
                debug!(action = %output.id, evidence = %evidence_id, at = %now, "evidence pending");
                None
            }
            other => {
                debug!(action = %output.id, evidence = %evidence_id, at = %now, outcome = ?other, "evidence ignored");
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Ingest several evidence copies at one instant.
    ///
    /// Emissions come back in ascending action id order (ties keep input order).
    pub fn ingest_batch(&self, evidence: Vec<Evidence>) -> Vec<EmittedOutput> {
        self.ingest_batch_at(evidence, self.clock.now())
    }

    pub fn ingest_batch_at(&self, mut evidence: Vec<Evidence>, now: Timestamp) -> Vec<EmittedOutput> {
        evidence.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        evidence
            .into_iter()
            .filter_map(|ev| self.ingest_at(ev, now))
            .collect()
    }

    /// Normalize one raw event and ingest it into every action it feeds.
    ///
    /// An unknown modality is counted, logged and returned as the error; it is
    /// never retried.
    pub fn submit<B: EvidenceBuilder>(
        &self,
        builder: &B,
        raw: &RawEvent<'_>,
    ) -> Result<Vec<EmittedOutput>, RejectedEvent> {
        self.submit_at(builder, raw, self.clock.now())
    }

    pub fn submit_at<B: EvidenceBuilder>(
        &self,
        builder: &B,
        raw: &RawEvent<'_>,
        now: Timestamp,
    ) -> Result<Vec<EmittedOutput>, RejectedEvent> {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        match builder.build(raw) {
            Ok(evidence) => Ok(self.ingest_batch_at(evidence, now)),
            Err(e) => {
                self.counters.rejected_unknown.fetch_add(1, Ordering::Relaxed);
                warn!(label = %raw.label, at = %raw.at, error = %e, "raw event rejected");
                Err(e)
            }
        }
    }

    /// Ingest a batch of raw events in order, dropping rejected ones.
    pub fn ingest_events<B: EvidenceBuilder>(&self, builder: &B, events: &[RawEvent<'_>]) -> Vec<EmittedOutput> {
        let now = self.clock.now();
        self.counters
            .submitted
            .fetch_add(events.len() as u64, Ordering::Relaxed);

        let (evidence, rejected) = build_evidence_batch(builder, events);
        for e in &rejected {
            warn!(error = %e, "raw event rejected");
        }
        self.counters
            .rejected_unknown
            .fetch_add(rejected.len() as u64, Ordering::Relaxed);

        // Input order matters here (later evidence may complete a rule), so no re-sort.
        evidence
            .into_iter()
            .filter_map(|ev| self.ingest_at(ev, now))
            .collect()
    }

    /// Remove every entry expired at the clock's current instant. Never emits.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(self.clock.now())
    }

    pub fn sweep_at(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport {
            at: now,
            ..SweepReport::default()
        };

        // Lock shards in a stable order, one at a time.
        for idx in 0..self.shards {
            let mut guard = self.lock_shard(idx);
            guard.pending.retain(|action, set| {
                let n = set.purge_expired(now);
                if n > 0 {
                    trace!(action = %action, expired = n, at = %now, "evidence expired");
                }
                report.expired += n;
                if set.is_idle() {
                    report.released += 1;
                    false
                } else {
                    true
                }
            });
        }

        self.counters
            .expired
            .fetch_add(report.expired as u64, Ordering::Relaxed);
        report
    }

    /// Number of entries currently held for `action_id` (alive or awaiting sweep).
    pub fn pending_len(&self, action_id: &str) -> usize {
        self.shard_for(action_id)
            .pending
            .get(action_id)
            .map_or(0, PendingSet::len)
    }

    pub fn pending_total(&self) -> usize {
        (0..self.shards)
            .map(|idx| self.lock_shard(idx).pending.values().map(PendingSet::len).sum::<usize>())
            .sum()
    }

    /// Earliest expiry among all pending entries.
    pub fn next_expiry(&self) -> Option<Timestamp> {
        (0..self.shards)
            .filter_map(|idx| {
                self.lock_shard(idx)
                    .pending
                    .values()
                    .filter_map(PendingSet::next_expiry)
                    .min()
            })
            .min()
    }

    /// Drop a single action's pending evidence (useful for ops / debugging).
    pub fn clear_action(&self, action_id: &str) {
        self.shard_for(action_id).pending.remove(action_id);
    }

    /// Drop everything pending; equivalent to a restart.
    pub fn clear(&self) {
        for idx in 0..self.shards {
            self.lock_shard(idx).pending.clear();
        }
    }

    pub fn stats(&self) -> CorrelatorStats {
        CorrelatorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected_unknown: self.counters.rejected_unknown.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }
}
