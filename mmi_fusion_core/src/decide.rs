use serde::{Deserialize, Serialize};

use crate::catalog::{ActionId, FusionRule, OutputDescriptor};
use crate::evidence::{Evidence, EvidenceId};
use crate::pending::{InsertOutcome, PendingSet};
use crate::time::Timestamp;

/// Evidence selected by a satisfied rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fusion {
    /// Entries that produced the output (latest per modality).
    pub consumed: Vec<EvidenceId>,
    /// Older alive same-modality duplicates dropped without firing.
    pub discarded: Vec<EvidenceId>,
}

/// A fired action, ready for the consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedOutput {
    pub action_id: ActionId,
    pub wire_label: String,
    pub emitted_at: Timestamp,
    pub consumed: Vec<EvidenceId>,
}

/// What happened to one evidence copy offered to its action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Fired(EmittedOutput),
    Pending,
    Duplicate,
    AlreadyConsumed,
    Stale,
}

impl IngestOutcome {
    pub fn into_emitted(self) -> Option<EmittedOutput> {
        match self {
            IngestOutcome::Fired(out) => Some(out),
            _ => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            IngestOutcome::Duplicate | IngestOutcome::AlreadyConsumed | IngestOutcome::Stale
        )
    }
}

/// Evaluate `rule` against the entries of `set` alive at `now`.
pub fn evaluate_rule(rule: &FusionRule, set: &PendingSet, now: Timestamp) -> Option<Fusion> {
    match rule {
        FusionRule::Redundant(feeds) => {
            let latest = feeds
                .iter()
                .filter_map(|m| set.latest_alive(m, now))
                .max_by_key(|e| (e.arrival, e.id))?;
            Some(Fusion {
                consumed: vec![latest.id],
                discarded: Vec::new(),
            })
        }
        FusionRule::Complementary(required) => {
            let mut latest = Vec::with_capacity(required.len());
            for m in required {
                latest.push(set.latest_alive(m, now)?);
            }
            let consumed: Vec<EvidenceId> = latest.iter().map(|e| e.id).collect();
            // only alive entries older than the one consumed; later-stamped
            // evidence stays for a future evaluation
            let discarded = set
                .alive(now)
                .filter(|e| {
                    latest.iter().any(|l| {
                        l.modality_id == e.modality_id && (e.arrival, e.id) < (l.arrival, l.id)
                    })
                })
                .map(|e| e.id)
                .collect();
            Some(Fusion {
                consumed,
                discarded,
            })
        }
    }
}

/// One action's full ingest step: purge, insert, evaluate, consume.
///
/// The caller must hold exclusive access to `set` for the whole call.
pub fn ingest_into(
    output: &OutputDescriptor,
    set: &mut PendingSet,
    evidence: Evidence,
    now: Timestamp,
) -> IngestOutcome {
    set.purge_expired(now);

    match set.insert(evidence, now) {
        InsertOutcome::Inserted => {}
        InsertOutcome::Duplicate => return IngestOutcome::Duplicate,
        InsertOutcome::AlreadyConsumed => return IngestOutcome::AlreadyConsumed,
        InsertOutcome::Stale => return IngestOutcome::Stale,
    }

    let Some(fusion) = evaluate_rule(&output.rule, set, now) else {
        return IngestOutcome::Pending;
    };

    set.remove_fused(&fusion.consumed, &fusion.discarded);
    IngestOutcome::Fired(EmittedOutput {
        action_id: output.id.clone(),
        wire_label: output.wire_label.clone(),
        emitted_at: now,
        consumed: fusion.consumed,
    })
}
