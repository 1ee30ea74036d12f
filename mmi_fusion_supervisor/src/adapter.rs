//! Recognizer adapter layer: convert raw modality events into `mmi_fusion_core::Evidence`.
//!
//! This module is intentionally small:
//! - No IO
//! - No async
//! - No fusion rules (those live in core)
//!
//! Recognizers hand over `RawEvent`s; an `EvidenceBuilder` (normally the
//! catalog-backed `EventNormalizer`) maps them onto evidence, one copy per
//! action the modality feeds.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mmi_fusion_core::{Evidence, EvidenceId, FusionCatalogs, ModalityDescriptor, RejectedEvent, Timestamp};

/// A raw event from a recognizer: what was seen and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent<'a> {
    /// Modality wire label (e.g. `[GESTURES][LIKE]`) or modality id (`TOUCH.LIKE`).
    pub label: Cow<'a, str>,
    pub at: Timestamp,
}

impl<'a> RawEvent<'a> {
    pub fn new(label: impl Into<Cow<'a, str>>, at: Timestamp) -> Self {
        Self {
            label: label.into(),
            at,
        }
    }
}

/// Trait: map a `RawEvent` into evidence records.
///
/// Implementations return one record per action fed by the event's modality,
/// ascending by action id, all sharing one `EvidenceId`.
pub trait EvidenceBuilder {
    fn build(&self, ev: &RawEvent<'_>) -> Result<Vec<Evidence>, RejectedEvent>;
}

/// Catalog-backed builder.
///
/// Resolves the label against wire labels first, then modality ids, and stamps
/// each result with a process-unique `EvidenceId`.
#[derive(Debug)]
pub struct EventNormalizer {
    catalogs: Arc<FusionCatalogs>,
    next_id: AtomicU64,
}

impl EventNormalizer {
    pub fn new(catalogs: Arc<FusionCatalogs>) -> Self {
        Self {
            catalogs,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn catalogs(&self) -> &Arc<FusionCatalogs> {
        &self.catalogs
    }

    pub fn resolve(&self, label: &str) -> Option<&ModalityDescriptor> {
        let modalities = self.catalogs.modalities();
        modalities.resolve_label(label).or_else(|| modalities.resolve(label))
    }

    pub fn normalize(&self, ev: &RawEvent<'_>) -> Result<Vec<Evidence>, RejectedEvent> {
        let modality = self
            .resolve(&ev.label)
            .ok_or_else(|| RejectedEvent::UnknownModality(ev.label.to_string()))?;

        let id = EvidenceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok(self
            .catalogs
            .actions_for(modality.id.as_str())
            .iter()
            .map(|action| Evidence::new(id, modality, action.clone(), ev.at))
            .collect())
    }
}

impl EvidenceBuilder for EventNormalizer {
    fn build(&self, ev: &RawEvent<'_>) -> Result<Vec<Evidence>, RejectedEvent> {
        self.normalize(ev)
    }
}

/// Helper: build evidence for a batch of events, collecting rejections separately.
///
/// This is intentionally dumb; locking and ordering are handled by the correlator.
pub fn build_evidence_batch<B: EvidenceBuilder>(
    builder: &B,
    events: &[RawEvent<'_>],
) -> (Vec<Evidence>, Vec<RejectedEvent>) {
    let mut out = Vec::new();
    let mut rejected = Vec::new();
    for ev in events {
        match builder.build(ev) {
            Ok(evidence) => out.extend(evidence),
            Err(e) => rejected.push(e),
        }
    }
    (out, rejected)
}
