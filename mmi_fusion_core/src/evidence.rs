use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{ActionId, ModalityDescriptor, ModalityId};
use crate::time::Timestamp;

/// Identity of one normalized raw event. Fan-out copies share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(pub u64);

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ev#{}", self.0)
    }
}

/// One modality event retained for a single action, with a hard expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub modality_id: ModalityId,
    pub action_id: ActionId,
    pub arrival: Timestamp,
    pub expiry: Timestamp,
}

impl Evidence {
    pub fn new(
        id: EvidenceId,
        modality: &ModalityDescriptor,
        action_id: impl Into<ActionId>,
        arrival: Timestamp,
    ) -> Self {
        Evidence {
            id,
            modality_id: modality.id.clone(),
            action_id: action_id.into(),
            arrival,
            expiry: modality.expiry_for(arrival),
        }
    }

    /// Visible to rule evaluation: `arrival <= now < expiry`.
    ///
    /// A zero-length window is therefore never visible.
    #[inline]
    pub fn is_alive_at(&self, now: Timestamp) -> bool {
        now >= self.arrival && now < self.expiry
    }

    /// Past its window. Evidence that has not arrived yet is not expired.
    #[inline]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.arrival && !self.is_alive_at(now)
    }
}
