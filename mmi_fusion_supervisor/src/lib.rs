//! mmi_fusion_supervisor
//!
//! Outside-world facing orchestration layer for `mmi_fusion_core`.
//!
//! Responsibilities:
//! - normalize raw recognizer events into evidence via adapters
//! - own every action's pending evidence, sharded by action id
//! - run core fusion on ingest, serialized per action
//! - expire stale evidence on a timer
//!
//! Non-goals:
//! - no IO
//! - no delivery of fused outputs (returned to the caller)
//! - no fusion rules (those live in core)

pub mod adapter;
pub mod clock;
pub mod correlator;
pub mod scheduler;

pub use adapter::{
    RawEvent,
    EvidenceBuilder,
    EventNormalizer,
    build_evidence_batch,
};

pub use clock::{Clock, ManualClock, SystemClock};

pub use correlator::{
    FusionCorrelator,
    CorrelatorStats,
    SweepReport,
};

pub use scheduler::{SchedulerHandle, TimeoutScheduler};
