//! mmi_fusion_core
//!
//! Pure building blocks of the multimodal fusion correlator:
//! - catalogs of modality events and fused output actions
//! - catalog configuration (TOML) and validation
//! - evidence with per-entry expiry, per-action pending sets
//! - redundant / complementary rule evaluation
//!
//! No IO beyond reading a config file, no async, no locking. Orchestration
//! lives in `mmi_fusion_supervisor`.

pub mod time;
pub mod error;

pub mod catalog;
pub mod cfg;
pub mod evidence;
pub mod pending;
pub mod decide;

pub use time::Timestamp;
pub use error::{ConfigError, RejectedEvent, RuleParseError};

pub use catalog::{
    ActionId, FusionCatalogs, FusionRule, ModalityCatalog, ModalityDescriptor, ModalityId,
    OutputCatalog, OutputDescriptor,
};
pub use cfg::{CorrelatorCfg, FusionConfig, ModalityEntry, OutputEntry, RuleSpec, BUILTIN_CATALOG_TOML};
pub use evidence::{Evidence, EvidenceId};
pub use pending::{InsertOutcome, PendingSet};
pub use decide::{evaluate_rule, ingest_into, EmittedOutput, Fusion, IngestOutcome};
