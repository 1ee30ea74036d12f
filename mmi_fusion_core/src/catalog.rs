use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::time::Timestamp;

// ---------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Modality event id, conventionally `<CHANNEL>.<ACTION>` (e.g. `TOUCH.LIKE`).
    ModalityId
);

string_id!(
    /// Output action id (e.g. `VOLUMEUP`).
    ActionId
);

impl ModalityId {
    /// The action part of a `<CHANNEL>.<ACTION>` id; the whole id if there is no dot.
    pub fn action_suffix(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((_, action)) => action,
            None => &self.0,
        }
    }
}

// ---------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------

/// One recognizable modality event and how long it stays usable as evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalityDescriptor {
    pub id: ModalityId,
    pub wire_label: String,
    pub window_ms: u64,
}

impl ModalityDescriptor {
    pub fn new(id: impl Into<ModalityId>, wire_label: impl Into<String>, window_ms: u64) -> Self {
        Self {
            id: id.into(),
            wire_label: wire_label.into(),
            window_ms,
        }
    }

    #[inline]
    pub fn expiry_for(&self, arrival: Timestamp) -> Timestamp {
        arrival.saturating_add_ms(self.window_ms)
    }
}

/// How an output action is satisfied by pending evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FusionRule {
    /// Any single alive entry from one of these modalities fires the action.
    Redundant(BTreeSet<ModalityId>),
    /// Every listed modality must have an alive entry at the same instant.
    Complementary(BTreeSet<ModalityId>),
}

impl FusionRule {
    /// Modalities this rule listens to.
    pub fn modalities(&self) -> &BTreeSet<ModalityId> {
        match self {
            FusionRule::Redundant(m) | FusionRule::Complementary(m) => m,
        }
    }

    #[inline]
    pub fn references(&self, modality: &ModalityId) -> bool {
        self.modalities().contains(modality)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FusionRule::Redundant(_) => "redundant",
            FusionRule::Complementary(_) => "complementary",
        }
    }
}

/// One canonical output action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub id: ActionId,
    pub wire_label: String,
    pub rule: FusionRule,
}

impl OutputDescriptor {
    pub fn new(id: impl Into<ActionId>, wire_label: impl Into<String>, rule: FusionRule) -> Self {
        Self {
            id: id.into(),
            wire_label: wire_label.into(),
            rule,
        }
    }
}

// ---------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------

/// Immutable modality lookup table, indexed by id and by wire label.
#[derive(Clone, Debug, Default)]
pub struct ModalityCatalog {
    by_id: BTreeMap<ModalityId, ModalityDescriptor>,
    by_label: HashMap<String, ModalityId>,
}

impl ModalityCatalog {
    pub fn new<I>(descriptors: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ModalityDescriptor>,
    {
        let mut cat = ModalityCatalog::default();
        for d in descriptors {
            if cat.by_id.contains_key(&d.id) {
                return Err(ConfigError::DuplicateModality(d.id.to_string()));
            }
            if cat.by_label.contains_key(&d.wire_label) {
                return Err(ConfigError::DuplicateLabel(d.wire_label));
            }
            cat.by_label.insert(d.wire_label.clone(), d.id.clone());
            cat.by_id.insert(d.id.clone(), d);
        }
        Ok(cat)
    }

    pub fn resolve(&self, id: &str) -> Option<&ModalityDescriptor> {
        self.by_id.get(id)
    }

    pub fn resolve_label(&self, wire_label: &str) -> Option<&ModalityDescriptor> {
        self.by_label.get(wire_label).and_then(|id| self.by_id.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Descriptors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ModalityDescriptor> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Immutable output lookup table. Every rule is checked against a `ModalityCatalog`.
#[derive(Clone, Debug, Default)]
pub struct OutputCatalog {
    by_id: BTreeMap<ActionId, OutputDescriptor>,
}

impl OutputCatalog {
    pub fn new<I>(descriptors: I, modalities: &ModalityCatalog) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = OutputDescriptor>,
    {
        let mut by_id = BTreeMap::new();
        for d in descriptors {
            if d.rule.modalities().is_empty() {
                return Err(ConfigError::EmptyRule(d.id.to_string()));
            }
            if let Some(missing) = d.rule.modalities().iter().find(|m| !modalities.contains(m.as_str())) {
                return Err(ConfigError::UnknownModality {
                    action: d.id.to_string(),
                    modality: missing.to_string(),
                });
            }
            if by_id.contains_key(&d.id) {
                return Err(ConfigError::DuplicateOutput(d.id.to_string()));
            }
            by_id.insert(d.id.clone(), d);
        }
        Ok(OutputCatalog { by_id })
    }

    pub fn resolve(&self, id: &str) -> Option<&OutputDescriptor> {
        self.by_id.get(id)
    }

    /// Descriptors in ascending action id order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputDescriptor> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Both catalogs plus the modality -> actions routing derived from the rules.
///
/// Built once at startup and shared read-only (`Arc<FusionCatalogs>`) by the
/// normalizer and the correlator.
#[derive(Clone, Debug)]
pub struct FusionCatalogs {
    modalities: ModalityCatalog,
    outputs: OutputCatalog,
    routes: BTreeMap<ModalityId, Vec<ActionId>>,
}

impl FusionCatalogs {
    /// Fails if any modality feeds no output, so evidence that no action can
    /// use is impossible after loading.
    pub fn new(modalities: ModalityCatalog, outputs: OutputCatalog) -> Result<Self, ConfigError> {
        let mut routes: BTreeMap<ModalityId, Vec<ActionId>> = BTreeMap::new();
        // outputs iterate in ascending id order, so each route list is sorted
        for out in outputs.iter() {
            for m in out.rule.modalities() {
                routes.entry(m.clone()).or_default().push(out.id.clone());
            }
        }

        if let Some(orphan) = modalities.iter().find(|m| !routes.contains_key(&m.id)) {
            return Err(ConfigError::UnroutedModality(orphan.id.to_string()));
        }

        Ok(Self {
            modalities,
            outputs,
            routes,
        })
    }

    pub fn modalities(&self) -> &ModalityCatalog {
        &self.modalities
    }

    pub fn outputs(&self) -> &OutputCatalog {
        &self.outputs
    }

    /// Actions fed by `modality`, ascending. Empty for unknown modalities.
    pub fn actions_for(&self, modality: &str) -> &[ActionId] {
        self.routes.get(modality).map(Vec::as_slice).unwrap_or(&[])
    }
}
