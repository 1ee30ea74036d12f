//! Catalog configuration: the TOML document the catalogs are built from.
//!
//! ```toml
//! [correlator]
//! shards = 4
//! sweep_interval_ms = 250
//!
//! [[modality]]
//! id = "TOUCH.LIKE"
//! label = "[GESTURES][LIKE]"
//! window_ms = 5000
//!
//! [[output]]
//! id = "LIKE"
//! label = "[FUSION][LIKE]"
//! rule = "redundant"                  # or "redundant:{TOUCH.LIKE}"
//!                                     # or "complementary:{TOUCH.LIKE,VOICE.LIKE}"
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{
    FusionCatalogs, FusionRule, ModalityCatalog, ModalityDescriptor, ModalityId, OutputCatalog,
    OutputDescriptor,
};
use crate::error::{ConfigError, RuleParseError};

/// The catalog shipped with the crate: the touch gesture set and its outputs.
pub const BUILTIN_CATALOG_TOML: &str = include_str!("../catalog/default.toml");

/// Runtime knobs for the correlator and its sweeper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorCfg {
    /// Number of independently locked pending-set shards.
    pub shards: usize,
    /// Period of the timeout sweep.
    pub sweep_interval_ms: u64,
}

impl Default for CorrelatorCfg {
    fn default() -> Self {
        Self {
            shards: 1,
            sweep_interval_ms: 250,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityEntry {
    pub id: String,
    pub label: String,
    /// Signed so a negative value is reported instead of failing to parse.
    pub window_ms: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub id: String,
    pub label: String,
    pub rule: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Whole configuration document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub correlator: CorrelatorCfg,
    #[serde(default, rename = "modality")]
    pub modalities: Vec<ModalityEntry>,
    #[serde(default, rename = "output")]
    pub outputs: Vec<OutputEntry>,
}

impl FusionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_CATALOG_TOML)
    }

    /// Validate the enabled entries and build both catalogs.
    ///
    /// Disabled entries are dropped first and never validated.
    pub fn build_catalogs(&self) -> Result<FusionCatalogs, ConfigError> {
        let mut modalities = Vec::new();
        for m in self.modalities.iter().filter(|m| m.enabled) {
            let window_ms = u64::try_from(m.window_ms).map_err(|_| ConfigError::NegativeWindow {
                modality: m.id.clone(),
                window_ms: m.window_ms,
            })?;
            modalities.push(ModalityDescriptor::new(m.id.as_str(), m.label.as_str(), window_ms));
        }
        let modality_cat = ModalityCatalog::new(modalities)?;

        let mut outputs = Vec::new();
        for o in self.outputs.iter().filter(|o| o.enabled) {
            let parsed: RuleSpec = o.rule.parse().map_err(|reason| ConfigError::InvalidRule {
                action: o.id.clone(),
                rule: o.rule.clone(),
                reason,
            })?;
            let rule = parsed.resolve(&o.id, &modality_cat);
            outputs.push(OutputDescriptor::new(o.id.as_str(), o.label.as_str(), rule));
        }
        let output_cat = OutputCatalog::new(outputs, &modality_cat)?;

        let catalogs = FusionCatalogs::new(modality_cat, output_cat)?;
        debug!(
            modalities = catalogs.modalities().len(),
            outputs = catalogs.outputs().len(),
            "fusion catalogs loaded"
        );
        Ok(catalogs)
    }
}

/// Textual rule as written in configuration, before modality resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleSpec {
    /// `None` (bare `redundant`) means "every modality whose id ends in
    /// `.<action id>`". An explicit list is taken as written, even when empty.
    Redundant(Option<Vec<String>>),
    Complementary(Vec<String>),
}

impl RuleSpec {
    /// Turn the textual rule into a `FusionRule`. Unknown modality names are
    /// kept so `OutputCatalog::new` can report them.
    pub fn resolve(&self, action: &str, modalities: &ModalityCatalog) -> FusionRule {
        match self {
            RuleSpec::Redundant(None) => FusionRule::Redundant(
                modalities
                    .iter()
                    .filter(|m| m.id.action_suffix() == action)
                    .map(|m| m.id.clone())
                    .collect(),
            ),
            RuleSpec::Redundant(Some(list)) => FusionRule::Redundant(to_set(list)),
            RuleSpec::Complementary(list) => FusionRule::Complementary(to_set(list)),
        }
    }
}

fn to_set(list: &[String]) -> BTreeSet<ModalityId> {
    list.iter().map(|s| ModalityId::new(s.as_str())).collect()
}

impl FromStr for RuleSpec {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = match s.split_once(':') {
            Some((k, r)) => (k.trim(), Some(r.trim())),
            None => (s, None),
        };

        let list: Option<Vec<String>> = rest.map(|r| {
            let inner = r
                .strip_prefix('{')
                .and_then(|r| r.strip_suffix('}'))
                .unwrap_or(r);
            inner
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        });

        match (kind.to_ascii_lowercase().as_str(), list) {
            ("redundant", list) => Ok(RuleSpec::Redundant(list)),
            ("complementary", Some(list)) => Ok(RuleSpec::Complementary(list)),
            ("complementary", None) => Err(RuleParseError::MissingModalities),
            _ => Err(RuleParseError::UnknownKind(kind.to_string())),
        }
    }
}
