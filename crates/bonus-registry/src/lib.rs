#![deny(warnings)]

//! Configuration loading for the immutable bonus registry.
//!
//! A [`Registry`] is built once from a structured YAML document and is
//! read-only for the process lifetime. Any malformed entry fails the whole
//! load; no partial registry is ever served. Runtime reload is deliberately
//! unsupported: a configuration change means constructing a new `Registry`.

use bonus_core::{BonusDefinition, BonusType, Condition, Era, ResourceKind, SourceKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Errors that abort registry construction.
///
/// Every variant raised for a declared entry names the offending source kind
/// and identifier.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{kind} '{id}': duplicate identifier")]
    DuplicateIdentifier { kind: SourceKind, id: String },
    #[error("{kind} '{id}': unknown bonus type '{key}'")]
    UnknownBonusType {
        kind: SourceKind,
        id: String,
        key: String,
    },
    #[error("{kind} '{id}': unknown resource '{key}'")]
    UnknownResource {
        kind: SourceKind,
        id: String,
        key: String,
    },
    #[error("{kind} '{id}': unknown condition predicate '{predicate}'")]
    UnknownPredicate {
        kind: SourceKind,
        id: String,
        predicate: String,
    },
    #[error("{kind} '{id}': invalid value for '{field}': {detail}")]
    InvalidValue {
        kind: SourceKind,
        id: String,
        field: String,
        detail: String,
    },
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

/// One declared entry, prior to validation.
///
/// Bonus and cost values are kept raw so a bad value can be reported against
/// the entry that carries it instead of failing the whole document parse.
#[derive(Clone, Debug, Deserialize)]
pub struct RawDefinition {
    pub id: String,
    #[serde(default)]
    pub bonuses: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub conditions: BTreeMap<String, serde_yaml::Value>,
}

/// Structured configuration document, one section per source kind.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub characters: Vec<RawDefinition>,
    #[serde(default)]
    pub buildings: Vec<RawDefinition>,
    #[serde(default)]
    pub technologies: Vec<RawDefinition>,
    #[serde(default)]
    pub traits: Vec<RawDefinition>,
}

/// Canonical mapping from (source kind, identifier) to [`BonusDefinition`].
#[derive(Clone, Debug)]
pub struct Registry {
    definitions: BTreeMap<SourceKind, BTreeMap<String, BonusDefinition>>,
}

impl Registry {
    /// Build a registry from parsed configuration. Fails atomically on the
    /// first invalid entry.
    pub fn load(config: RegistryConfig) -> Result<Self, ConfigError> {
        let mut definitions: BTreeMap<SourceKind, BTreeMap<String, BonusDefinition>> =
            BTreeMap::new();
        for (kind, entries) in [
            (SourceKind::Character, config.characters),
            (SourceKind::Building, config.buildings),
            (SourceKind::Technology, config.technologies),
            (SourceKind::Trait, config.traits),
        ] {
            let section = definitions.entry(kind).or_default();
            for raw in entries {
                let def = validate_entry(kind, raw)?;
                let id = def.id.clone();
                if section.insert(id.clone(), def).is_some() {
                    return Err(ConfigError::DuplicateIdentifier { kind, id });
                }
            }
        }
        let registry = Self { definitions };
        info!(definitions = registry.len(), "bonus registry loaded");
        Ok(registry)
    }

    /// Parse a YAML document and build a registry from it.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::load(config)
    }

    /// Read a YAML file and build a registry from it.
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Pure read; `None` when no definition matches.
    pub fn lookup(&self, kind: SourceKind, id: &str) -> Option<&BonusDefinition> {
        self.definitions.get(&kind)?.get(id)
    }

    /// Number of definitions across all source kinds.
    pub fn len(&self) -> usize {
        self.definitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every definition in (kind, id) order.
    pub fn definitions(&self) -> impl Iterator<Item = &BonusDefinition> {
        self.definitions.values().flat_map(BTreeMap::values)
    }

    /// The fixed bonus type enumeration this registry serves.
    pub fn bonus_types(&self) -> &'static [BonusType] {
        &BonusType::ALL
    }
}

fn validate_entry(kind: SourceKind, raw: RawDefinition) -> Result<BonusDefinition, ConfigError> {
    if raw.id.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            kind,
            id: raw.id,
            field: "id".to_string(),
            detail: "identifier must be non-empty".to_string(),
        });
    }
    let mut values = BTreeMap::new();
    for (key, value) in raw.bonuses {
        let ty = BonusType::from_str(&key).map_err(|_| ConfigError::UnknownBonusType {
            kind,
            id: raw.id.clone(),
            key: key.clone(),
        })?;
        values.insert(ty, decimal_field(kind, &raw.id, &key, value)?);
    }
    let mut cost = BTreeMap::new();
    for (key, value) in raw.cost {
        let resource = ResourceKind::from_str(&key).map_err(|_| ConfigError::UnknownResource {
            kind,
            id: raw.id.clone(),
            key: key.clone(),
        })?;
        cost.insert(resource, decimal_field(kind, &raw.id, &key, value)?);
    }
    let mut conditions = Vec::new();
    for (predicate, value) in raw.conditions {
        match predicate.as_str() {
            "min_era" => {
                let name: String = typed_field(kind, &raw.id, "min_era", value)?;
                let era = Era::from_str(&name).map_err(|e| ConfigError::InvalidValue {
                    kind,
                    id: raw.id.clone(),
                    field: "min_era".to_string(),
                    detail: e.to_string(),
                })?;
                conditions.push(Condition::MinEra(era));
            }
            "terrain" => {
                let tags: Vec<String> = typed_field(kind, &raw.id, "terrain", value)?;
                conditions.push(Condition::Terrain(tags));
            }
            other => {
                return Err(ConfigError::UnknownPredicate {
                    kind,
                    id: raw.id.clone(),
                    predicate: other.to_string(),
                })
            }
        }
    }
    Ok(BonusDefinition {
        kind,
        id: raw.id,
        values,
        description: raw.description,
        cost,
        conditions,
    })
}

fn decimal_field(
    kind: SourceKind,
    id: &str,
    field: &str,
    value: serde_yaml::Value,
) -> Result<Decimal, ConfigError> {
    typed_field(kind, id, field, value)
}

fn typed_field<T: serde::de::DeserializeOwned>(
    kind: SourceKind,
    id: &str,
    field: &str,
    value: serde_yaml::Value,
) -> Result<T, ConfigError> {
    serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidValue {
        kind,
        id: id.to_string(),
        field: field.to_string(),
        detail: e.to_string(),
    })
}
