//! Validated pollutant records, emission factors and speciation tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{check_non_negative, EmissionError};

// ---------------------------------------------------------------------------
// SpeciesKeys
// ---------------------------------------------------------------------------

fn default_voc_name() -> String {
    "VOC".to_string()
}

fn default_pm_name() -> String {
    "PM".to_string()
}

/// Names of the two lumped pollutants that are speciated instead of emitted.
///
/// Defaults to `"VOC"` and `"PM"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesKeys {
    #[serde(default = "default_voc_name")]
    pub voc_name: String,
    #[serde(default = "default_pm_name")]
    pub pm_name: String,
}

impl Default for SpeciesKeys {
    fn default() -> Self {
        Self {
            voc_name: default_voc_name(),
            pm_name: default_pm_name(),
        }
    }
}

impl SpeciesKeys {
    pub fn new(voc_name: impl Into<String>, pm_name: impl Into<String>) -> Self {
        Self {
            voc_name: voc_name.into(),
            pm_name: pm_name.into(),
        }
    }

    pub fn is_lumped(&self, name: &str) -> bool {
        name == self.voc_name || name == self.pm_name
    }

    /// One error naming every required key absent from `names`.
    pub(crate) fn check_present<'a>(
        &self,
        names: impl Iterator<Item = &'a str> + Clone,
    ) -> Result<(), EmissionError> {
        let missing: Vec<String> = [&self.voc_name, &self.pm_name]
            .into_iter()
            .filter(|key| !names.clone().any(|n| n == key.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EmissionError::MissingKeys(missing))
        }
    }
}

/// Run-level replacement for a source's lumped pollutant names.
///
/// Unset fields keep the source's own key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voc_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_name: Option<String>,
}

impl KeyOverride {
    pub fn new(voc_name: impl Into<String>, pm_name: impl Into<String>) -> Self {
        Self {
            voc_name: Some(voc_name.into()),
            pm_name: Some(pm_name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.voc_name.is_none() && self.pm_name.is_none()
    }

    pub fn apply(&self, keys: &SpeciesKeys) -> SpeciesKeys {
        SpeciesKeys {
            voc_name: self.voc_name.clone().unwrap_or_else(|| keys.voc_name.clone()),
            pm_name: self.pm_name.clone().unwrap_or_else(|| keys.pm_name.clone()),
        }
    }
}

/// Molecular weight must be positive and finite; PM is fixed at 1.
pub(crate) fn check_molecular_weight(
    name: &str,
    mw: f64,
    keys: &SpeciesKeys,
) -> Result<f64, EmissionError> {
    if name == keys.pm_name {
        return if mw == 1.0 {
            Ok(mw)
        } else {
            Err(EmissionError::PmMolecularWeight(mw))
        };
    }
    if mw.is_finite() && mw > 0.0 {
        Ok(mw)
    } else {
        Err(EmissionError::InvalidValue {
            what: format!("molecular weight of {name}"),
            value: mw,
        })
    }
}

pub(crate) fn check_name(name: &str, seen: &mut Vec<String>) -> Result<(), EmissionError> {
    if name.trim().is_empty() {
        return Err(EmissionError::Configuration(
            "pollutant names must not be empty".to_string(),
        ));
    }
    if seen.iter().any(|s| s == name) {
        return Err(EmissionError::Configuration(format!(
            "pollutant '{name}' declared twice"
        )));
    }
    seen.push(name.to_string());
    Ok(())
}

// ---------------------------------------------------------------------------
// Pollutant / EmissionFactors
// ---------------------------------------------------------------------------

/// One inventory pollutant with its emission factor and molecular weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Pollutant {
    pub name: String,
    /// Mass emitted per unit of activity.
    pub factor: f64,
    /// g mol⁻¹. Fixed at 1 for PM.
    pub molecular_weight: f64,
}

/// Validated emission factors of an area source, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionFactors {
    pollutants: Vec<Pollutant>,
}

impl EmissionFactors {
    /// Validates `(name, factor, molecular_weight)` entries against `keys`.
    pub fn new<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, f64, f64)>,
        keys: &SpeciesKeys,
    ) -> Result<Self, EmissionError> {
        let entries: Vec<(String, f64, f64)> = entries
            .into_iter()
            .map(|(n, f, mw)| (n.into(), f, mw))
            .collect();
        keys.check_present(entries.iter().map(|(n, _, _)| n.as_str()))?;

        let mut seen = Vec::with_capacity(entries.len());
        let mut pollutants = Vec::with_capacity(entries.len());
        for (name, factor, molecular_weight) in entries {
            check_name(&name, &mut seen)?;
            let factor = check_non_negative(format!("emission factor of {name}"), factor)?;
            let molecular_weight = check_molecular_weight(&name, molecular_weight, keys)?;
            pollutants.push(Pollutant {
                name,
                factor,
                molecular_weight,
            });
        }
        Ok(Self { pollutants })
    }

    /// Parses `{"CO": [factor, molecular_weight], ...}`.
    pub fn from_json_str(json: &str, keys: &SpeciesKeys) -> Result<Self, EmissionError> {
        let raw: BTreeMap<String, (f64, f64)> = serde_json::from_str(json)
            .map_err(|e| EmissionError::Configuration(format!("emission factors: {e}")))?;
        Self::new(raw.into_iter().map(|(n, (f, mw))| (n, f, mw)), keys)
    }

    pub fn get(&self, name: &str) -> Option<&Pollutant> {
        self.pollutants.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pollutant> {
        self.pollutants.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.pollutants.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.pollutants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pollutants.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SpeciationTable
// ---------------------------------------------------------------------------

/// Fractions of a lumped pollutant (VOC or PM) assigned to model species.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeciationTable {
    entries: Vec<(String, f64)>,
}

impl SpeciationTable {
    /// Each fraction must lie in `[0, 1]`; names must be unique. Fractions
    /// need not sum to 1.
    pub fn new<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<Self, EmissionError> {
        let mut table: Vec<(String, f64)> = Vec::new();
        for (name, fraction) in entries {
            let name = name.into();
            if table.iter().any(|(n, _)| *n == name) {
                return Err(EmissionError::DuplicateSpecies(name));
            }
            let fraction = check_non_negative(format!("fraction of species {name}"), fraction)?;
            if fraction > 1.0 {
                return Err(EmissionError::InvalidValue {
                    what: format!("fraction of species {name} (at most 1)"),
                    value: fraction,
                });
            }
            table.push((name, fraction));
        }
        let total: f64 = table.iter().map(|(_, f)| f).sum();
        if total > 1.0 + 1e-6 {
            warn!("Speciation fractions sum to {total:.4}, more than the lumped total");
        }
        Ok(Self { entries: table })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, EmissionError> {
        let raw: BTreeMap<String, f64> = serde_json::from_str(json)
            .map_err(|e| EmissionError::Configuration(format!("speciation table: {e}")))?;
        Self::new(raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), *f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn total_fraction(&self) -> f64 {
        self.entries.iter().map(|(_, f)| f).sum()
    }
}
