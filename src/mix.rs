//! Per-profile operation mix.
//!
//! A [`MixTable`] holds, for every active profile, an ordered list of
//! operation kinds with cumulative probability thresholds. Selecting an
//! operation is a walk over those thresholds with one uniform draw, so the
//! outcome for a given draw depends only on the table.
//!
//! The weights are policy, not derived values: they come from
//! [`MixTable::default`] or from a YAML file such as
//!
//! ```yaml
//! low:
//!   - { kind: read, weight: 0.4 }
//!   - { kind: insert, weight: 0.3 }
//!   - { kind: update, weight: 0.3 }
//! med:
//!   - { kind: probe, weight: 0.3 }
//!   - { kind: read, weight: 0.3 }
//!   - { kind: insert, weight: 0.2 }
//!   - { kind: update, weight: 0.2 }
//! high:
//!   - { kind: probe, weight: 0.7 }
//!   - { kind: read, weight: 0.15 }
//!   - { kind: insert, weight: 0.1 }
//!   - { kind: update, weight: 0.05 }
//! ```

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::OperationKind;
use crate::profile::Profile;

/// Errors that can occur when building or loading a mix table.
#[derive(Error, Debug)]
pub enum MixTableError {
    #[error("Failed to read mix table file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse mix table YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Mix for profile '{0}' has no operations")]
    Empty(Profile),

    #[error("Mix for profile '{profile}' has invalid weight {weight} for '{kind}'")]
    InvalidWeight {
        profile: Profile,
        kind: OperationKind,
        weight: f64,
    },

    #[error("Mix for profile '{0}' has weights summing to zero")]
    ZeroTotal(Profile),
}

/// One weighted entry as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedOperation {
    pub kind: OperationKind,
    pub weight: f64,
}

/// Mix table file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixTableFile {
    pub low: Vec<WeightedOperation>,
    pub med: Vec<WeightedOperation>,
    pub high: Vec<WeightedOperation>,
}

/// A kind and the cumulative threshold it occupies up to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixStep {
    pub kind: OperationKind,
    pub threshold: f64,
}

/// Cumulative distribution over operation kinds for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMix {
    steps: Vec<MixStep>,
}

impl ProfileMix {
    /// Normalises `weights` into cumulative thresholds ending at exactly 1.0.
    pub fn from_weights(
        profile: Profile,
        weights: &[WeightedOperation],
    ) -> Result<Self, MixTableError> {
        if weights.is_empty() {
            return Err(MixTableError::Empty(profile));
        }
        for w in weights {
            if !w.weight.is_finite() || w.weight < 0.0 {
                return Err(MixTableError::InvalidWeight {
                    profile,
                    kind: w.kind,
                    weight: w.weight,
                });
            }
        }

        let total: f64 = weights.iter().map(|w| w.weight).sum();
        if total <= 0.0 {
            return Err(MixTableError::ZeroTotal(profile));
        }

        let mut running = 0.0;
        let mut steps: Vec<MixStep> = weights
            .iter()
            .map(|w| {
                running += w.weight;
                MixStep {
                    kind: w.kind,
                    threshold: (running / total).min(1.0),
                }
            })
            .collect();

        // Pin the tail so rounding never leaves a gap below 1.0.
        if let Some(last) = steps.last_mut() {
            last.threshold = 1.0;
        }

        Ok(Self { steps })
    }

    /// Returns the first kind whose threshold exceeds `draw`.
    pub fn select(&self, draw: f64) -> OperationKind {
        self.steps
            .iter()
            .find(|step| draw < step.threshold)
            .or_else(|| self.steps.last())
            .map(|step| step.kind)
            // from_weights never builds an empty mix
            .unwrap_or(OperationKind::Probe)
    }

    pub fn steps(&self) -> &[MixStep] {
        &self.steps
    }
}

/// Operation mixes for `low`, `med` and `high`. `off` has none.
#[derive(Debug, Clone, PartialEq)]
pub struct MixTable {
    low: ProfileMix,
    med: ProfileMix,
    high: ProfileMix,
}

impl MixTable {
    pub fn from_file_spec(spec: &MixTableFile) -> Result<Self, MixTableError> {
        Ok(Self {
            low: ProfileMix::from_weights(Profile::Low, &spec.low)?,
            med: ProfileMix::from_weights(Profile::Med, &spec.med)?,
            high: ProfileMix::from_weights(Profile::High, &spec.high)?,
        })
    }

    /// Parses a mix table from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self, MixTableError> {
        let spec: MixTableFile = serde_yaml::from_str(content)?;
        Self::from_file_spec(&spec)
    }

    /// Loads a mix table from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MixTableError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Mix for `profile`, or `None` for `off`.
    pub fn mix_for(&self, profile: Profile) -> Option<&ProfileMix> {
        match profile {
            Profile::Off => None,
            Profile::Low => Some(&self.low),
            Profile::Med => Some(&self.med),
            Profile::High => Some(&self.high),
        }
    }

    /// Selects the operation for a given uniform draw in `[0, 1)`.
    pub fn select(&self, profile: Profile, draw: f64) -> Option<OperationKind> {
        self.mix_for(profile).map(|mix| mix.select(draw))
    }

    /// Draws once from `rng` and selects an operation.
    pub fn pick<R: Rng>(&self, profile: Profile, rng: &mut R) -> Option<OperationKind> {
        let mix = self.mix_for(profile)?;
        Some(mix.select(rng.gen::<f64>()))
    }
}

impl Default for MixTable {
    /// Higher intensities lean on the cheap probe so large budgets stay
    /// reachable; `low` spends its smaller budget on reads and writes.
    fn default() -> Self {
        let spec = MixTableFile {
            low: vec![
                weighted(OperationKind::Read, 0.4),
                weighted(OperationKind::Insert, 0.3),
                weighted(OperationKind::Update, 0.3),
            ],
            med: vec![
                weighted(OperationKind::Probe, 0.3),
                weighted(OperationKind::Read, 0.3),
                weighted(OperationKind::Insert, 0.2),
                weighted(OperationKind::Update, 0.2),
            ],
            high: vec![
                weighted(OperationKind::Probe, 0.7),
                weighted(OperationKind::Read, 0.15),
                weighted(OperationKind::Insert, 0.1),
                weighted(OperationKind::Update, 0.05),
            ],
        };
        Self::from_file_spec(&spec).expect("built-in mix weights are valid")
    }
}

fn weighted(kind: OperationKind, weight: f64) -> WeightedOperation {
    WeightedOperation { kind, weight }
}
