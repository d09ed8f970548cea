use rand::{Rng, RngCore};

use crate::error::ConfigError;
use crate::{CellId, Trait};

/// The current traits of all agents, `features` consecutive entries per
/// cell. This is the single source of truth for agent state; keeping overlap
/// figures in step with it is the caller's job.
#[derive(Clone, PartialEq, Eq)]
pub struct BeliefStore {
    features: usize,
    traits: Trait,
    values: Vec<Trait>,
}

impl BeliefStore {
    /// Take given traits, `features` per cell. Every trait must lie in
    /// `[0, traits)`.
    pub fn from_values(features: usize, traits: Trait, values: Vec<Trait>) -> Result<BeliefStore, ConfigError> {
        if features == 0 {
            return Err(ConfigError::NoFeatures);
        }
        if traits == 0 {
            return Err(ConfigError::NoTraits);
        }
        if values.len() % features != 0 {
            return Err(ConfigError::BeliefShape {
                expected: (values.len() / features + 1) * features,
                actual: values.len(),
            });
        }
        if let Some(i) = values.iter().position(|&v| v >= traits) {
            return Err(ConfigError::TraitOutOfRange {
                cell: i / features,
                feature: i % features,
                value: values[i],
                traits,
            });
        }
        Ok(BeliefStore {
            features,
            traits,
            values,
        })
    }

    /// Draw every trait of every cell uniformly from `[0, traits)`.
    pub fn random(cells: usize, features: usize, traits: Trait, rng: &mut dyn RngCore) -> BeliefStore {
        let values = (0..cells * features)
            .map(|_| rng.gen_range(0..traits))
            .collect();
        BeliefStore {
            features,
            traits,
            values,
        }
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn traits(&self) -> Trait {
        self.traits
    }

    pub fn cells(&self) -> usize {
        self.values.len() / self.features
    }

    pub fn get(&self, cell: CellId, feature: usize) -> Trait {
        self.values[cell * self.features + feature]
    }

    pub fn set(&mut self, cell: CellId, feature: usize, value: Trait) {
        self.values[cell * self.features + feature] = value;
    }

    pub fn beliefs(&self, cell: CellId) -> &[Trait] {
        &self.values[cell * self.features..(cell + 1) * self.features]
    }

    /// Number of features on which the two cells agree.
    pub fn similarity(&self, a: CellId, b: CellId) -> usize {
        self.beliefs(a)
            .iter()
            .zip(self.beliefs(b))
            .filter(|(x, y)| x == y)
            .count()
    }

    /// The features on which the two cells differ, in feature order.
    pub fn mismatches(&self, a: CellId, b: CellId) -> Vec<usize> {
        self.beliefs(a)
            .iter()
            .zip(self.beliefs(b))
            .enumerate()
            .filter_map(|(f, (x, y))| if x != y { Some(f) } else { None })
            .collect()
    }
}
