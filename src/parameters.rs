use serde_derive::{Deserialize, Serialize};

use crate::consensus::Tally;
use crate::error::ConfigError;
use crate::grid::Neighbourhood;
use crate::policy::PolicyKind;
use crate::Trait;

/// Everything a run needs to know before setup. Fixed for the lifetime of
/// the run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Parameters {
    pub rows: usize,
    pub cols: usize,
    pub radius: usize,
    pub neighbourhood: Neighbourhood,
    pub features: usize,
    pub traits: Trait,

    /// Number of checkpoints in the run.
    pub iterations: u32,
    /// Batches of one step per agent between two checkpoints.
    pub checkpoint: u32,

    /// Probability per step that the acting agent mutates one feature.
    pub mutation: f64,
    /// Probability of an interaction decision going against homophily.
    pub selection_error: f64,
    /// Weight of a shared institution on interaction (ALPHA).
    pub alpha: f64,
    /// Institutional resilience against belief changes (BETA).
    pub beta: f64,
    /// Scale of the switching probability (ALPHA′).
    pub alpha_switch: f64,
    /// Exponent of the population pull in switching (BETA′).
    pub beta_switch: f64,
    /// Exponent applied to the resistance ratio.
    pub resilience_exponent: f64,

    pub policy: PolicyKind,
    /// Run a voting round every this many checkpoints; 0 disables voting.
    pub consensus_every: u32,
    pub tally: Tally,

    pub seed: u64,
    /// Check every institution ring at every checkpoint. Slow.
    pub verify_rings: bool,
}

impl Default for Parameters {
    fn default() -> Parameters {
        Parameters {
            rows: 20,
            cols: 20,
            radius: 1,
            neighbourhood: Neighbourhood::VonNeumann,
            features: 5,
            traits: 10,

            iterations: 100,
            checkpoint: 10,

            mutation: 1e-4,
            selection_error: 0.01,
            alpha: 0.5,
            beta: 0.5,
            alpha_switch: 1.0,
            beta_switch: 1.0,
            resilience_exponent: 1.0,

            policy: PolicyKind::Institutional,
            consensus_every: 1,
            tally: Tally::AllFeatures,

            seed: 0x5EED_1DEA,
            verify_rings: false,
        }
    }
}

impl Parameters {
    pub fn agents(&self) -> usize {
        self.rows * self.cols
    }

    /// Reject parameter sets the model cannot run with. Neighbourhoods are
    /// checked when the grid is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.features == 0 {
            return Err(ConfigError::NoFeatures);
        }
        if self.traits == 0 {
            return Err(ConfigError::NoTraits);
        }
        if self.iterations == 0 {
            return Err(ConfigError::Zero("iterations"));
        }
        if self.checkpoint == 0 {
            return Err(ConfigError::Zero("checkpoint"));
        }
        for (name, value) in [
            ("mutation", self.mutation),
            ("selection_error", self.selection_error),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("alpha_switch", self.alpha_switch),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("beta_switch", self.beta_switch),
            ("resilience_exponent", self.resilience_exponent),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::Negative { name, value });
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Parameters, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Unreadable(e.to_string()))
    }
}
