use thiserror::Error;

use crate::{CellId, InstitutionId, Trait};

/// Rejected parameter sets. These are raised before the first step runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("grid must have at least one row and one column, got {rows}x{cols}")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("cell {cell} has no neighbours within radius {radius}")]
    NoNeighbours { cell: CellId, radius: usize },
    #[error("feature count must be non-zero")]
    NoFeatures,
    #[error("trait count must be at least one")]
    NoTraits,
    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("initial beliefs have {actual} entries, the grid needs {expected}")]
    BeliefShape { expected: usize, actual: usize },
    #[error("cell {cell} has trait {value} on feature {feature}, traits range over 0..{traits}")]
    TraitOutOfRange {
        cell: CellId,
        feature: usize,
        value: Trait,
        traits: Trait,
    },
    #[error("initial beliefs have {actual} traits per feature, the parameters say {expected}")]
    TraitCount { expected: Trait, actual: Trait },
    #[error("could not read configuration: {0}")]
    Unreadable(String),
}

/// Violations of the membership ring invariants.
#[derive(Debug, Error, PartialEq)]
pub enum RingError {
    #[error("ring of institution {institution} closed after {seen} of {population} members")]
    ClosedEarly {
        institution: InstitutionId,
        seen: usize,
        population: usize,
    },
    #[error("ring of institution {institution} did not close within {population} steps")]
    Overlong {
        institution: InstitutionId,
        population: usize,
    },
    #[error("cell {cell} in the ring of institution {institution} belongs to {actual}")]
    ForeignMember {
        institution: InstitutionId,
        cell: CellId,
        actual: InstitutionId,
    },
    #[error("cell {cell} links forward to {next}, which does not link back")]
    Dangling { cell: CellId, next: CellId },
    #[error("cell {cell} is in institution {actual}, not {expected}")]
    MembershipMismatch {
        cell: CellId,
        expected: InstitutionId,
        actual: InstitutionId,
    },
    #[error("anchor {anchor} is not a member of institution {institution}")]
    ForeignAnchor {
        anchor: CellId,
        institution: InstitutionId,
    },
    #[error("institution {institution} counts {counted} members but {population} are recorded")]
    PopulationMismatch {
        institution: InstitutionId,
        counted: usize,
        population: usize,
    },
    #[error("no latent institution is available for cell {cell}")]
    NoLatentInstitution { cell: CellId },
}

/// A results collector could not take a snapshot. The run carries on.
#[derive(Debug, Error)]
#[error("collector failed: {0}")]
pub struct CollectorError(pub String);

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("institution ring corrupted: {0}")]
    Ring(#[from] RingError),
}
