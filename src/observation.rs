/*!
At every checkpoint the engine hands a [`Snapshot`] to a results collector.
The collector decides what to do with it; the model itself never writes
anything anywhere.

Besides the number of institutions and the size of the biggest one, which are
the headline figures of the institutional model, a snapshot carries the
number of distinct belief vectors (the cultural regions of the classic
Axelrod model) and how closely agents match their own institution on average.
 */
use rustc_hash::FxHashSet;
use serde_derive::{Deserialize, Serialize};

use crate::beliefs::BeliefStore;
use crate::error::CollectorError;
use crate::institutions::InstitutionRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub iteration: u32,
    /// Wall-clock seconds since the run started.
    pub elapsed: f64,
    pub institution_count: usize,
    pub largest_institution: usize,
    pub distinct_cultures: usize,
    /// Mean over agents of overlap(agent, own institution) / features.
    pub mean_institution_overlap: f64,
    /// Counters since the previous checkpoint.
    pub interactions: u64,
    pub switches: u64,
    pub mutations: u64,
}

/// Events counted between two checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub interactions: u64,
    pub switches: u64,
    pub mutations: u64,
}

pub trait ResultsCollector {
    fn record(&mut self, snapshot: &Snapshot) -> Result<(), CollectorError>;
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub snapshots: Vec<Snapshot>,
}

impl ResultsCollector for Recorder {
    fn record(&mut self, snapshot: &Snapshot) -> Result<(), CollectorError> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

pub fn distinct_cultures(beliefs: &BeliefStore) -> usize {
    (0..beliefs.cells())
        .map(|cell| beliefs.beliefs(cell))
        .collect::<FxHashSet<_>>()
        .len()
}

pub fn mean_institution_overlap(registry: &InstitutionRegistry, beliefs: &BeliefStore) -> f64 {
    let cells = beliefs.cells();
    let total: usize = (0..cells)
        .map(|cell| registry.overlap(cell, registry.institution_of(cell), beliefs))
        .sum();
    total as f64 / (cells * beliefs.features()) as f64
}

pub fn snapshot(
    iteration: u32,
    elapsed: f64,
    registry: &InstitutionRegistry,
    beliefs: &BeliefStore,
    counters: Counters,
) -> Snapshot {
    Snapshot {
        iteration,
        elapsed,
        institution_count: registry.institution_count(),
        largest_institution: registry.largest_population(),
        distinct_cultures: distinct_cultures(beliefs),
        mean_institution_overlap: mean_institution_overlap(registry, beliefs),
        interactions: counters.interactions,
        switches: counters.switches,
        mutations: counters.mutations,
    }
}
