/*!
Model Description
=================

This model description loosely follows the ODD (Overview, Design concepts,
Details) protocol (Grimm et al., 2006; Grimm et al., 2010). The sections below
describe the model, and point to the modules that implement each part.

# 1. Purpose

The model is an extension of Axelrod's (1997) model of the dissemination of
culture. Agents on a grid hold cultures, described as vectors of features
that each take one of a number of traits, and they become more similar to
each other through local interaction. The extension adds *institutions*:
aggregate belief profiles that groups of agents share, that agents can join
and leave, and that resist changes in the beliefs of their members.

The model is designed to compare a family of experiment variants. These
variants share everything described here and differ only in how the
probabilities of three decisions are computed (see 4.8 Interaction). The
variants are values of one policy type, not separate models.

 */

/**
# 2. Entities, state variables, and scales

The world is a rectangular grid of `rows × cols` cells, wrapped into a torus.
Each cell holds one agent, so the population is fixed. Each agent has
`features` features with traits in `0..traits`.

 */
pub type Trait = u32;

/// Cells are addressed by their row-major index on the grid.
pub type CellId = usize;

/// Institution ids range over the cell indices. At the start of a run, the
/// institution of every cell is the one with the cell's own index.
pub type InstitutionId = usize;

/**
## 2.1 Grid

Every cell knows its neighbours within a fixed radius, computed once at the
start of a run.

 */
pub mod grid;

/**
## 2.2 Agents

The beliefs of all agents live in one store. Agents have no state besides
their beliefs and their institution.

 */
pub mod beliefs;

/**
## 2.3 Institutions

An institution has an aggregate belief, which for each feature is either a
trait or not settled yet, and a population of member agents. Institutions
whose population drops to zero are latent: they keep their aggregate belief,
but take no further part in the model unless a seceding agent refounds one.

 */
pub mod institutions;

/**
# 3. Process overview and scheduling

Time is discrete. One *iteration* consists of `checkpoint` batches of
`rows × cols` steps, so that on average every agent acts `checkpoint` times.
In each step

 1. a random agent A and a random neighbour B of A are drawn;
 2. the policy decides whether A and B interact;
 3. if so, a feature on which they differ is drawn, and A's institution may
    veto A's adopting B's trait;
 4. if A adopts it, the policy decides whether A moves to B's institution;
 5. independently of all of this, A mutates one feature with a small
    probability.

After every iteration the institutions may hold a vote (every
`consensus_every` iterations), and a snapshot of the state is reported.

 */
pub mod engine;

/**
# 4. Design concepts

## 4.1 Emergence

The number and sizes of institutions, and the number of distinct cultures,
emerge from the local interactions. Without noise, the classic Axelrod model
freezes into a set of internally homogeneous regions; mutation and selection
error keep the dynamics going.

## 4.2 Collectives

Institutions are collectives with their own state variable, the aggregate
belief, which feeds back into the agents' decisions. Members shape the
aggregate through periodic majority votes.

 */
pub mod consensus;

/**
## 4.8 Interaction

Interaction is local and pairwise. What differs between experiment variants
is the policy: the rules for interacting, for institutional resistance to a
belief change, and for switching institution.

 */
pub mod policy;

/**
## 4.9 Stochasticity

All random draws of a run come from a single generator seeded from the
parameters, so a run is reproducible from its parameters alone.

## 4.10 Observation

Snapshots are handed to a results collector after every iteration.

 */
pub mod observation;

/**
# 5. Initialization

Traits are drawn uniformly at random. Every agent starts as the sole member
of its own institution, whose aggregate belief is the agent's beliefs.

# 6. Input data

None. All parameters are given before the run starts.

 */
pub mod parameters;

/**
# 7. Run control and errors

A run can be paused, resumed or cancelled from another thread, taking effect
between iterations. Inconsistencies in the institution bookkeeping halt the
run.

 */
pub mod control;
pub mod error;

pub mod cli;
mod debug;

#[cfg(test)]
mod tests;

pub use control::{RunController, RunStatus};
pub use engine::Simulation;
pub use observation::{ResultsCollector, Snapshot};
pub use parameters::Parameters;

/// Set up and run a simulation to completion, reporting to `collector`.
pub fn run(p: Parameters, collector: &mut dyn ResultsCollector) -> Result<RunStatus, error::SimulationError> {
    let mut s = Simulation::setup(p)?;
    s.run(collector)
}
