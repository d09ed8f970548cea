use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::beliefs::BeliefStore;
use crate::consensus::{self, ConsensusReport};
use crate::control::{Gate, RunController, RunStatus};
use crate::error::{ConfigError, RingError, SimulationError};
use crate::grid::GridTopology;
use crate::institutions::InstitutionRegistry;
use crate::observation::{self, Counters, ResultsCollector, Snapshot};
use crate::parameters::Parameters;
use crate::policy::{ChangeDecision, Encounter, InteractionPolicy, Proposal, RulePolicy, SwitchDecision};
use crate::CellId;

/// What came of one attempted interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// The policy decided against interacting.
    Declined,
    /// The institution vetoed the change.
    Rejected { feature: usize },
    /// The institution vetoed the change and pulled the agent back to its
    /// institutional trait.
    Reverted { feature: usize },
    Adopted { feature: usize, switch: SwitchDecision },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub agent: CellId,
    pub neighbour: CellId,
    pub interaction: Interaction,
    pub mutated: bool,
}

/// One simulation instance: its grid, agent beliefs, institutions, policy
/// and random stream. Instances share nothing, so independent runs can go on
/// different threads.
pub struct Simulation {
    p: Parameters,
    grid: GridTopology,
    beliefs: BeliefStore,
    institutions: InstitutionRegistry,
    policy: Box<dyn InteractionPolicy>,
    rng: StdRng,
    controller: RunController,
    counters: Counters,
    iteration: u32,
    started: Option<Instant>,
}

impl Simulation {
    /// Validate the parameters, build the grid and draw random initial
    /// beliefs. The policy is the one named in the parameters.
    pub fn setup(p: Parameters) -> Result<Simulation, ConfigError> {
        let policy = Box::new(RulePolicy::new(&p));
        Simulation::with_policy(p, policy)
    }

    pub fn with_policy(p: Parameters, policy: Box<dyn InteractionPolicy>) -> Result<Simulation, ConfigError> {
        p.validate()?;
        let mut rng = StdRng::seed_from_u64(p.seed);
        let beliefs = BeliefStore::random(p.agents(), p.features, p.traits, &mut rng);
        Simulation::assemble(p, policy, beliefs, rng)
    }

    /// Start from given beliefs instead of random ones.
    pub fn with_beliefs(
        p: Parameters,
        policy: Box<dyn InteractionPolicy>,
        beliefs: BeliefStore,
    ) -> Result<Simulation, ConfigError> {
        p.validate()?;
        let expected = p.agents() * p.features;
        let actual = beliefs.cells() * beliefs.features();
        if beliefs.features() != p.features || actual != expected {
            return Err(ConfigError::BeliefShape { expected, actual });
        }
        if beliefs.traits() != p.traits {
            return Err(ConfigError::TraitCount {
                expected: p.traits,
                actual: beliefs.traits(),
            });
        }
        let rng = StdRng::seed_from_u64(p.seed);
        Simulation::assemble(p, policy, beliefs, rng)
    }

    fn assemble(
        p: Parameters,
        policy: Box<dyn InteractionPolicy>,
        beliefs: BeliefStore,
        rng: StdRng,
    ) -> Result<Simulation, ConfigError> {
        let grid = GridTopology::new(p.rows, p.cols, p.radius, p.neighbourhood)?;
        let institutions = InstitutionRegistry::seeded(&beliefs);
        Ok(Simulation {
            p,
            grid,
            beliefs,
            institutions,
            policy,
            rng,
            controller: RunController::new(),
            counters: Counters::default(),
            iteration: 0,
            started: None,
        })
    }

    pub fn parameters(&self) -> &Parameters {
        &self.p
    }

    pub fn grid(&self) -> &GridTopology {
        &self.grid
    }

    pub fn beliefs(&self) -> &BeliefStore {
        &self.beliefs
    }

    pub fn institutions(&self) -> &InstitutionRegistry {
        &self.institutions
    }

    /// A handle for pausing, resuming or cancelling this run from elsewhere.
    pub fn controller(&self) -> RunController {
        self.controller.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.controller.status()
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    fn encounter(&self, agent: CellId, neighbour: CellId) -> Encounter {
        let own = self.institutions.institution_of(agent);
        let other = self.institutions.institution_of(neighbour);
        Encounter {
            agent,
            neighbour,
            own,
            other,
            features: self.beliefs.features(),
            similarity: self.beliefs.similarity(agent, neighbour),
            own_overlap: self.institutions.overlap(agent, own, &self.beliefs),
            other_overlap: self.institutions.overlap(agent, other, &self.beliefs),
            neighbour_overlap: self.institutions.overlap(neighbour, other, &self.beliefs),
            own_population: self.institutions.population(own),
            other_population: self.institutions.population(other),
        }
    }

    /// One step: a random agent, a random neighbour of it, an attempted
    /// interaction and then, independently, a possible mutation.
    pub fn step(&mut self) -> Result<StepOutcome, RingError> {
        let agent = self.grid.random_cell(&mut self.rng);
        let neighbour = self.grid.random_neighbor(agent, &mut self.rng);
        let interaction = self.interact_pair(agent, neighbour)?;
        let mutated = self.maybe_mutate(agent);
        Ok(StepOutcome {
            agent,
            neighbour,
            interaction,
            mutated,
        })
    }

    /// Let `agent` attempt an interaction with `neighbour`, without the
    /// mutation that follows in a regular step. A switch puts the agent into
    /// the neighbour's institution, next to the neighbour in its ring.
    pub fn interact_pair(&mut self, agent: CellId, neighbour: CellId) -> Result<Interaction, RingError> {
        let e = self.encounter(agent, neighbour);
        if !self.policy.interact(&e, &mut self.rng) {
            return Ok(Interaction::Declined);
        }
        self.counters.interactions += 1;

        let mismatches = self.beliefs.mismatches(agent, neighbour);
        // Without mismatches the interaction is a selection error and
        // changes nothing, whichever feature is drawn.
        let feature = if mismatches.is_empty() {
            self.rng.gen_range(0..self.beliefs.features())
        } else {
            mismatches[self.rng.gen_range(0..mismatches.len())]
        };
        let change = Proposal {
            feature,
            current: self.beliefs.get(agent, feature),
            proposed: self.beliefs.get(neighbour, feature),
            institutional: self.institutions.aggregate_feature(e.own, feature),
        };
        match self.policy.accept_change(&e, &change, &mut self.rng) {
            ChangeDecision::Accept => {}
            ChangeDecision::Reject => return Ok(Interaction::Rejected { feature }),
            ChangeDecision::Revert(value) => {
                self.beliefs.set(agent, feature, value);
                return Ok(Interaction::Reverted { feature });
            }
        }
        self.beliefs.set(agent, feature, change.proposed);

        let e = self.encounter(agent, neighbour);
        let switch = self.policy.switch_institution(&e, &mut self.rng);
        match switch {
            SwitchDecision::Stay => {}
            SwitchDecision::Join(to) => {
                self.institutions.switch_institution(agent, e.own, to, neighbour)?;
                self.institutions.set_feature_if_unset(to, feature, change.proposed);
                self.counters.switches += 1;
                debug!(agent, from = e.own, to, "switched institution");
            }
            SwitchDecision::Found => {
                // An agent already alone keeps its institution.
                if self.institutions.found_institution(agent, &self.beliefs)? != e.own {
                    self.counters.switches += 1;
                }
            }
        }
        Ok(Interaction::Adopted { feature, switch })
    }

    fn maybe_mutate(&mut self, agent: CellId) -> bool {
        if self.p.mutation <= 0. || !self.rng.gen_bool(self.p.mutation) {
            return false;
        }
        let feature = self.rng.gen_range(0..self.beliefs.features());
        let value = self.rng.gen_range(0..self.beliefs.traits());
        self.beliefs.set(agent, feature, value);
        self.counters.mutations += 1;
        true
    }

    /// Run a voting round in every populated institution.
    pub fn consensus(&mut self) -> Result<ConsensusReport, RingError> {
        consensus::vote(&mut self.institutions, &self.beliefs, self.p.tally, &mut self.rng)
    }

    /// Run one iteration: `checkpoint` batches of one step per agent, the
    /// voting round if one is due, and the snapshot of the result.
    pub fn advance(&mut self) -> Result<Snapshot, SimulationError> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let agents = self.grid.len();
        for _ in 0..self.p.checkpoint {
            for _ in 0..agents {
                self.step()?;
            }
        }
        self.controller.set_status(RunStatus::Checkpointing);
        if self.p.consensus_every > 0 && (self.iteration + 1) % self.p.consensus_every == 0 {
            let report = self.consensus()?;
            debug!(
                institutions = report.institutions,
                updated = report.updated_features,
                "consensus round"
            );
        }
        if self.p.verify_rings {
            self.institutions.check_consistency()?;
        }
        let snapshot = observation::snapshot(
            self.iteration,
            started.elapsed().as_secs_f64(),
            &self.institutions,
            &self.beliefs,
            std::mem::take(&mut self.counters),
        );
        self.iteration += 1;
        Ok(snapshot)
    }

    /// Run the remaining iterations, handing every snapshot to `collector`
    /// and honouring pause and cancel requests between iterations.
    pub fn run(&mut self, collector: &mut dyn ResultsCollector) -> Result<RunStatus, SimulationError> {
        info!(
            rows = self.p.rows,
            cols = self.p.cols,
            policy = ?self.p.policy,
            seed = self.p.seed,
            "starting run"
        );
        self.controller.set_status(RunStatus::Running);
        while self.iteration < self.p.iterations {
            let snapshot = match self.advance() {
                Ok(s) => s,
                Err(e) => {
                    error!(iteration = self.iteration, error = %e, "halting run");
                    self.controller.set_status(RunStatus::Failed);
                    return Err(e);
                }
            };
            info!(
                iteration = snapshot.iteration,
                institutions = snapshot.institution_count,
                largest = snapshot.largest_institution,
                cultures = snapshot.distinct_cultures,
                "checkpoint"
            );
            if let Err(e) = collector.record(&snapshot) {
                warn!(iteration = snapshot.iteration, error = %e, "snapshot lost");
            }
            if self.iteration == self.p.iterations {
                break;
            }
            if self.controller.gate() == Gate::Stop {
                info!(iteration = self.iteration, "run cancelled");
                return Ok(RunStatus::Cancelled);
            }
        }
        self.controller.set_status(RunStatus::Completed);
        info!(iterations = self.iteration, "run completed");
        Ok(RunStatus::Completed)
    }
}
