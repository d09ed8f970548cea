use rand::RngCore;

use crate::beliefs::BeliefStore;
use crate::control::RunStatus;
use crate::engine::{Interaction, Simulation};
use crate::error::{CollectorError, ConfigError, RingError, SimulationError};
use crate::grid::{GridTopology, Neighbourhood};
use crate::observation::{Recorder, ResultsCollector, Snapshot};
use crate::policy::*;
use crate::*;

/// Always interacts, always accepts, and then does whatever `switch` says.
struct Forced {
    switch: fn(&Encounter) -> SwitchDecision,
}

impl InteractionPolicy for Forced {
    fn interact(&self, _e: &Encounter, _rng: &mut dyn RngCore) -> bool {
        true
    }
    fn accept_change(&self, _e: &Encounter, _change: &Proposal, _rng: &mut dyn RngCore) -> ChangeDecision {
        ChangeDecision::Accept
    }
    fn switch_institution(&self, e: &Encounter, _rng: &mut dyn RngCore) -> SwitchDecision {
        (self.switch)(e)
    }
}

fn join(e: &Encounter) -> SwitchDecision {
    SwitchDecision::Join(e.other)
}

fn small(policy: PolicyKind, seed: u64) -> Parameters {
    Parameters {
        rows: 6,
        cols: 6,
        features: 3,
        traits: 3,
        iterations: 4,
        checkpoint: 2,
        mutation: 0.01,
        selection_error: 0.05,
        policy,
        seed,
        ..Parameters::default()
    }
}

const ALL_POLICIES: [PolicyKind; 8] = [
    PolicyKind::Axelrod,
    PolicyKind::SelectionError,
    PolicyKind::Multiplicative,
    PolicyKind::Institutional,
    PolicyKind::Resilient,
    PolicyKind::PopulationResilient,
    PolicyKind::Reverting,
    PolicyKind::Secession,
];

#[test]
pub fn forced_interaction_on_a_four_by_four_torus() {
    let p = Parameters {
        rows: 4,
        cols: 4,
        radius: 1,
        features: 3,
        traits: 2,
        ..Parameters::default()
    };
    // (0,0) and (0,1) differ only on feature 2.
    let mut values = vec![0; 16 * 3];
    values[3 + 2] = 1;
    for cell in 2..16 {
        values[cell * 3] = (cell % 2) as Trait;
    }
    let beliefs = BeliefStore::from_values(3, 2, values).unwrap();
    let mut s = Simulation::with_beliefs(p, Box::new(Forced { switch: join }), beliefs).unwrap();
    let a = s.grid().index(grid::Cell { row: 0, col: 0 });
    let b = s.grid().index(grid::Cell { row: 0, col: 1 });
    assert!(s.grid().neighbors(a).contains(&b));
    let before = s.beliefs().get(b, 2);
    let (from, to) = (s.institutions().institution_of(a), s.institutions().institution_of(b));
    let (pop_from, pop_to) = (s.institutions().population(from), s.institutions().population(to));

    let outcome = s.interact_pair(a, b).unwrap();

    assert_eq!(
        outcome,
        Interaction::Adopted {
            feature: 2,
            switch: SwitchDecision::Join(to)
        }
    );
    assert_eq!(s.beliefs().get(a, 2), before);
    assert_eq!(s.institutions().population(from), pop_from - 1);
    assert_eq!(s.institutions().population(to), pop_to + 1);
    assert_eq!(s.institutions().institution_of(a), to);
    s.institutions().check_consistency().unwrap();
}

#[test]
pub fn staying_leaves_populations_alone() {
    let p = Parameters {
        rows: 4,
        cols: 4,
        features: 3,
        traits: 2,
        ..Parameters::default()
    };
    let mut s = Simulation::with_policy(
        p,
        Box::new(Forced {
            switch: |_| SwitchDecision::Stay,
        }),
    )
    .unwrap();
    for a in 0..16 {
        let b = s.grid().neighbors(a)[0];
        s.interact_pair(a, b).unwrap();
        assert_eq!(s.institutions().population(a), 1);
    }
}

fn join_then_secede(e: &Encounter) -> SwitchDecision {
    if e.same_institution() {
        SwitchDecision::Found
    } else {
        SwitchDecision::Join(e.other)
    }
}

#[test]
pub fn seceding_agents_found_a_singleton() {
    let p = Parameters {
        rows: 3,
        cols: 3,
        features: 2,
        traits: 2,
        ..Parameters::default()
    };
    let mut s = Simulation::with_policy(
        p,
        Box::new(Forced {
            switch: join_then_secede,
        }),
    )
    .unwrap();
    s.interact_pair(0, 1).unwrap();
    assert_eq!(s.institutions().institution_of(0), 1);
    assert_eq!(s.institutions().population(1), 2);
    assert_eq!(s.institutions().population(0), 0);

    let outcome = s.interact_pair(0, 1).unwrap();
    assert!(matches!(
        outcome,
        Interaction::Adopted {
            switch: SwitchDecision::Found,
            ..
        }
    ));
    // The lowest latent id from the founder's own index is its old one.
    assert_eq!(s.institutions().institution_of(0), 0);
    assert_eq!(s.institutions().population(0), 1);
    assert_eq!(s.institutions().population(1), 1);
    let founder: Vec<Option<Trait>> = s.beliefs().beliefs(0).iter().map(|t| Some(*t)).collect();
    assert_eq!(s.institutions().aggregate(0), &founder[..]);
    s.institutions().check_consistency().unwrap();
}

#[test]
pub fn bookkeeping_stays_consistent_under_every_policy() {
    for kind in ALL_POLICIES.iter() {
        let mut s = Simulation::setup(small(*kind, 17)).unwrap();
        let agents = s.grid().len();
        for k in 0..3000 {
            s.step().unwrap();
            if k % 100 == 0 {
                s.institutions().check_consistency().unwrap();
                let total: usize = (0..s.institutions().capacity())
                    .map(|i| s.institutions().population(i))
                    .sum();
                assert_eq!(total, agents, "{:?}", kind);
            }
        }
        s.consensus().unwrap();
        s.institutions().check_consistency().unwrap();
    }
}

#[test]
pub fn settled_aggregates_only_change_by_voting() {
    for kind in ALL_POLICIES.iter() {
        let mut s = Simulation::setup(small(*kind, 3)).unwrap();
        for _ in 0..2000 {
            let before: Vec<(usize, Vec<Option<Trait>>)> = s
                .institutions()
                .live_institutions()
                .into_iter()
                .map(|i| (i, s.institutions().aggregate(i).to_vec()))
                .collect();
            s.step().unwrap();
            for (i, aggregate) in before {
                for (old, new) in aggregate.iter().zip(s.institutions().aggregate(i)) {
                    if old.is_some() {
                        assert_eq!(old, new, "{:?} institution {}", kind, i);
                    }
                }
            }
        }
    }
}

#[test]
pub fn runs_are_reproducible_from_the_seed() {
    let p = small(PolicyKind::Secession, 1234);
    let mut s1 = Simulation::setup(p.clone()).unwrap();
    let mut s2 = Simulation::setup(p).unwrap();
    assert_eq!(s1.beliefs(), s2.beliefs());
    for _ in 0..4 {
        let a = s1.advance().unwrap();
        let b = s2.advance().unwrap();
        assert_eq!(s1.beliefs(), s2.beliefs());
        assert_eq!(
            Snapshot { elapsed: 0., ..a },
            Snapshot { elapsed: 0., ..b }
        );
    }
}

#[test]
pub fn different_seeds_differ() {
    let s1 = Simulation::setup(small(PolicyKind::Axelrod, 1)).unwrap();
    let s2 = Simulation::setup(small(PolicyKind::Axelrod, 2)).unwrap();
    assert_ne!(s1.beliefs(), s2.beliefs());
}

#[test]
pub fn a_full_run_completes_with_one_snapshot_per_iteration() {
    let mut s = Simulation::setup(small(PolicyKind::Institutional, 9)).unwrap();
    let mut recorder = Recorder::default();
    assert_eq!(s.status(), RunStatus::Idle);
    assert_eq!(s.run(&mut recorder), Ok(RunStatus::Completed));
    assert_eq!(s.status(), RunStatus::Completed);
    let iterations: Vec<u32> = recorder.snapshots.iter().map(|s| s.iteration).collect();
    assert_eq!(iterations, vec![0, 1, 2, 3]);
    for snapshot in recorder.snapshots.iter() {
        assert!(snapshot.institution_count >= 1);
        assert!(snapshot.largest_institution <= 36);
        assert!(snapshot.mean_institution_overlap <= 1.);
    }
}

#[test]
pub fn cancelling_stops_after_the_current_checkpoint() {
    let mut s = Simulation::setup(small(PolicyKind::Resilient, 5)).unwrap();
    let controller = s.controller();
    controller.cancel();
    let mut recorder = Recorder::default();
    assert_eq!(s.run(&mut recorder), Ok(RunStatus::Cancelled));
    assert_eq!(recorder.snapshots.len(), 1);
    assert_eq!(controller.status(), RunStatus::Cancelled);
    s.institutions().check_consistency().unwrap();
}

struct Broken;

impl ResultsCollector for Broken {
    fn record(&mut self, _snapshot: &Snapshot) -> Result<(), CollectorError> {
        Err(CollectorError("disk full".to_string()))
    }
}

#[test]
pub fn collector_failures_do_not_stop_the_run() {
    let mut s = Simulation::setup(small(PolicyKind::Axelrod, 8)).unwrap();
    assert_eq!(s.run(&mut Broken), Ok(RunStatus::Completed));
    assert_eq!(s.iteration(), 4);
}

#[test]
pub fn ring_violations_halt_the_run() {
    // Joining an institution the neighbour is not in cannot be spliced.
    let mut s = Simulation::with_policy(
        small(PolicyKind::Axelrod, 2),
        Box::new(Forced {
            switch: |e| SwitchDecision::Join((e.other + 1) % 36),
        }),
    )
    .unwrap();
    let result = s.run(&mut Recorder::default());
    assert!(matches!(
        result,
        Err(SimulationError::Ring(RingError::ForeignAnchor { .. }))
    ));
    assert_eq!(s.status(), RunStatus::Failed);
}

#[test]
pub fn configuration_errors_fail_fast() {
    let setup = |p: Parameters| Simulation::setup(p).map(|_| ());
    assert_eq!(
        setup(Parameters {
            rows: 0,
            ..Parameters::default()
        }),
        Err(ConfigError::EmptyGrid { rows: 0, cols: 20 })
    );
    assert_eq!(
        setup(Parameters {
            rows: 1,
            cols: 1,
            ..Parameters::default()
        }),
        Err(ConfigError::NoNeighbours { cell: 0, radius: 1 })
    );
    assert_eq!(
        setup(Parameters {
            radius: 0,
            ..Parameters::default()
        }),
        Err(ConfigError::NoNeighbours { cell: 0, radius: 0 })
    );
    assert_eq!(
        setup(Parameters {
            features: 0,
            ..Parameters::default()
        }),
        Err(ConfigError::NoFeatures)
    );
    assert_eq!(
        setup(Parameters {
            traits: 0,
            ..Parameters::default()
        }),
        Err(ConfigError::NoTraits)
    );
    assert_eq!(
        setup(Parameters {
            mutation: 1.5,
            ..Parameters::default()
        }),
        Err(ConfigError::ProbabilityOutOfRange {
            name: "mutation",
            value: 1.5
        })
    );
}

#[test]
pub fn torus_neighbourhoods_are_uniform() {
    let moore = GridTopology::new(5, 5, 2, Neighbourhood::Moore).unwrap();
    let von_neumann = GridTopology::new(5, 5, 2, Neighbourhood::VonNeumann).unwrap();
    for cell in 0..25 {
        assert_eq!(moore.neighbors(cell).len(), 24);
        assert_eq!(von_neumann.neighbors(cell).len(), 12);
        assert!(!moore.neighbors(cell).contains(&cell));
    }
    // On a 2x2 torus up and down are the same cell.
    let tiny = GridTopology::new(2, 2, 1, Neighbourhood::VonNeumann).unwrap();
    assert_eq!(tiny.neighbors(0), &[2, 1]);
}

#[test]
pub fn partial_json_configuration_keeps_defaults() {
    let p = Parameters::from_json(r#"{"rows": 4, "policy": "secession", "tally": "single-feature"}"#).unwrap();
    assert_eq!(p.rows, 4);
    assert_eq!(p.cols, Parameters::default().cols);
    assert_eq!(p.policy, PolicyKind::Secession);
    assert_eq!(p.tally, consensus::Tally::SingleFeature);
    assert!(Parameters::from_json("{\"rows\": -1}").is_err());
}

#[test]
pub fn voting_moves_institutions_towards_their_members() {
    let p = Parameters {
        consensus_every: 1,
        ..small(PolicyKind::Institutional, 21)
    };
    let mut s = Simulation::setup(p).unwrap();
    for _ in 0..3 {
        s.advance().unwrap();
    }
    let before = observation::mean_institution_overlap(s.institutions(), s.beliefs());
    s.consensus().unwrap();
    let after = observation::mean_institution_overlap(s.institutions(), s.beliefs());
    assert!(after >= before);
}

#[test]
pub fn one_call_runs_to_completion() {
    let mut recorder = Recorder::default();
    let p = Parameters {
        consensus_every: 2,
        tally: consensus::Tally::SingleFeature,
        verify_rings: true,
        ..small(PolicyKind::PopulationResilient, 77)
    };
    assert_eq!(run(p, &mut recorder), Ok(RunStatus::Completed));
    assert_eq!(recorder.snapshots.len(), 4);
    assert!(run(Parameters { iterations: 0, ..Parameters::default() }, &mut recorder).is_err());
}

/// Never interacts.
struct Aloof;

impl InteractionPolicy for Aloof {
    fn interact(&self, _e: &Encounter, _rng: &mut dyn RngCore) -> bool {
        false
    }
    fn accept_change(&self, _e: &Encounter, _change: &Proposal, _rng: &mut dyn RngCore) -> ChangeDecision {
        ChangeDecision::Accept
    }
    fn switch_institution(&self, _e: &Encounter, _rng: &mut dyn RngCore) -> SwitchDecision {
        SwitchDecision::Stay
    }
}

#[test]
pub fn mutation_does_not_wait_for_an_interaction() {
    let p = Parameters {
        mutation: 1.0,
        ..small(PolicyKind::Axelrod, 11)
    };
    let mut s = Simulation::with_policy(p, Box::new(Aloof)).unwrap();
    for _ in 0..500 {
        let before = s.beliefs().clone();
        let outcome = s.step().unwrap();
        assert!(outcome.mutated);
        assert_eq!(outcome.interaction, Interaction::Declined);
        for cell in 0..before.cells() {
            let changed = (0..3)
                .filter(|&f| before.get(cell, f) != s.beliefs().get(cell, f))
                .count();
            if cell == outcome.agent {
                assert!(changed <= 1);
            } else {
                assert_eq!(changed, 0);
            }
            assert!(s.beliefs().beliefs(cell).iter().all(|&t| t < 3));
        }
    }
}

#[test]
pub fn zero_mutation_never_mutates() {
    let p = Parameters {
        mutation: 0.0,
        ..small(PolicyKind::Axelrod, 11)
    };
    let mut s = Simulation::with_policy(p, Box::new(Aloof)).unwrap();
    let before = s.beliefs().clone();
    for _ in 0..500 {
        let outcome = s.step().unwrap();
        assert!(!outcome.mutated);
    }
    assert_eq!(s.beliefs(), &before);
}

#[test]
pub fn initial_beliefs_must_fit_the_trait_range() {
    let p = Parameters {
        rows: 2,
        cols: 2,
        features: 2,
        traits: 2,
        ..Parameters::default()
    };
    let mut values = vec![0; 8];
    values[1] = 3;
    assert_eq!(
        BeliefStore::from_values(2, 2, values),
        Err(ConfigError::TraitOutOfRange {
            cell: 0,
            feature: 1,
            value: 3,
            traits: 2
        })
    );

    let wider = BeliefStore::from_values(2, 4, vec![0; 8]).unwrap();
    let outcome = Simulation::with_beliefs(p.clone(), Box::new(Aloof), wider).map(|_| ());
    assert_eq!(outcome, Err(ConfigError::TraitCount { expected: 2, actual: 4 }));

    let fitting = BeliefStore::from_values(2, 2, vec![1; 8]).unwrap();
    assert!(Simulation::with_beliefs(p, Box::new(Aloof), fitting).is_ok());
}

#[test]
pub fn malformed_belief_vectors_are_rejected() {
    assert_eq!(BeliefStore::from_values(0, 2, vec![0; 4]), Err(ConfigError::NoFeatures));
    assert_eq!(BeliefStore::from_values(2, 0, vec![0; 4]), Err(ConfigError::NoTraits));
    assert_eq!(
        BeliefStore::from_values(2, 2, vec![0; 5]),
        Err(ConfigError::BeliefShape { expected: 6, actual: 5 })
    );
}

#[test]
pub fn refounding_a_singleton_is_not_a_switch() {
    let p = Parameters {
        mutation: 0.0,
        checkpoint: 1,
        ..small(PolicyKind::Secession, 4)
    };
    let mut s = Simulation::with_policy(
        p,
        Box::new(Forced {
            switch: |_| SwitchDecision::Found,
        }),
    )
    .unwrap();
    let snapshot = s.advance().unwrap();
    assert_eq!(snapshot.interactions, 36);
    assert_eq!(snapshot.switches, 0);
    assert_eq!(s.institutions().institution_count(), 36);
}
