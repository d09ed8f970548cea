/*!
The experiment variants differ only in three decisions taken during an
interaction between an acting agent A (member of institution I) and its
neighbour B (member of J):

 1. whether the two interact at all,
 2. whether A's institution lets A adopt B's trait on the chosen feature,
 3. whether A, after adopting it, changes institution.

The engine asks an [`InteractionPolicy`] for each of these and takes care of
everything else. All randomness comes from the engine's generator, which is
handed in on every call, so a run stays reproducible whatever policy it uses.
 */
use rand::{Rng, RngCore};
use serde_derive::{Deserialize, Serialize};

use crate::parameters::Parameters;
use crate::{CellId, InstitutionId, Trait};

/// What the policy may know about an interacting pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Encounter {
    pub agent: CellId,
    pub neighbour: CellId,
    pub own: InstitutionId,
    pub other: InstitutionId,
    pub features: usize,
    /// Features on which A and B agree.
    pub similarity: usize,
    /// overlap(A, I)
    pub own_overlap: usize,
    /// overlap(A, J)
    pub other_overlap: usize,
    /// overlap(B, J)
    pub neighbour_overlap: usize,
    pub own_population: usize,
    pub other_population: usize,
}

impl Encounter {
    pub fn homophily(&self) -> f64 {
        self.similarity as f64 / self.features as f64
    }

    pub fn same_institution(&self) -> bool {
        self.own == self.other
    }
}

/// A belief change A is about to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub feature: usize,
    pub current: Trait,
    pub proposed: Trait,
    /// I's aggregate trait on this feature.
    pub institutional: Option<Trait>,
}

impl Proposal {
    /// Whether the change would give up a trait A shares with its institution.
    pub fn breaks_identification(&self) -> bool {
        self.institutional == Some(self.current) && self.proposed != self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    Accept,
    Reject,
    /// Reject, and pull A's trait back to the given institutional trait.
    Revert(Trait),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchDecision {
    Stay,
    Join(InstitutionId),
    /// Leave the institution and found a new singleton one.
    Found,
}

pub trait InteractionPolicy: Send + Sync {
    fn interact(&self, e: &Encounter, rng: &mut dyn RngCore) -> bool;
    fn accept_change(&self, e: &Encounter, change: &Proposal, rng: &mut dyn RngCore) -> ChangeDecision;
    fn switch_institution(&self, e: &Encounter, rng: &mut dyn RngCore) -> SwitchDecision;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionRule {
    /// Interact with probability h, the fraction of shared features.
    Homophily,
    /// With probability ε the homophily decision is inverted:
    /// (1 - ε) h + ε (1 - h).
    SelectionError,
    /// Error only thins out interactions homophily allows:
    /// h (1 - ε) + ε h (1 - h).
    Multiplicative,
    /// Like `SelectionError`, with h raised to h + α (1 - h) for members of
    /// the same institution.
    InstitutionWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResistanceRule {
    None,
    /// Reject with probability β (o_AI / (o_AI + o_BJ))^γ.
    Resilience,
    /// Reject with probability β (pop_I / (pop_I + pop_J))^γ.
    PopulationResilience,
    /// Like `Resilience`, but a rejected change forces A's trait back to the
    /// institutional one.
    Reverting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchRule {
    Never,
    /// Join J whenever A now matches J better than I.
    Greedy,
    /// Join J with probability α′ ((o_AJ - o_AI) / F) (pop_J / (pop_I + pop_J))^β′
    /// when A matches J better than I.
    Probabilistic,
}

/// Named experiment variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    Axelrod,
    SelectionError,
    Multiplicative,
    Institutional,
    Resilient,
    PopulationResilient,
    Reverting,
    Secession,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown policy {}", s))
    }
}

impl PolicyKind {
    pub fn rules(self) -> (InteractionRule, ResistanceRule, SwitchRule, bool) {
        use InteractionRule as I;
        use ResistanceRule as R;
        use SwitchRule as S;
        match self {
            PolicyKind::Axelrod => (I::Homophily, R::None, S::Greedy, false),
            PolicyKind::SelectionError => (I::SelectionError, R::None, S::Greedy, false),
            PolicyKind::Multiplicative => (I::Multiplicative, R::None, S::Greedy, false),
            PolicyKind::Institutional => (I::InstitutionWeighted, R::Resilience, S::Probabilistic, false),
            PolicyKind::Resilient => (I::SelectionError, R::Resilience, S::Greedy, false),
            PolicyKind::PopulationResilient => (I::SelectionError, R::PopulationResilience, S::Probabilistic, false),
            PolicyKind::Reverting => (I::SelectionError, R::Reverting, S::Greedy, false),
            PolicyKind::Secession => (I::InstitutionWeighted, R::Resilience, S::Probabilistic, true),
        }
    }
}

/// A policy assembled from one rule per decision and the model constants.
#[derive(Debug, Clone, PartialEq)]
pub struct RulePolicy {
    pub interaction: InteractionRule,
    pub resistance: ResistanceRule,
    pub switching: SwitchRule,
    /// Leave an institution A no longer shares any trait with.
    pub abandon_when_detached: bool,
    pub selection_error: f64,
    pub alpha: f64,
    pub beta: f64,
    pub alpha_switch: f64,
    pub beta_switch: f64,
    pub resilience_exponent: f64,
}

impl RulePolicy {
    pub fn new(p: &Parameters) -> RulePolicy {
        let (interaction, resistance, switching, abandon_when_detached) = p.policy.rules();
        RulePolicy {
            interaction,
            resistance,
            switching,
            abandon_when_detached,
            selection_error: p.selection_error,
            alpha: p.alpha,
            beta: p.beta,
            alpha_switch: p.alpha_switch,
            beta_switch: p.beta_switch,
            resilience_exponent: p.resilience_exponent,
        }
    }

    pub fn interaction_probability(&self, e: &Encounter) -> f64 {
        let h = e.homophily();
        let eps = self.selection_error;
        match self.interaction {
            InteractionRule::Homophily => h,
            InteractionRule::SelectionError => (1. - eps) * h + eps * (1. - h),
            InteractionRule::Multiplicative => h * (1. - eps) + eps * h * (1. - h),
            InteractionRule::InstitutionWeighted => {
                let h = if e.same_institution() {
                    h + self.alpha * (1. - h)
                } else {
                    h
                };
                (1. - eps) * h + eps * (1. - h)
            }
        }
    }

    /// Probability that I vetoes the change. Both overlaps (or both
    /// populations) being zero means A identifies with neither side, and
    /// the change goes through.
    pub fn resistance_probability(&self, e: &Encounter) -> f64 {
        let (own, other) = match self.resistance {
            ResistanceRule::None => return 0.,
            ResistanceRule::Resilience | ResistanceRule::Reverting => (e.own_overlap, e.neighbour_overlap),
            ResistanceRule::PopulationResilience => (e.own_population, e.other_population),
        };
        if own + other == 0 {
            return 0.;
        }
        let r = own as f64 / (own + other) as f64;
        self.beta * r.powf(self.resilience_exponent)
    }

    pub fn switch_probability(&self, e: &Encounter) -> f64 {
        if e.other_overlap <= e.own_overlap {
            return 0.;
        }
        match self.switching {
            SwitchRule::Never => 0.,
            SwitchRule::Greedy => 1.,
            SwitchRule::Probabilistic => {
                let gain = (e.other_overlap - e.own_overlap) as f64 / e.features as f64;
                let pull = e.other_population as f64 / (e.own_population + e.other_population) as f64;
                (self.alpha_switch * gain * pull.powf(self.beta_switch)).min(1.)
            }
        }
    }
}

fn chance(p: f64, rng: &mut dyn RngCore) -> bool {
    if p <= 0. {
        false
    } else if p >= 1. {
        true
    } else {
        rng.gen_bool(p)
    }
}

impl InteractionPolicy for RulePolicy {
    fn interact(&self, e: &Encounter, rng: &mut dyn RngCore) -> bool {
        chance(self.interaction_probability(e), rng)
    }

    fn accept_change(&self, e: &Encounter, change: &Proposal, rng: &mut dyn RngCore) -> ChangeDecision {
        match self.resistance {
            ResistanceRule::None => ChangeDecision::Accept,
            ResistanceRule::Reverting => {
                if change.proposed == change.current || !chance(self.resistance_probability(e), rng) {
                    return ChangeDecision::Accept;
                }
                match change.institutional {
                    Some(t) if t != change.current => ChangeDecision::Revert(t),
                    _ => ChangeDecision::Reject,
                }
            }
            ResistanceRule::Resilience | ResistanceRule::PopulationResilience => {
                if change.breaks_identification() && chance(self.resistance_probability(e), rng) {
                    ChangeDecision::Reject
                } else {
                    ChangeDecision::Accept
                }
            }
        }
    }

    fn switch_institution(&self, e: &Encounter, rng: &mut dyn RngCore) -> SwitchDecision {
        if !e.same_institution() && chance(self.switch_probability(e), rng) {
            return SwitchDecision::Join(e.other);
        }
        if self.abandon_when_detached && e.own_overlap == 0 && e.own_population > 1 {
            return SwitchDecision::Found;
        }
        SwitchDecision::Stay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn encounter() -> Encounter {
        Encounter {
            agent: 0,
            neighbour: 1,
            own: 0,
            other: 1,
            features: 4,
            similarity: 2,
            own_overlap: 0,
            other_overlap: 0,
            neighbour_overlap: 0,
            own_population: 1,
            other_population: 1,
        }
    }

    fn policy(kind: PolicyKind) -> RulePolicy {
        RulePolicy::new(&Parameters {
            policy: kind,
            ..Parameters::default()
        })
    }

    #[test]
    fn selection_error_blends_towards_the_opposite_decision() {
        let mut p = policy(PolicyKind::SelectionError);
        p.selection_error = 0.1;
        let mut e = encounter();
        e.similarity = 4;
        assert!((p.interaction_probability(&e) - 0.9).abs() < 1e-12);
        e.similarity = 0;
        assert!((p.interaction_probability(&e) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn shared_institution_raises_interaction() {
        let p = policy(PolicyKind::Institutional);
        let mut e = encounter();
        let apart = p.interaction_probability(&e);
        e.other = e.own;
        assert!(p.interaction_probability(&e) > apart);
    }

    #[test]
    fn zero_overlaps_do_not_divide_by_zero() {
        let p = policy(PolicyKind::Resilient);
        let e = encounter();
        assert_eq!(p.resistance_probability(&e), 0.);
        let change = Proposal {
            feature: 0,
            current: 1,
            proposed: 2,
            institutional: Some(1),
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(p.accept_change(&e, &change, &mut rng), ChangeDecision::Accept);
    }

    #[test]
    fn full_resilience_vetoes_identifying_changes() {
        let mut p = policy(PolicyKind::Resilient);
        p.beta = 1.;
        let mut e = encounter();
        e.own_overlap = 3;
        let change = Proposal {
            feature: 0,
            current: 1,
            proposed: 2,
            institutional: Some(1),
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(p.accept_change(&e, &change, &mut rng), ChangeDecision::Reject);
        // Not identifying with I on this feature: nothing to resist.
        let free = Proposal {
            institutional: Some(3),
            ..change
        };
        assert_eq!(p.accept_change(&e, &free, &mut rng), ChangeDecision::Accept);
    }

    #[test]
    fn reverting_pulls_back_to_the_institution() {
        let mut p = policy(PolicyKind::Reverting);
        p.beta = 1.;
        let mut e = encounter();
        e.own_overlap = 2;
        let change = Proposal {
            feature: 1,
            current: 0,
            proposed: 2,
            institutional: Some(4),
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(p.accept_change(&e, &change, &mut rng), ChangeDecision::Revert(4));
    }

    #[test]
    fn reverting_leaves_unchanged_traits_alone() {
        let mut p = policy(PolicyKind::Reverting);
        p.beta = 1.;
        let mut e = encounter();
        e.own_overlap = 2;
        let same = Proposal {
            feature: 1,
            current: 2,
            proposed: 2,
            institutional: Some(4),
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(p.accept_change(&e, &same, &mut rng), ChangeDecision::Accept);
    }

    #[test]
    fn greedy_switching_follows_the_better_match() {
        let p = policy(PolicyKind::Axelrod);
        let mut rng = StdRng::seed_from_u64(1);
        let mut e = encounter();
        e.own_overlap = 1;
        e.other_overlap = 2;
        assert_eq!(p.switch_institution(&e, &mut rng), SwitchDecision::Join(1));
        e.other_overlap = 1;
        assert_eq!(p.switch_institution(&e, &mut rng), SwitchDecision::Stay);
    }

    #[test]
    fn detached_agents_secede() {
        let p = policy(PolicyKind::Secession);
        let mut rng = StdRng::seed_from_u64(1);
        let mut e = encounter();
        e.own_population = 5;
        assert_eq!(p.switch_institution(&e, &mut rng), SwitchDecision::Found);
        e.own_population = 1;
        assert_eq!(p.switch_institution(&e, &mut rng), SwitchDecision::Stay);
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("population-resilient".parse::<PolicyKind>(), Ok(PolicyKind::PopulationResilient));
        assert!("nonsense".parse::<PolicyKind>().is_err());
    }
}
